//! The admission gate / scheduler loop.
//!
//! Each tick: check headroom; if blocked, skip the backlog entirely; if
//! clear and the poll interval has elapsed, pull a batch, order it by
//! priority, and dispatch. The headroom check runs every tick (fast
//! cadence); backlog consumption runs on its own slower cadence, so
//! backpressure sensing is decoupled from queue draining.

use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::backlog::Backlog;
use crate::cluster::{has_pending_headroom_blockers, ClusterObserver};
use crate::config::SchedulerConfig;
use crate::error::Result;
use crate::metrics;
use crate::scheduler::arbiter;
use crate::scheduler::request::JobRequest;
use crate::scheduler::submitter::JobSubmitter;

/// Loop health, published as whole-value snapshots. Read by the HTTP
/// server's `/healthz` handler; never mutated outside the loop task.
#[derive(Debug, Clone)]
pub struct SchedulerHealth {
    pub healthy: bool,
    pub consecutive_errors: u32,
    pub last_successful_poll: Option<DateTime<Utc>>,
}

impl Default for SchedulerHealth {
    fn default() -> Self {
        Self {
            healthy: true,
            consecutive_errors: 0,
            last_successful_poll: None,
        }
    }
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Pending drivers detected; backlog poll skipped.
    Blocked,
    /// Headroom clear but the poll interval has not elapsed.
    Idle,
    /// Polled the backlog and dispatched the batch.
    Dispatched {
        received: usize,
        submitted: usize,
        failed: usize,
    },
    /// The tick hit an unexpected error; recovered at the loop boundary.
    Failed,
}

pub struct Scheduler<B, O, S> {
    backlog: B,
    observer: O,
    submitter: S,
    config: SchedulerConfig,
    namespaces: Vec<String>,
    last_poll: Option<Instant>,
    consecutive_errors: u32,
    last_successful_poll: Option<DateTime<Utc>>,
    health_tx: watch::Sender<SchedulerHealth>,
}

impl<B, O, S> Scheduler<B, O, S>
where
    B: Backlog,
    O: ClusterObserver,
    S: JobSubmitter,
{
    pub fn new(
        config: SchedulerConfig,
        namespaces: Vec<String>,
        backlog: B,
        observer: O,
        submitter: S,
    ) -> (Self, watch::Receiver<SchedulerHealth>) {
        let (health_tx, health_rx) = watch::channel(SchedulerHealth::default());
        metrics::scheduler_health().set(1);

        let scheduler = Self {
            backlog,
            observer,
            submitter,
            config,
            namespaces,
            last_poll: None,
            consecutive_errors: 0,
            last_successful_poll: None,
            health_tx,
        };
        (scheduler, health_rx)
    }

    /// Current health snapshot as the loop sees it.
    pub fn health(&self) -> SchedulerHealth {
        SchedulerHealth {
            healthy: self.consecutive_errors < self.config.max_consecutive_errors,
            consecutive_errors: self.consecutive_errors,
            last_successful_poll: self.last_successful_poll,
        }
    }

    /// Run one tick. Unexpected errors are caught here — the loop boundary
    /// is the single place broad failure recovery happens, and a bad tick
    /// never terminates the loop.
    pub async fn tick(&mut self) -> TickOutcome {
        match self.try_tick().await {
            Ok(outcome) => {
                self.consecutive_errors = 0;
                self.publish_health();
                outcome
            }
            Err(e) => {
                self.consecutive_errors += 1;
                error!(
                    error = %e,
                    consecutive_errors = self.consecutive_errors,
                    "Tick failed"
                );
                self.publish_health();
                TickOutcome::Failed
            }
        }
    }

    async fn try_tick(&mut self) -> Result<TickOutcome> {
        // Admission gate: withhold new submissions while the cluster is
        // still digesting previously submitted but unscheduled work.
        if has_pending_headroom_blockers(&self.observer, &self.namespaces).await {
            info!("Pending driver pods detected, skipping backlog poll");
            metrics::poll_skipped().inc();
            return Ok(TickOutcome::Blocked);
        }

        let poll_due = self
            .last_poll
            .map(|t| t.elapsed() >= self.config.poll_interval)
            .unwrap_or(true);
        if !poll_due {
            return Ok(TickOutcome::Idle);
        }

        match self.backlog.depth().await {
            Ok(depth) => {
                metrics::queue_depth().set(depth as i64);
                debug!(depth, "Backlog depth");
            }
            Err(e) => warn!(error = %e, "Backlog depth query failed"),
        }

        let messages = self.backlog.poll(self.config.batch_size).await?;
        self.last_poll = Some(Instant::now());
        self.last_successful_poll = Some(Utc::now());

        if messages.is_empty() {
            debug!("No messages in backlog");
            return Ok(TickOutcome::Dispatched {
                received: 0,
                submitted: 0,
                failed: 0,
            });
        }

        info!(count = messages.len(), "Received backlog messages");

        let default_namespace = self
            .namespaces
            .first()
            .map(String::as_str)
            .unwrap_or("default");

        let mut requests = Vec::with_capacity(messages.len());
        for msg in &messages {
            match JobRequest::from_message(msg, default_namespace) {
                Ok(req) => {
                    metrics::jobs_received()
                        .with_label_values(&[
                            req.priority.as_str(),
                            &req.organization,
                            &req.project,
                        ])
                        .inc();
                    requests.push(req);
                }
                // Unparseable body: leave it for redelivery; exhausting the
                // backlog's own redelivery policy is what dead-letters it.
                Err(e) => warn!(message_id = %msg.id, error = %e, "Skipping unparseable message"),
            }
        }

        let received = requests.len();
        let mut submitted = 0usize;
        let mut failed = 0usize;

        for request in arbiter::order(requests) {
            let timer = metrics::job_processing_seconds().start_timer();
            let outcome = self.submitter.submit(&request).await;

            if outcome.submitted {
                // Ack only after confirmed submission. If the ack itself
                // fails the message is redelivered and the job runs twice;
                // idempotent naming makes that visible, not fatal.
                match self.backlog.acknowledge(&request.receipt_handle).await {
                    Ok(()) => {
                        debug!(job_id = %request.id, "Acknowledged request");
                        submitted += 1;
                    }
                    Err(e) => {
                        warn!(job_id = %request.id, error = %e, "Acknowledge failed after submission");
                        submitted += 1;
                    }
                }
            } else {
                failed += 1;
            }
            timer.observe_duration();
        }

        Ok(TickOutcome::Dispatched {
            received,
            submitted,
            failed,
        })
    }

    fn publish_health(&self) {
        let snapshot = self.health();
        metrics::scheduler_health()
            .set(if snapshot.healthy { 1 } else { 0 });
        // Whole-value replacement; readers tolerate a slightly stale view.
        self.health_tx.send_replace(snapshot);
    }

    /// Drive ticks on the driver-check cadence until cancelled. The
    /// in-flight tick always completes; cancellation is observed between
    /// ticks.
    pub async fn run(mut self, token: CancellationToken) {
        info!(
            namespaces = ?self.namespaces,
            batch_size = self.config.batch_size,
            poll_interval = ?self.config.poll_interval,
            driver_check_interval = ?self.config.driver_check_interval,
            "Scheduler loop started"
        );

        loop {
            let outcome = self.tick().await;
            debug!(?outcome, "Tick complete");

            tokio::select! {
                _ = token.cancelled() => {
                    info!("Scheduler loop stopping");
                    break;
                }
                _ = tokio::time::sleep(self.config.driver_check_interval) => {}
            }
        }
    }
}

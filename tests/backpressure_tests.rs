//! Integration tests for the admission gate.
//!
//! These validate that:
//! - Pending driver pods block backlog polling for the whole tick.
//! - Observation errors fail open (a broken namespace never wedges the
//!   scheduler) while still being counted per namespace.
//! - Headroom observation is idempotent for unchanged cluster state.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use sparkgate::backlog::{Backlog, BacklogMessage};
use sparkgate::cluster::{has_pending_headroom_blockers, ClusterObserver};
use sparkgate::config::SchedulerConfig;
use sparkgate::error::{Result, SchedulerError};
use sparkgate::metrics;
use sparkgate::scheduler::{
    JobRequest, JobSubmitter, Scheduler, SubmissionOutcome, TickOutcome,
};

// ---------------------------------------------------------------------------
// Mocks
// ---------------------------------------------------------------------------

/// Observer with scripted per-namespace results. Namespaces not scripted
/// report an error, so tests must be explicit about what exists.
#[derive(Default)]
struct ScriptedObserver {
    results: Mutex<HashMap<String, std::result::Result<usize, String>>>,
    calls: AtomicUsize,
}

impl ScriptedObserver {
    fn ok(&self, namespace: &str, pending: usize) -> &Self {
        self.results
            .lock()
            .unwrap()
            .insert(namespace.to_string(), Ok(pending));
        self
    }

    fn err(&self, namespace: &str) -> &Self {
        self.results.lock().unwrap().insert(
            namespace.to_string(),
            Err("injected observation failure".to_string()),
        );
        self
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClusterObserver for ScriptedObserver {
    async fn pending_driver_count(&self, namespace: &str) -> Result<usize> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.results.lock().unwrap().get(namespace) {
            Some(Ok(count)) => Ok(*count),
            Some(Err(e)) => Err(SchedulerError::Cluster(e.clone())),
            None => Err(SchedulerError::Cluster(format!(
                "unscripted namespace {namespace}"
            ))),
        }
    }
}

#[derive(Default)]
struct CountingBacklog {
    batches: Mutex<VecDeque<Vec<BacklogMessage>>>,
    polls: AtomicUsize,
    acked: Mutex<Vec<String>>,
}

impl CountingBacklog {
    fn push_batch(&self, messages: Vec<BacklogMessage>) {
        self.batches.lock().unwrap().push_back(messages);
    }

    fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Backlog for CountingBacklog {
    async fn poll(&self, _max_batch: u32) -> Result<Vec<BacklogMessage>> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        Ok(self.batches.lock().unwrap().pop_front().unwrap_or_default())
    }

    async fn acknowledge(&self, receipt_handle: &str) -> Result<()> {
        self.acked.lock().unwrap().push(receipt_handle.to_string());
        Ok(())
    }

    async fn depth(&self) -> Result<u64> {
        Ok(0)
    }
}

#[derive(Default)]
struct CountingSubmitter {
    submissions: AtomicUsize,
}

#[async_trait]
impl JobSubmitter for CountingSubmitter {
    async fn submit(&self, request: &JobRequest) -> SubmissionOutcome {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        SubmissionOutcome {
            request: request.clone(),
            submitted: true,
            cluster_job_name: Some(format!("{}-0", request.id)),
            error: None,
        }
    }
}

fn message(job_id: &str) -> BacklogMessage {
    BacklogMessage {
        id: format!("msg-{job_id}"),
        body: format!(r#"{{"job_id": "{job_id}", "priority": "medium"}}"#),
        receipt_handle: format!("rh-{job_id}"),
        sent_at: Utc::now(),
        delivery_count: 1,
    }
}

// ---------------------------------------------------------------------------
// Test 1: blocked tick → poll skipped, counter bumps, nothing submitted
// ---------------------------------------------------------------------------

#[tokio::test]
async fn blocked_tick_skips_backlog_poll() {
    let backlog = Arc::new(CountingBacklog::default());
    let observer = Arc::new(ScriptedObserver::default());
    let submitter = Arc::new(CountingSubmitter::default());

    observer.ok("gate-ns0", 2);

    let (mut scheduler, _health_rx) = Scheduler::new(
        SchedulerConfig::default(),
        vec!["gate-ns0".to_string()],
        backlog.clone(),
        observer.clone(),
        submitter.clone(),
    );

    backlog.push_batch(vec![message("j-1")]);

    let skipped_before = metrics::poll_skipped().get();
    let outcome = scheduler.tick().await;

    assert_eq!(outcome, TickOutcome::Blocked);
    assert_eq!(backlog.poll_count(), 0, "backlog must not be polled");
    assert_eq!(submitter.submissions.load(Ordering::SeqCst), 0);
    assert_eq!(
        metrics::poll_skipped().get() - skipped_before,
        1,
        "poll-skipped counter increments by exactly 1"
    );

    // Drivers drain: the next tick polls and dispatches.
    observer.ok("gate-ns0", 0);
    let outcome = scheduler.tick().await;
    assert_eq!(
        outcome,
        TickOutcome::Dispatched {
            received: 1,
            submitted: 1,
            failed: 0
        }
    );
    assert_eq!(backlog.poll_count(), 1);
    assert_eq!(submitter.submissions.load(Ordering::SeqCst), 1);
}

// ---------------------------------------------------------------------------
// Test 2: fail-open on a single namespace's observation error
// ---------------------------------------------------------------------------

#[tokio::test]
async fn observation_error_fails_open() {
    let observer = ScriptedObserver::default();
    observer.ok("gate-open-a", 0).err("gate-open-b");

    let namespaces = vec!["gate-open-a".to_string(), "gate-open-b".to_string()];

    let errors_before = metrics::observer_errors()
        .with_label_values(&["gate-open-b"])
        .get();

    let blocked = has_pending_headroom_blockers(&observer, &namespaces).await;

    assert!(!blocked, "a broken namespace contributes zero pending");
    assert_eq!(
        metrics::observer_errors()
            .with_label_values(&["gate-open-b"])
            .get()
            - errors_before,
        1,
        "error counter for the failing namespace increments by 1"
    );
    assert_eq!(
        metrics::observer_errors()
            .with_label_values(&["gate-open-a"])
            .get(),
        0,
        "healthy namespace accrues no errors"
    );
}

#[tokio::test]
async fn pending_pods_in_any_namespace_block() {
    let observer = ScriptedObserver::default();
    observer.ok("gate-any-a", 0).ok("gate-any-b", 1);

    let namespaces = vec!["gate-any-a".to_string(), "gate-any-b".to_string()];
    assert!(has_pending_headroom_blockers(&observer, &namespaces).await);
}

#[tokio::test]
async fn all_namespaces_failing_still_fails_open() {
    let observer = ScriptedObserver::default();
    observer.err("gate-allfail-a").err("gate-allfail-b");

    let namespaces = vec!["gate-allfail-a".to_string(), "gate-allfail-b".to_string()];
    assert!(!has_pending_headroom_blockers(&observer, &namespaces).await);
}

// ---------------------------------------------------------------------------
// Test 3: idempotence and gauge reporting
// ---------------------------------------------------------------------------

#[tokio::test]
async fn observation_is_idempotent_for_unchanged_state() {
    let observer = ScriptedObserver::default();
    observer.ok("gate-idem", 3);

    let namespaces = vec!["gate-idem".to_string()];

    let first = has_pending_headroom_blockers(&observer, &namespaces).await;
    let second = has_pending_headroom_blockers(&observer, &namespaces).await;

    assert_eq!(first, second);
    assert_eq!(
        observer.call_count(),
        2,
        "each check re-observes, no caching"
    );
}

#[tokio::test]
async fn pending_gauge_tracks_observed_counts() {
    let observer = ScriptedObserver::default();
    observer.ok("gate-gauge", 4);

    let namespaces = vec!["gate-gauge".to_string()];
    has_pending_headroom_blockers(&observer, &namespaces).await;

    assert_eq!(
        metrics::drivers_pending()
            .with_label_values(&["gate-gauge"])
            .get(),
        4
    );

    observer.ok("gate-gauge", 0);
    has_pending_headroom_blockers(&observer, &namespaces).await;
    assert_eq!(
        metrics::drivers_pending()
            .with_label_values(&["gate-gauge"])
            .get(),
        0
    );
}

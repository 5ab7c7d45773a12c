//! Background metrics aggregation.
//!
//! Runs on its own, much slower cadence than the scheduler loop and never
//! blocks it: queue and DLQ depth, plus per-namespace Spark application
//! state gauges for dashboarding. Every failure here is logged and
//! swallowed; reporting must not affect scheduling.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backlog::Backlog;
use crate::cluster::{KubeClient, SparkApplicationSummary};
use crate::metrics;

/// Aggregated gauge values for one namespace.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct NamespaceCounts {
    /// (priority, organization, project) -> running-or-submitted count.
    pub running: HashMap<(String, String, String), i64>,
    /// Applications not yet confirmed scheduled.
    pub pending: i64,
}

/// Bucket application summaries into gauge values.
pub fn aggregate(apps: &[SparkApplicationSummary]) -> NamespaceCounts {
    let mut counts = NamespaceCounts::default();

    for app in apps {
        let label = |key: &str| {
            app.labels
                .get(key)
                .cloned()
                .unwrap_or_else(|| "unknown".to_string())
        };

        if app.state.counts_as_running() {
            *counts
                .running
                .entry((label("priority"), label("organization"), label("project")))
                .or_insert(0) += 1;
        }
        if app.state.counts_as_pending() {
            counts.pending += 1;
        }
    }

    counts
}

async fn refresh_once<B: Backlog>(backlog: &B, kube: &KubeClient, namespaces: &[String]) {
    match backlog.depth().await {
        Ok(depth) => metrics::queue_depth().set(depth as i64),
        Err(e) => warn!(error = %e, "Queue depth refresh failed"),
    }

    match backlog.dlq_depth().await {
        Ok(Some(depth)) => metrics::dlq_depth().set(depth as i64),
        Ok(None) => {}
        Err(e) => warn!(error = %e, "DLQ depth refresh failed"),
    }

    // Reset before repopulating so label sets for drained namespaces do not
    // linger at stale values.
    metrics::jobs_running().reset();
    metrics::jobs_pending().reset();

    for namespace in namespaces {
        let apps = match kube.list_spark_applications(namespace).await {
            Ok(apps) => apps,
            Err(e) => {
                warn!(namespace = %namespace, error = %e, "Application list failed");
                continue;
            }
        };

        let counts = aggregate(&apps);
        debug!(
            namespace = %namespace,
            applications = apps.len(),
            pending = counts.pending,
            "Refreshed application gauges"
        );

        for ((priority, organization, project), count) in counts.running {
            metrics::jobs_running()
                .with_label_values(&[namespace, &priority, &organization, &project])
                .set(count);
        }
        metrics::jobs_pending()
            .with_label_values(&[namespace])
            .set(counts.pending);
    }
}

/// Run the aggregation loop until cancelled.
pub async fn run_monitor<B: Backlog>(
    backlog: Arc<B>,
    kube: Arc<KubeClient>,
    namespaces: Vec<String>,
    interval: Duration,
    token: CancellationToken,
) {
    info!(interval = ?interval, "Metrics monitor started");

    loop {
        refresh_once(backlog.as_ref(), kube.as_ref(), &namespaces).await;

        tokio::select! {
            _ = token.cancelled() => {
                info!("Metrics monitor stopping");
                break;
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::ApplicationState;

    fn app(state: ApplicationState, priority: &str, org: &str, project: &str) -> SparkApplicationSummary {
        let mut labels = HashMap::new();
        labels.insert("priority".to_string(), priority.to_string());
        labels.insert("organization".to_string(), org.to_string());
        labels.insert("project".to_string(), project.to_string());
        SparkApplicationSummary {
            name: "app".to_string(),
            labels,
            state,
        }
    }

    #[test]
    fn aggregates_running_by_label_set() {
        let apps = vec![
            app(ApplicationState::Running, "high", "acme", "etl"),
            app(ApplicationState::Running, "high", "acme", "etl"),
            app(ApplicationState::Submitted, "low", "acme", "etl"),
            app(ApplicationState::Completed, "high", "acme", "etl"),
        ];
        let counts = aggregate(&apps);

        assert_eq!(
            counts.running
                [&("high".to_string(), "acme".to_string(), "etl".to_string())],
            2
        );
        assert_eq!(
            counts.running[&("low".to_string(), "acme".to_string(), "etl".to_string())],
            1
        );
    }

    #[test]
    fn pending_includes_new_submitted_and_unknown() {
        let apps = vec![
            app(ApplicationState::New, "medium", "a", "p"),
            app(ApplicationState::Submitted, "medium", "a", "p"),
            app(ApplicationState::Unknown("INVALIDATING".to_string()), "medium", "a", "p"),
            app(ApplicationState::Running, "medium", "a", "p"),
            app(ApplicationState::Failed, "medium", "a", "p"),
        ];
        assert_eq!(aggregate(&apps).pending, 3);
    }

    #[test]
    fn missing_labels_bucket_as_unknown() {
        let apps = vec![SparkApplicationSummary {
            name: "bare".to_string(),
            labels: HashMap::new(),
            state: ApplicationState::Running,
        }];
        let counts = aggregate(&apps);
        assert_eq!(
            counts.running[&(
                "unknown".to_string(),
                "unknown".to_string(),
                "unknown".to_string()
            )],
            1
        );
    }

    #[test]
    fn empty_list_aggregates_to_zero() {
        let counts = aggregate(&[]);
        assert!(counts.running.is_empty());
        assert_eq!(counts.pending, 0);
    }
}

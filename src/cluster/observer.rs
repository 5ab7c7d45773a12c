//! Pending-driver observation: the admission gate's liveness signal.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::cluster::client::KubeClient;
use crate::error::Result;
use crate::metrics;

/// Queries admission-relevant cluster state for a single partition.
#[async_trait]
pub trait ClusterObserver: Send + Sync {
    /// Number of driver pods in `Pending` phase in the namespace.
    async fn pending_driver_count(&self, namespace: &str) -> Result<usize>;
}

#[async_trait]
impl ClusterObserver for KubeClient {
    async fn pending_driver_count(&self, namespace: &str) -> Result<usize> {
        self.pending_driver_pods(namespace).await
    }
}

#[async_trait]
impl<T: ClusterObserver + ?Sized> ClusterObserver for std::sync::Arc<T> {
    async fn pending_driver_count(&self, namespace: &str) -> Result<usize> {
        (**self).pending_driver_count(namespace).await
    }
}

/// Check every namespace for pending driver pods.
///
/// Returns `true` if any namespace has at least one pending driver. A single
/// namespace's query failure is logged and counted but contributes zero
/// pending (fail-open): a transient observation error must not wedge the
/// scheduler. Queries are never retried within a tick; the next tick
/// re-observes.
pub async fn has_pending_headroom_blockers<O>(observer: &O, namespaces: &[String]) -> bool
where
    O: ClusterObserver + ?Sized,
{
    let timer = metrics::driver_check_seconds().start_timer();

    let mut total_pending = 0usize;
    for namespace in namespaces {
        match observer.pending_driver_count(namespace).await {
            Ok(count) => {
                metrics::drivers_pending()
                    .with_label_values(&[namespace])
                    .set(count as i64);
                total_pending += count;

                if count > 0 {
                    info!(namespace = %namespace, count, "Pending driver pods");
                }
            }
            Err(e) => {
                warn!(namespace = %namespace, error = %e, "Pending-driver query failed");
                metrics::observer_errors()
                    .with_label_values(&[namespace])
                    .inc();
            }
        }
    }

    timer.observe_duration();
    total_pending > 0
}

//! Cluster-facing pieces: the thin Kubernetes API client, the pending-driver
//! observer that feeds the admission gate, and the Spark application status
//! taxonomy used by the monitor.

pub mod client;
pub mod observer;
pub mod status;

pub use client::{KubeClient, SparkApplicationSummary};
pub use observer::{has_pending_headroom_blockers, ClusterObserver};
pub use status::ApplicationState;

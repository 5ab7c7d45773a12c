//! Backlog source: the durable queue of not-yet-submitted job requests.

pub mod sqs;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;

pub use sqs::SqsBacklog;

/// A raw message received from the backlog.
#[derive(Debug, Clone)]
pub struct BacklogMessage {
    /// Provider-assigned message identifier.
    pub id: String,
    /// Raw message body (JSON string).
    pub body: String,
    /// Opaque handle used to acknowledge the message.
    pub receipt_handle: String,
    /// When the message was sent to the queue.
    pub sent_at: DateTime<Utc>,
    /// Number of times this message has been delivered. Redeliveries of a
    /// failed submission show up here as counts > 1.
    pub delivery_count: u32,
}

/// At-least-once backlog of job requests.
///
/// Messages not acknowledged within the provider's visibility window become
/// eligible for redelivery; that redelivery is the only retry mechanism for
/// failed submissions.
#[async_trait]
pub trait Backlog: Send + Sync {
    /// Pull up to `max_batch` messages. Uses a short wait so the scheduler
    /// loop stays responsive to the admission gate.
    async fn poll(&self, max_batch: u32) -> Result<Vec<BacklogMessage>>;

    /// Acknowledge successful submission; removes the message permanently.
    async fn acknowledge(&self, receipt_handle: &str) -> Result<()>;

    /// Approximate number of messages waiting in the queue.
    async fn depth(&self) -> Result<u64>;

    /// Approximate depth of the dead-letter queue, if one is configured.
    async fn dlq_depth(&self) -> Result<Option<u64>> {
        Ok(None)
    }
}

// The scheduler loop and the monitor task share one backlog handle.
#[async_trait]
impl<T: Backlog + ?Sized> Backlog for std::sync::Arc<T> {
    async fn poll(&self, max_batch: u32) -> Result<Vec<BacklogMessage>> {
        (**self).poll(max_batch).await
    }

    async fn acknowledge(&self, receipt_handle: &str) -> Result<()> {
        (**self).acknowledge(receipt_handle).await
    }

    async fn depth(&self) -> Result<u64> {
        (**self).depth().await
    }

    async fn dlq_depth(&self) -> Result<Option<u64>> {
        (**self).dlq_depth().await
    }
}

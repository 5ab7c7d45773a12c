//! AWS SQS implementation of the backlog.

use async_trait::async_trait;
use aws_sdk_sqs::types::{MessageSystemAttributeName, QueueAttributeName};
use aws_sdk_sqs::Client;
use chrono::{TimeZone, Utc};
use tracing::{debug, info};

use crate::backlog::{Backlog, BacklogMessage};
use crate::config::BacklogConfig;
use crate::error::{Result, SchedulerError};

// SQS caps a single receive at 10 messages.
const SQS_MAX_RECEIVE: u32 = 10;

pub struct SqsBacklog {
    client: Client,
    queue_url: String,
    dlq_url: Option<String>,
    wait_time_secs: i32,
}

impl SqsBacklog {
    /// Create an SQS-backed backlog using the default credential chain
    /// (IAM role for service accounts when running in-cluster).
    pub async fn new(config: &BacklogConfig) -> Result<Self> {
        if config.queue_url.is_empty() {
            return Err(SchedulerError::Config("queue URL is required".to_string()));
        }

        let region = aws_sdk_sqs::config::Region::new(config.region.clone());
        let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(region)
            .load()
            .await;
        let client = Client::new(&aws_config);

        info!(
            queue_url = %config.queue_url,
            region = %config.region,
            "SQS backlog initialized"
        );

        Ok(Self {
            client,
            queue_url: config.queue_url.clone(),
            dlq_url: config.dlq_url.clone(),
            wait_time_secs: config.wait_time.as_secs().min(20) as i32,
        })
    }

    async fn queue_attribute_depth(&self, queue_url: &str) -> Result<u64> {
        let resp = self
            .client
            .get_queue_attributes()
            .queue_url(queue_url)
            .attribute_names(QueueAttributeName::ApproximateNumberOfMessages)
            .send()
            .await
            .map_err(|e| SchedulerError::Backlog(format!("SQS attribute query failed: {e:?}")))?;

        Ok(resp
            .attributes()
            .and_then(|attrs| attrs.get(&QueueAttributeName::ApproximateNumberOfMessages))
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0))
    }
}

#[async_trait]
impl Backlog for SqsBacklog {
    async fn poll(&self, max_batch: u32) -> Result<Vec<BacklogMessage>> {
        let capped = max_batch.min(SQS_MAX_RECEIVE) as i32;

        debug!(max_batch = capped, "Polling SQS");

        let resp = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(capped)
            .wait_time_seconds(self.wait_time_secs)
            .message_system_attribute_names(MessageSystemAttributeName::All)
            .send()
            .await
            .map_err(|e| SchedulerError::Backlog(format!("SQS receive failed: {e:?}")))?;

        let sqs_messages = resp.messages.unwrap_or_default();
        debug!(count = sqs_messages.len(), "Received SQS messages");

        let mut messages = Vec::with_capacity(sqs_messages.len());
        for msg in sqs_messages {
            let receipt_handle = msg
                .receipt_handle()
                .ok_or_else(|| SchedulerError::Backlog("missing receipt handle".to_string()))?
                .to_string();

            // SentTimestamp is epoch millis.
            let sent_at = msg
                .attributes()
                .and_then(|attrs| attrs.get(&MessageSystemAttributeName::SentTimestamp))
                .and_then(|ts| ts.parse::<i64>().ok())
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
                .unwrap_or_else(Utc::now);

            let delivery_count = msg
                .attributes()
                .and_then(|attrs| attrs.get(&MessageSystemAttributeName::ApproximateReceiveCount))
                .and_then(|c| c.parse::<u32>().ok())
                .unwrap_or(1);

            messages.push(BacklogMessage {
                id: msg.message_id().unwrap_or("unknown").to_string(),
                body: msg.body().unwrap_or("").to_string(),
                receipt_handle,
                sent_at,
                delivery_count,
            });
        }

        Ok(messages)
    }

    async fn acknowledge(&self, receipt_handle: &str) -> Result<()> {
        debug!(receipt_handle, "Acknowledging SQS message");

        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| SchedulerError::Backlog(format!("SQS delete failed: {e:?}")))?;

        Ok(())
    }

    async fn depth(&self) -> Result<u64> {
        self.queue_attribute_depth(&self.queue_url).await
    }

    async fn dlq_depth(&self) -> Result<Option<u64>> {
        match &self.dlq_url {
            Some(url) => Ok(Some(self.queue_attribute_depth(url).await?)),
            None => Ok(None),
        }
    }
}

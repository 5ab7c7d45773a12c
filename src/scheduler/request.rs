use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use crate::backlog::BacklogMessage;
use crate::error::{Result, SchedulerError};

/// Priority class of a job request.
///
/// Unknown or missing values are coerced to `Medium` at parse time; an
/// unrecognized priority is never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    /// Fixed weight table used by the arbiter.
    pub fn weight(&self) -> u8 {
        match self {
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }

    /// Lossy parse: anything not in the weight table becomes `Medium`.
    pub fn parse_lossy(raw: &str) -> Self {
        match raw {
            "high" => Priority::High,
            "medium" => Priority::Medium,
            "low" => Priority::Low,
            other => {
                warn!(priority = other, "Unknown priority, defaulting to medium");
                Priority::Medium
            }
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated job request pulled from the backlog.
///
/// Immutable once parsed; acknowledged back to the backlog only after its
/// submission succeeds.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub id: String,
    pub priority: Priority,
    pub organization: String,
    pub project: String,
    /// Target partition (cluster namespace) for the job.
    pub namespace: String,
    /// Opaque job-spec template (YAML string) carried through to submission.
    pub spark_job_yaml: String,
    pub created_at: DateTime<Utc>,
    pub tags: HashMap<String, String>,
    /// Handle for acknowledging the originating message.
    pub receipt_handle: String,
}

impl JobRequest {
    /// Parse a backlog message body into a request.
    ///
    /// Missing or malformed fields are recovered by defaulting (generated
    /// id, medium priority, `unknown` org/project, `default_namespace`).
    /// Only a body that is not a JSON object is rejected.
    pub fn from_message(msg: &BacklogMessage, default_namespace: &str) -> Result<Self> {
        let body: Value = serde_json::from_str(&msg.body).map_err(|e| {
            SchedulerError::Backlog(format!("invalid JSON in message {}: {e}", msg.id))
        })?;

        let obj = body.as_object().ok_or_else(|| {
            SchedulerError::Backlog(format!("message {} body is not a JSON object", msg.id))
        })?;

        let str_field = |key: &str| obj.get(key).and_then(Value::as_str);

        let id = str_field("job_id")
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let priority = str_field("priority")
            .map(Priority::parse_lossy)
            .unwrap_or(Priority::Medium);

        let created_at = str_field("created_at")
            .and_then(|s| s.parse::<DateTime<Utc>>().ok())
            .unwrap_or(msg.sent_at);

        let tags = obj
            .get("tags")
            .and_then(Value::as_object)
            .map(|tags| {
                tags.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            id,
            priority,
            organization: str_field("organization").unwrap_or("unknown").to_string(),
            project: str_field("project").unwrap_or("unknown").to_string(),
            namespace: str_field("namespace").unwrap_or(default_namespace).to_string(),
            spark_job_yaml: str_field("spark_job_yaml").unwrap_or("").to_string(),
            created_at,
            tags,
            receipt_handle: msg.receipt_handle.clone(),
        })
    }
}

/// Result of one submission attempt. Consumed by metrics and by the
/// acknowledgment logic; never surfaced as an error to a caller.
#[derive(Debug)]
pub struct SubmissionOutcome {
    pub request: JobRequest,
    pub submitted: bool,
    /// Name of the created cluster object, present only on success.
    pub cluster_job_name: Option<String>,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(body: &str) -> BacklogMessage {
        BacklogMessage {
            id: "m-1".to_string(),
            body: body.to_string(),
            receipt_handle: "rh-1".to_string(),
            sent_at: Utc::now(),
            delivery_count: 1,
        }
    }

    #[test]
    fn parses_full_message() {
        let msg = message(
            r#"{
                "job_id": "job-42",
                "priority": "high",
                "organization": "acme",
                "project": "etl",
                "namespace": "spark-job1",
                "spark_job_yaml": "apiVersion: sparkoperator.k8s.io/v1beta2",
                "created_at": "2024-03-01T12:00:00Z",
                "tags": {"team": "data"}
            }"#,
        );

        let req = JobRequest::from_message(&msg, "spark-job0").unwrap();
        assert_eq!(req.id, "job-42");
        assert_eq!(req.priority, Priority::High);
        assert_eq!(req.organization, "acme");
        assert_eq!(req.project, "etl");
        assert_eq!(req.namespace, "spark-job1");
        assert_eq!(req.tags.get("team").map(String::as_str), Some("data"));
        assert_eq!(req.receipt_handle, "rh-1");
    }

    #[test]
    fn missing_fields_are_defaulted() {
        let msg = message("{}");
        let req = JobRequest::from_message(&msg, "spark-job0").unwrap();

        assert!(!req.id.is_empty(), "id should be generated");
        assert_eq!(req.priority, Priority::Medium);
        assert_eq!(req.organization, "unknown");
        assert_eq!(req.project, "unknown");
        assert_eq!(req.namespace, "spark-job0");
        assert!(req.spark_job_yaml.is_empty());
        assert!(req.tags.is_empty());
    }

    #[test]
    fn unknown_priority_becomes_medium() {
        let msg = message(r#"{"priority": "urgent"}"#);
        let req = JobRequest::from_message(&msg, "spark-job0").unwrap();
        assert_eq!(req.priority, Priority::Medium);
    }

    #[test]
    fn invalid_json_is_rejected() {
        let msg = message("not json");
        assert!(JobRequest::from_message(&msg, "spark-job0").is_err());
    }

    #[test]
    fn non_object_body_is_rejected() {
        let msg = message(r#"["a", "b"]"#);
        assert!(JobRequest::from_message(&msg, "spark-job0").is_err());
    }

    #[test]
    fn priority_weights() {
        assert_eq!(Priority::High.weight(), 3);
        assert_eq!(Priority::Medium.weight(), 2);
        assert_eq!(Priority::Low.weight(), 1);
    }

    #[test]
    fn priority_parse_lossy() {
        assert_eq!(Priority::parse_lossy("high"), Priority::High);
        assert_eq!(Priority::parse_lossy("low"), Priority::Low);
        assert_eq!(Priority::parse_lossy("HIGH"), Priority::Medium);
        assert_eq!(Priority::parse_lossy(""), Priority::Medium);
    }
}

//! Translates a job request into a SparkApplication object and submits it.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::cluster::KubeClient;
use crate::error::{Result, SchedulerError};
use crate::metrics;
use crate::scheduler::request::{JobRequest, SubmissionOutcome};

/// The slice of the cluster API a submitter needs: a single create call.
#[async_trait]
pub trait SparkApi: Send + Sync {
    async fn create_application(&self, namespace: &str, body: &Value) -> Result<()>;
}

#[async_trait]
impl SparkApi for KubeClient {
    async fn create_application(&self, namespace: &str, body: &Value) -> Result<()> {
        self.create_spark_application(namespace, body).await
    }
}

#[async_trait]
impl<T: SparkApi + ?Sized> SparkApi for std::sync::Arc<T> {
    async fn create_application(&self, namespace: &str, body: &Value) -> Result<()> {
        (**self).create_application(namespace, body).await
    }
}

/// Submits one request and reports the outcome. The loop treats each
/// request's outcome independently; a failed submission is not an error of
/// the dispatcher.
#[async_trait]
pub trait JobSubmitter: Send + Sync {
    async fn submit(&self, request: &JobRequest) -> SubmissionOutcome;
}

#[async_trait]
impl<T: JobSubmitter + ?Sized> JobSubmitter for std::sync::Arc<T> {
    async fn submit(&self, request: &JobRequest) -> SubmissionOutcome {
        (**self).submit(request).await
    }
}

pub struct SparkSubmitter<A> {
    api: A,
}

impl<A: SparkApi> SparkSubmitter<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    /// Build the SparkApplication object from the request's template.
    ///
    /// The generated name includes the submission timestamp in millis, so a
    /// redelivered request gets a distinct name. Duplicate execution remains
    /// possible; it is tolerated, not prevented.
    fn build_application(&self, request: &JobRequest) -> Result<(String, Value)> {
        let template: serde_yaml::Value = serde_yaml::from_str(&request.spark_job_yaml)
            .map_err(|e| SchedulerError::Template(format!("YAML parse failed: {e}")))?;

        let mut app = serde_json::to_value(template)
            .map_err(|e| SchedulerError::Template(format!("template not representable: {e}")))?;

        if !app.is_object() {
            return Err(SchedulerError::Template(
                "job template must be a YAML mapping".to_string(),
            ));
        }

        let job_name = format!("{}-{}", request.id, Utc::now().timestamp_millis());

        let metadata = app
            .as_object_mut()
            .expect("checked object above")
            .entry("metadata")
            .or_insert_with(|| json!({}));
        if !metadata.is_object() {
            return Err(SchedulerError::Template(
                "template metadata must be a mapping".to_string(),
            ));
        }
        let metadata = metadata.as_object_mut().expect("checked object above");

        metadata.insert("name".to_string(), json!(job_name));
        metadata.insert("namespace".to_string(), json!(request.namespace));

        let labels = metadata
            .entry("labels")
            .or_insert_with(|| json!({}))
            .as_object_mut()
            .ok_or_else(|| {
                SchedulerError::Template("template labels must be a mapping".to_string())
            })?;
        labels.insert("priority".to_string(), json!(request.priority.as_str()));
        labels.insert("organization".to_string(), json!(request.organization));
        labels.insert("project".to_string(), json!(request.project));
        labels.insert("job-id".to_string(), json!(request.id));
        labels.insert("managed-by".to_string(), json!("sparkgate"));

        let annotations = metadata
            .entry("annotations")
            .or_insert_with(|| json!({}))
            .as_object_mut()
            .ok_or_else(|| {
                SchedulerError::Template("template annotations must be a mapping".to_string())
            })?;
        annotations.insert(
            "sparkgate/created-at".to_string(),
            json!(request.created_at.to_rfc3339()),
        );
        annotations.insert(
            "sparkgate/priority".to_string(),
            json!(request.priority.as_str()),
        );
        annotations.insert(
            "sparkgate/tags".to_string(),
            json!(serde_json::to_string(&request.tags).unwrap_or_else(|_| "{}".to_string())),
        );

        Ok((job_name, app))
    }

    fn record_outcome(&self, request: &JobRequest, submitted: bool) {
        let labels = [
            request.namespace.as_str(),
            request.priority.as_str(),
            request.organization.as_str(),
            request.project.as_str(),
        ];
        if submitted {
            metrics::jobs_submitted().with_label_values(&labels).inc();
        } else {
            metrics::jobs_failed().with_label_values(&labels).inc();
        }
    }
}

#[async_trait]
impl<A: SparkApi> JobSubmitter for SparkSubmitter<A> {
    async fn submit(&self, request: &JobRequest) -> SubmissionOutcome {
        let (job_name, app) = match self.build_application(request) {
            Ok(built) => built,
            Err(e) => {
                error!(job_id = %request.id, error = %e, "Failed to build Spark application");
                self.record_outcome(request, false);
                return SubmissionOutcome {
                    request: request.clone(),
                    submitted: false,
                    cluster_job_name: None,
                    error: Some(e.to_string()),
                };
            }
        };

        match self.api.create_application(&request.namespace, &app).await {
            Ok(()) => {
                info!(
                    job = %job_name,
                    namespace = %request.namespace,
                    priority = %request.priority,
                    "Submitted Spark job"
                );
                self.record_outcome(request, true);
                SubmissionOutcome {
                    request: request.clone(),
                    submitted: true,
                    cluster_job_name: Some(job_name),
                    error: None,
                }
            }
            Err(e) => {
                error!(job_id = %request.id, error = %e, "Failed to submit Spark job");
                self.record_outcome(request, false);
                SubmissionOutcome {
                    request: request.clone(),
                    submitted: false,
                    cluster_job_name: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

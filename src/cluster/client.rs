//! Minimal Kubernetes API client.
//!
//! The scheduler needs four calls: list namespaces, list driver pods, create
//! a SparkApplication, and list SparkApplications. Plain REST over the
//! in-cluster API server covers these without pulling in a full client
//! machinery.

use std::collections::HashMap;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cluster::status::ApplicationState;
use crate::error::{Result, SchedulerError};

/// Spark operator CRD coordinates.
pub const SPARK_API_GROUP: &str = "sparkoperator.k8s.io";
pub const SPARK_API_VERSION: &str = "v1beta2";
pub const SPARK_API_PLURAL: &str = "sparkapplications";

/// Label selector identifying Spark driver pods.
pub const DRIVER_LABEL_SELECTOR: &str = "spark-role=driver";

const SERVICE_ACCOUNT_TOKEN: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";
const SERVICE_ACCOUNT_CA: &str = "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt";

#[derive(Debug, Deserialize)]
struct ObjectMeta {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct NamespaceItem {
    metadata: ObjectMeta,
}

#[derive(Debug, Deserialize)]
struct NamespaceList {
    #[serde(default)]
    items: Vec<NamespaceItem>,
}

#[derive(Debug, Deserialize)]
struct PodStatus {
    #[serde(default)]
    phase: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PodItem {
    metadata: ObjectMeta,
    #[serde(default)]
    status: Option<PodStatus>,
}

#[derive(Debug, Deserialize)]
struct PodList {
    #[serde(default)]
    items: Vec<PodItem>,
}

/// Label/state summary of one SparkApplication, as consumed by the monitor.
#[derive(Debug, Clone)]
pub struct SparkApplicationSummary {
    pub name: String,
    pub labels: HashMap<String, String>,
    pub state: ApplicationState,
}

pub struct KubeClient {
    http: reqwest::Client,
    base_url: String,
}

impl KubeClient {
    /// Connect using the pod's service account (token + cluster CA).
    /// `KUBE_API_SERVER` overrides the in-cluster default for development.
    pub async fn in_cluster() -> Result<Self> {
        let base_url = std::env::var("KUBE_API_SERVER")
            .unwrap_or_else(|_| "https://kubernetes.default.svc".to_string());

        let token = tokio::fs::read_to_string(SERVICE_ACCOUNT_TOKEN)
            .await
            .map_err(|e| {
                SchedulerError::Config(format!("cannot read service account token: {e}"))
            })?;

        let ca_pem = tokio::fs::read(SERVICE_ACCOUNT_CA).await.ok();

        Self::new(base_url, token.trim(), ca_pem)
    }

    /// Build a client against an arbitrary API server endpoint.
    pub fn new(base_url: String, token: &str, ca_pem: Option<Vec<u8>>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| SchedulerError::Config(format!("invalid API token: {e}")))?;
        headers.insert(AUTHORIZATION, bearer);

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(30));

        if let Some(pem) = ca_pem {
            let cert = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| SchedulerError::Config(format!("invalid cluster CA: {e}")))?;
            builder = builder.add_root_certificate(cert);
        }

        let http = builder.build()?;

        info!(api_server = %base_url, "Kubernetes client initialized");

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn spark_app_path(&self, namespace: &str) -> String {
        format!(
            "{}/apis/{}/{}/namespaces/{}/{}",
            self.base_url, SPARK_API_GROUP, SPARK_API_VERSION, namespace, SPARK_API_PLURAL
        )
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: String) -> Result<T> {
        let resp = self.http.get(&url).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(SchedulerError::Cluster(format!(
                "GET {url} returned {status}: {body}"
            )));
        }
        Ok(resp.json::<T>().await?)
    }

    /// List namespaces whose name starts with `prefix`, sorted.
    pub async fn discover_namespaces(&self, prefix: &str) -> Result<Vec<String>> {
        let list: NamespaceList = self
            .get_json(format!("{}/api/v1/namespaces", self.base_url))
            .await?;

        let mut names: Vec<String> = list
            .items
            .into_iter()
            .map(|ns| ns.metadata.name)
            .filter(|name| name.starts_with(prefix))
            .collect();
        names.sort();

        debug!(prefix, count = names.len(), "Discovered namespaces");
        Ok(names)
    }

    /// Count driver pods in `Pending` phase in the given namespace.
    pub async fn pending_driver_pods(&self, namespace: &str) -> Result<usize> {
        let url = format!(
            "{}/api/v1/namespaces/{}/pods?labelSelector={}",
            self.base_url, namespace, DRIVER_LABEL_SELECTOR
        );
        let pods: PodList = self.get_json(url).await?;

        let pending = pods
            .items
            .iter()
            .filter(|pod| {
                pod.status
                    .as_ref()
                    .and_then(|s| s.phase.as_deref())
                    .map(|phase| phase == "Pending")
                    .unwrap_or(false)
            })
            .inspect(|pod| {
                debug!(pod = %pod.metadata.name, namespace, "Found pending driver pod");
            })
            .count();

        Ok(pending)
    }

    /// Create a SparkApplication object in the given namespace.
    pub async fn create_spark_application(&self, namespace: &str, body: &Value) -> Result<()> {
        let url = self.spark_app_path(namespace);
        let resp = self.http.post(&url).json(body).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let detail = resp.text().await.unwrap_or_default();
            return Err(SchedulerError::Cluster(format!(
                "create in {namespace} returned {status}: {detail}"
            )));
        }

        Ok(())
    }

    /// List SparkApplications in the given namespace with their labels and
    /// operator-reported state.
    pub async fn list_spark_applications(
        &self,
        namespace: &str,
    ) -> Result<Vec<SparkApplicationSummary>> {
        let list: Value = self.get_json(self.spark_app_path(namespace)).await?;

        let items = match list.get("items").and_then(Value::as_array) {
            Some(items) => items,
            None => return Ok(Vec::new()),
        };

        let mut summaries = Vec::with_capacity(items.len());
        for item in items {
            let metadata = item.get("metadata");
            let name = metadata
                .and_then(|m| m.get("name"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();

            let labels = metadata
                .and_then(|m| m.get("labels"))
                .and_then(Value::as_object)
                .map(|obj| {
                    obj.iter()
                        .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                        .collect()
                })
                .unwrap_or_default();

            let raw_state = item
                .get("status")
                .and_then(|s| s.get("applicationState"))
                .and_then(|s| s.get("state"))
                .and_then(Value::as_str)
                .unwrap_or("");

            let state = ApplicationState::parse(raw_state);
            if let ApplicationState::Unknown(ref raw) = state {
                warn!(application = %name, state = %raw, "Unrecognized application state");
            }

            summaries.push(SparkApplicationSummary {
                name,
                labels,
                state,
            });
        }

        Ok(summaries)
    }
}

use std::time::Duration;

/// Default namespaces used when discovery fails or matches nothing.
pub const FALLBACK_NAMESPACES: &[&str] = &["spark-job0", "spark-job1"];

/// Configuration for the SQS backlog.
#[derive(Debug, Clone)]
pub struct BacklogConfig {
    /// URL of the job queue.
    pub queue_url: String,
    /// URL of the dead-letter queue, if one is configured.
    /// The scheduler never dead-letters messages itself; this is only
    /// observed for the depth gauge.
    pub dlq_url: Option<String>,
    /// AWS region for the SQS client.
    pub region: String,
    /// Long-poll wait per receive call. Kept short so the loop stays
    /// responsive to the admission gate.
    pub wait_time: Duration,
}

impl Default for BacklogConfig {
    fn default() -> Self {
        Self {
            queue_url: String::new(),
            dlq_url: None,
            region: "us-west-2".to_string(),
            wait_time: Duration::from_secs(1),
        }
    }
}

/// How the scheduler finds the namespaces it routes jobs into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamespaceSelection {
    /// Explicit list, no discovery.
    Explicit(Vec<String>),
    /// Discover namespaces whose name starts with the prefix.
    DiscoverByPrefix(String),
}

impl Default for NamespaceSelection {
    fn default() -> Self {
        NamespaceSelection::DiscoverByPrefix("spark-job".to_string())
    }
}

/// Configuration for the scheduler loop and its collaborators.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Maximum number of requests pulled from the backlog per poll.
    pub batch_size: u32,
    /// Minimum time between backlog polls.
    pub poll_interval: Duration,
    /// Cadence of the headroom check; this is the loop tick.
    pub driver_check_interval: Duration,
    /// Consecutive tick failures before health is reported unhealthy.
    pub max_consecutive_errors: u32,
    /// Target namespace selection.
    pub namespaces: NamespaceSelection,
    pub backlog: BacklogConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            poll_interval: Duration::from_secs(5),
            driver_check_interval: Duration::from_secs(1),
            max_consecutive_errors: 5,
            namespaces: NamespaceSelection::default(),
            backlog: BacklogConfig::default(),
        }
    }
}

impl SchedulerConfig {
    pub fn with_namespaces(mut self, namespaces: Vec<String>) -> Self {
        self.namespaces = NamespaceSelection::Explicit(namespaces);
        self
    }

    /// Validate constraints that clap cannot express.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.batch_size == 0 {
            return Err(crate::error::SchedulerError::Config(
                "batch size must be at least 1".to_string(),
            ));
        }
        if self.poll_interval < self.driver_check_interval {
            return Err(crate::error::SchedulerError::Config(
                "poll interval must not be shorter than the driver check interval".to_string(),
            ));
        }
        if let NamespaceSelection::Explicit(ref list) = self.namespaces {
            if list.is_empty() {
                return Err(crate::error::SchedulerError::Config(
                    "explicit namespace list must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

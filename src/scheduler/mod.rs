pub mod arbiter;
pub mod request;
pub mod runner;
pub mod submitter;

pub use request::{JobRequest, Priority, SubmissionOutcome};
pub use runner::{Scheduler, SchedulerHealth, TickOutcome};
pub use submitter::{JobSubmitter, SparkApi, SparkSubmitter};

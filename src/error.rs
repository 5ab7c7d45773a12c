use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("backlog error: {0}")]
    Backlog(String),

    #[error("cluster API error: {0}")]
    Cluster(String),

    #[error("invalid job template: {0}")]
    Template(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;

pub mod backlog;
pub mod cluster;
pub mod config;
pub mod error;
pub mod metrics;
pub mod monitor;
pub mod scheduler;
pub mod server;
pub mod shutdown;

//! Prometheus metrics for the scheduler.
//!
//! All metrics live in the default registry and are exposed by the HTTP
//! server in text exposition format. Recording a metric never fails
//! scheduling; registration failures abort at startup.

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    register_int_gauge_vec, Histogram, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
};

lazy_static! {
    static ref JOBS_RECEIVED: IntCounterVec = register_int_counter_vec!(
        "jobs_received_total",
        "Total job requests received from the backlog",
        &["priority", "organization", "project"]
    )
    .expect("failed to register metric: jobs_received_total");

    static ref JOBS_SUBMITTED: IntCounterVec = register_int_counter_vec!(
        "jobs_submitted_total",
        "Total Spark jobs submitted to the operator",
        &["namespace", "priority", "organization", "project"]
    )
    .expect("failed to register metric: jobs_submitted_total");

    static ref JOBS_FAILED: IntCounterVec = register_int_counter_vec!(
        "jobs_failed_total",
        "Total failed Spark job submissions",
        &["namespace", "priority", "organization", "project"]
    )
    .expect("failed to register metric: jobs_failed_total");

    static ref POLL_SKIPPED: IntCounter = register_int_counter!(
        "poll_skipped_total",
        "Total backlog polls skipped because of pending driver pods"
    )
    .expect("failed to register metric: poll_skipped_total");

    static ref OBSERVER_ERRORS: IntCounterVec = register_int_counter_vec!(
        "observer_errors_total",
        "Total failed pending-driver queries, per namespace",
        &["namespace"]
    )
    .expect("failed to register metric: observer_errors_total");

    static ref QUEUE_DEPTH: IntGauge = register_int_gauge!(
        "queue_depth",
        "Approximate number of messages waiting in the backlog"
    )
    .expect("failed to register metric: queue_depth");

    static ref DLQ_DEPTH: IntGauge = register_int_gauge!(
        "dlq_depth",
        "Approximate number of messages in the dead-letter queue"
    )
    .expect("failed to register metric: dlq_depth");

    static ref JOBS_RUNNING: IntGaugeVec = register_int_gauge_vec!(
        "jobs_running",
        "Spark applications currently running or submitted",
        &["namespace", "priority", "organization", "project"]
    )
    .expect("failed to register metric: jobs_running");

    static ref JOBS_PENDING: IntGaugeVec = register_int_gauge_vec!(
        "jobs_pending",
        "Spark applications not yet scheduled, per namespace",
        &["namespace"]
    )
    .expect("failed to register metric: jobs_pending");

    static ref DRIVERS_PENDING: IntGaugeVec = register_int_gauge_vec!(
        "drivers_pending",
        "Spark driver pods in Pending phase, per namespace",
        &["namespace"]
    )
    .expect("failed to register metric: drivers_pending");

    static ref SCHEDULER_HEALTH: IntGauge = register_int_gauge!(
        "scheduler_health",
        "Scheduler health status (1=healthy, 0=unhealthy)"
    )
    .expect("failed to register metric: scheduler_health");

    static ref JOB_PROCESSING_SECONDS: Histogram = register_histogram!(
        "job_processing_seconds",
        "Time spent processing a single job request"
    )
    .expect("failed to register metric: job_processing_seconds");

    static ref DRIVER_CHECK_SECONDS: Histogram = register_histogram!(
        "driver_check_seconds",
        "Time spent checking for pending driver pods"
    )
    .expect("failed to register metric: driver_check_seconds");
}

pub fn jobs_received() -> &'static IntCounterVec {
    &JOBS_RECEIVED
}

pub fn jobs_submitted() -> &'static IntCounterVec {
    &JOBS_SUBMITTED
}

pub fn jobs_failed() -> &'static IntCounterVec {
    &JOBS_FAILED
}

pub fn poll_skipped() -> &'static IntCounter {
    &POLL_SKIPPED
}

pub fn observer_errors() -> &'static IntCounterVec {
    &OBSERVER_ERRORS
}

pub fn queue_depth() -> &'static IntGauge {
    &QUEUE_DEPTH
}

pub fn dlq_depth() -> &'static IntGauge {
    &DLQ_DEPTH
}

pub fn jobs_running() -> &'static IntGaugeVec {
    &JOBS_RUNNING
}

pub fn jobs_pending() -> &'static IntGaugeVec {
    &JOBS_PENDING
}

pub fn drivers_pending() -> &'static IntGaugeVec {
    &DRIVERS_PENDING
}

pub fn scheduler_health() -> &'static IntGauge {
    &SCHEDULER_HEALTH
}

pub fn job_processing_seconds() -> &'static Histogram {
    &JOB_PROCESSING_SECONDS
}

pub fn driver_check_seconds() -> &'static Histogram {
    &DRIVER_CHECK_SECONDS
}

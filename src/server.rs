//! Metrics and health HTTP surface.
//!
//! Always queryable, even while the loop is degraded: `/metrics` serves the
//! Prometheus registry in text exposition format, `/healthz` serves the
//! latest health snapshot published by the scheduler loop.

use std::net::SocketAddr;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::scheduler::SchedulerHealth;

#[derive(Clone)]
struct ServerState {
    health_rx: watch::Receiver<SchedulerHealth>,
}

#[derive(Serialize)]
struct HealthResponse {
    healthy: bool,
    consecutive_errors: u32,
    last_successful_poll: Option<DateTime<Utc>>,
}

pub async fn run_server(
    addr: SocketAddr,
    health_rx: watch::Receiver<SchedulerHealth>,
    token: CancellationToken,
) {
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(health_handler))
        .with_state(ServerState { health_rx });

    tracing::info!(addr = %addr, "Starting metrics server");

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(addr = %addr, error = %e, "Failed to bind metrics server");
            return;
        }
    };

    let shutdown = async move { token.cancelled().await };
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
    {
        tracing::error!(error = %e, "Metrics server failed");
    }
}

async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&families, &mut buffer) {
        tracing::warn!(error = %e, "Metrics encoding failed");
        return (StatusCode::INTERNAL_SERVER_ERROR, String::new());
    }

    (
        StatusCode::OK,
        String::from_utf8(buffer).unwrap_or_default(),
    )
}

async fn health_handler(State(state): State<ServerState>) -> impl IntoResponse {
    let snapshot = state.health_rx.borrow().clone();

    let status = if snapshot.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            healthy: snapshot.healthy,
            consecutive_errors: snapshot.consecutive_errors,
            last_successful_poll: snapshot.last_successful_poll,
        }),
    )
}

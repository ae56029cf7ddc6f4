// src/api.rs
//! Small HTTP surface: liveness, last run status, and an on-demand trigger.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

use crate::metrics::Metrics;
use crate::pipeline::{PipelineError, RunReport};
use crate::scheduler::Runner;

#[derive(Clone)]
pub struct AppState {
    pub runner: Arc<Runner>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/status", get(status))
        .route("/run", post(run))
        .with_state(state)
}

/// `router` plus `/metrics` when a recorder is installed.
pub fn router_with_metrics(state: AppState, metrics: Option<&Metrics>) -> Router {
    let app = router(state);
    match metrics {
        Some(m) => app.merge(m.router()),
        None => app,
    }
}

async fn status(State(state): State<AppState>) -> Json<Option<RunReport>> {
    Json(state.runner.last_report())
}

async fn run(State(state): State<AppState>) -> Response {
    match state.runner.run_now().await {
        Ok(report) => Json(report).into_response(),
        Err(PipelineError::Busy) => {
            (StatusCode::CONFLICT, "a run is already in progress").into_response()
        }
        Err(e) => {
            tracing::warn!("on-demand run failed: {e:#}");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

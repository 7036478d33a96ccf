//! HTTP handlers for the exposition endpoint and the JSON API

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::models::{Analysis, TriggeredAlert};
use crate::registry::MetricsRegistry;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// The published-cycle registry, shared with the scheduler
    pub registry: Arc<MetricsRegistry>,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    /// Always "ok" when the process is serving
    pub status: String,
    /// Crate version
    pub version: String,
}

/// Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Prometheus exposition endpoint
///
/// Gauges come from the single cycle published most recently; the scrape
/// never mixes two cycles. Never triggers a collection.
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    match state.registry.render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// The most recently published analysis as JSON
pub async fn costs_summary(State(state): State<AppState>) -> Json<Analysis> {
    Json(state.registry.current().analysis.clone())
}

/// The alerts that fired in the most recent cycle
pub async fn alerts(State(state): State<AppState>) -> Json<Vec<TriggeredAlert>> {
    Json(state.registry.current().alerts.clone())
}

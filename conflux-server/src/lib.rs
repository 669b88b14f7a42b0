//! Shared types and HTTP API for the conflux server.

mod config;
mod service;

use axum::{
    extract::{Path, State},
    response::Json,
    routing::get,
    Router,
};
use conflux_apps::{ApplicationConfiguration, ApplicationId};
use conflux_types::Composed;
use serde::{Deserialize, Serialize};

pub use config::ServerConfig;
pub use service::{ApplicationEngine, ApplicationRegistry, Conflux};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: String,
    pub applications: usize,
    pub fragments: usize,
}

async fn applications_handler(State(engine): State<ApplicationEngine>) -> Json<Vec<ApplicationId>> {
    let mut applications: Vec<_> = engine.composition_keys().into_iter().collect();
    applications.sort();
    Json(applications)
}

async fn application_handler(
    State(engine): State<ApplicationEngine>,
    Path(application_id): Path<ApplicationId>,
) -> Json<Composed<ApplicationId, ApplicationConfiguration>> {
    Json(engine.find_composed(&application_id))
}

async fn health_handler(State(engine): State<ApplicationEngine>) -> Json<HealthResponse> {
    let status = if engine.is_closed() { "closed" } else { "ok" };
    Json(HealthResponse {
        status: status.to_string(),
        applications: engine.composition_keys().len(),
        fragments: engine.fragment_count(),
    })
}

/// Build the HTTP API router over the given engine.
///
/// Unknown applications are not an error: they are reported with a `null`
/// configuration.
pub fn build_router(engine: ApplicationEngine) -> Router {
    Router::new()
        .route("/api/v1/applications", get(applications_handler))
        .route("/api/v1/applications/{id}", get(application_handler))
        .route("/api/v1/health", get(health_handler))
        .with_state(engine)
}

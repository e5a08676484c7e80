//! REST API endpoints.
//!
//! Axum-based HTTP API for loading an athlete, watching the load, and
//! reading the filtered report and its CSV exports.

pub mod routes;
pub mod state;

use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use thiserror::Error;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::sync::SyncError;
use state::AppState;

/// API error types.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::Upstream(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let body = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<crate::fetch::FetchError> for ApiError {
    fn from(err: crate::fetch::FetchError) -> Self {
        ApiError::Upstream(err.to_string())
    }
}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::InvalidAthlete(id) => ApiError::BadRequest(format!("invalid athlete id: {}", id)),
            SyncError::Superseded(id) => ApiError::Conflict(format!("load of {} was superseded", id)),
            SyncError::Fetch(e) => ApiError::Upstream(e.to_string()),
            SyncError::Failed(msg) => ApiError::Upstream(msg),
            SyncError::Task(msg) => ApiError::Internal(msg),
        }
    }
}

fn cors_layer(origin: &str) -> CorsLayer {
    if origin == "*" {
        return CorsLayer::permissive();
    }
    match HeaderValue::from_str(origin) {
        Ok(value) => CorsLayer::new()
            .allow_origin(AllowOrigin::exact(value))
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any),
        Err(_) => {
            tracing::warn!("Invalid CORS origin {:?}, allowing any", origin);
            CorsLayer::permissive()
        }
    }
}

/// Build the API router.
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.cors_origin);

    Router::new()
        .route("/api/health", get(routes::health))
        .route("/api/search", get(routes::search::search))
        .route("/api/athletes/:id/load", post(routes::athletes::load))
        .route("/api/athletes/:id/status", get(routes::athletes::status))
        .route("/api/athletes/:id/report", get(routes::athletes::report))
        .route("/api/athletes/:id/matches", get(routes::athletes::matches))
        .route("/api/athletes/:id/matches.csv", get(routes::athletes::matches_csv))
        .route("/api/athletes/:id/seasons.csv", get(routes::athletes::seasons_csv))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

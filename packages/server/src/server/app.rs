//! Application setup and server configuration.

use std::sync::Arc;

use axum::{
    extract::Extension,
    routing::{get, post},
    Router,
};
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

use crate::domains::login::LoginOrchestrator;
use crate::server::routes::{
    health_handler, request_code_handler, submit_code_handler, submit_password_handler,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub orchestrator: Arc<LoginOrchestrator>,
}

/// Build the Axum application router
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/login/request-code", post(request_code_handler))
        .route("/api/login/submit-code", post(submit_code_handler))
        .route("/api/login/submit-password", post(submit_password_handler))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(state))
}

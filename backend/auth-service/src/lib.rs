// Auth Service Library

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod security;
pub mod services;
pub mod validators;

#[cfg(test)]
mod tests;

use axum::{
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub use error::{AuthError, Result};
pub use services::{AuthService, EngineSettings};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<AuthService>,
    /// Shared secret for `/admin` routes; `None` disables them
    pub admin_key: Option<Arc<str>>,
}

impl AppState {
    pub fn new(engine: Arc<AuthService>, admin_key: Option<String>) -> Self {
        Self {
            engine,
            admin_key: admin_key.map(Arc::from),
        }
    }
}

/// Health check endpoint
async fn health_check() -> Json<Value> {
    Json(json!({ "status": "healthy", "service": "auth-service" }))
}

pub fn build_router(state: AppState) -> Router {
    let admin = Router::new()
        .route("/principals/:identifier/unlock", post(handlers::admin::unlock))
        .route("/principals/:identifier/revoke", post(handlers::admin::revoke_all))
        .route(
            "/principals/:identifier/deactivate",
            post(handlers::admin::deactivate),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            handlers::admin::require_admin_key,
        ));

    Router::new()
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/verify", post(handlers::verify))
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/change-password", post(handlers::change_password))
        .nest("/admin", admin)
        .route("/health", get(health_check))
        .route("/metrics", get(metrics::metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

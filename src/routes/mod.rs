pub mod export;
pub mod generate;
pub mod health;
pub mod provider;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};

use crate::AppState;
use crate::error::AppError;

const BODY_LIMIT_BYTES: usize = 10 * 1024 * 1024;

pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/generate", post(generate::generate))
        .route("/api/export", post(export::export))
        .route("/api/provider", post(provider::switch_provider))
        .route("/api/status", get(provider::status))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .with_state(state)
}

async fn not_found() -> AppError {
    AppError::NotFound
}

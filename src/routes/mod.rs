//! Router assembly: HTTP endpoints, WebSocket upgrade, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket at `/ws`
/// - REST-ish API under `/api/v1/...`
/// - CORS (allow any origin/method/headers), adjust for production if needed
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_upgrade))
        // HTTP API
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/quiz", post(http::http_start_quiz))
        .route("/api/v1/quiz/:id", get(http::http_get_session))
        .route("/api/v1/quiz/:id/answer", post(http::http_post_answer))
        .route("/api/v1/quiz/:id/review", get(http::http_get_review))
        .route("/api/v1/quiz/:id/wrong/:index/similar", post(http::http_post_similar))
        .route("/api/v1/quiz/:id/wrong/:index/regenerate", post(http::http_post_regenerate))
        .route("/api/v1/generate", post(http::http_post_generate))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

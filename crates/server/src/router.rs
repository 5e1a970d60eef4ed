//! HTTP router construction.
//!
//! Assembles all Axum routes, middleware, and OpenAPI docs into a single `Router`.

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::api;
use crate::state::AppState;

/// `*` keeps the permissive layer; anything else pins a single origin.
fn cors_layer(origin: &str) -> CorsLayer {
    if origin.trim() == "*" {
        return CorsLayer::permissive();
    }
    match HeaderValue::from_str(origin.trim()) {
        Ok(value) => CorsLayer::new()
            .allow_origin(AllowOrigin::exact(value))
            .allow_methods(Any)
            .allow_headers(Any),
        Err(_) => {
            tracing::warn!(origin, "invalid CORS_ORIGIN, falling back to permissive CORS");
            CorsLayer::permissive()
        }
    }
}

/// Build the complete application router with all routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.server.cors_origin);

    Router::new()
        .route("/health", get(api::health::health))
        .route(
            "/api/agent/messages",
            get(api::agent::list_messages).post(api::agent::send_message),
        )
        .route("/api/agent/poll", get(api::agent::poll))
        .route(
            "/api/remix-agent/messages",
            get(api::remix_agent::list_messages).post(api::remix_agent::send_message),
        )
        .route("/api/remix-agent/remix", post(api::remix_agent::remix))
        .route("/api/remix-agent/wake", post(api::remix_agent::wake))
        .route("/api/remix-agent/state", get(api::remix_agent::agent_state))
        .route("/api/remix-agent/list-agents", get(api::remix_agent::list_agents))
        .route("/api/remix-agent/files", get(api::remix_agent::read_file))
        .route("/api/remix-agent/session", post(api::remix_agent::create_session))
        .layer(cors)
        .with_state(state)
        .merge(Scalar::with_url("/docs", api::doc::ApiDoc::openapi()))
}

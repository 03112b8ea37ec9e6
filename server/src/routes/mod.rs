//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! This module binds the HTTP API, the websocket endpoint, and the static
//! `/media` mount for screenshot blobs under a single Axum router. The
//! browser client is served separately; this process is API-only.

pub mod auth;
pub mod uploads;
pub mod workspaces;
pub mod ws;

use std::path::PathBuf;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::state::AppState;

fn permissive_cors() -> CorsLayer {
    CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
}

/// API + websocket routes.
fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/auth/guest", post(auth::guest))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/ws-ticket", post(auth::ws_ticket))
        .route(
            "/api/workspaces",
            get(workspaces::list_workspaces_rest).post(workspaces::create_workspace_rest),
        )
        .route("/api/workspaces/{id}", get(workspaces::get_workspace_rest))
        .route(
            "/api/workspaces/{id}/screenshots",
            post(uploads::upload_screenshot).layer(DefaultBodyLimit::max(uploads::MAX_UPLOAD_BODY_BYTES)),
        )
        .route("/api/ws", get(ws::handle_ws))
        .route("/healthz", get(|| async { StatusCode::OK }))
        .layer(permissive_cors())
        .with_state(state)
}

/// Full application router: API routes plus screenshot blobs read-only
/// under `/media`.
pub fn app(state: AppState, media_root: PathBuf) -> Router {
    api_routes(state).nest_service("/media", ServeDir::new(media_root))
}

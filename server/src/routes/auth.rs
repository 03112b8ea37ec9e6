//! Auth routes — guest registration, session management, WS tickets.
//!
//! Sessions are bearer tokens: the client stores the token from
//! `POST /api/auth/guest` and sends it in the `Authorization` header.
//! WebSocket upgrades cannot carry that header from a browser, so clients
//! trade the session for a one-time ticket first.

use axum::extract::{FromRef, State};
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::response::Json;
use uuid::Uuid;

use crate::services::session;
use crate::state::AppState;

/// Extract the token from an `Authorization: Bearer <token>` header.
/// Scheme matching is strict.
fn bearer_token(headers: &axum::http::HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

// =============================================================================
// AUTH EXTRACTOR
// =============================================================================

/// Authenticated user extracted from the bearer token.
/// Use as a handler parameter to require authentication.
pub struct AuthUser {
    pub user_id: Uuid,
    pub token: String,
}

impl<S> axum::extract::FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut axum::http::request::Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(StatusCode::UNAUTHORIZED)?;

        let app_state = AppState::from_ref(state);
        match session::validate_session(&app_state.pool, token).await {
            Ok(Some(user_id)) => Ok(Self { user_id, token: token.to_owned() }),
            Ok(None) => Err(StatusCode::UNAUTHORIZED),
            Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

/// `POST /api/auth/guest` — mint an anonymous user and a session token.
pub async fn guest(State(state): State<AppState>) -> Result<Json<serde_json::Value>, StatusCode> {
    let (user_id, token) = session::register_guest(&state.pool).await.map_err(|e| {
        tracing::error!(error = %e, "guest registration failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(Json(serde_json::json!({ "user_id": user_id, "token": token })))
}

/// `POST /api/auth/logout` — delete the session behind the presented token.
pub async fn logout(State(state): State<AppState>, auth: AuthUser) -> StatusCode {
    let _ = session::delete_session(&state.pool, &auth.token).await;
    StatusCode::NO_CONTENT
}

/// `POST /api/auth/ws-ticket` — trade the session for a one-time WS ticket.
pub async fn ws_ticket(State(state): State<AppState>, auth: AuthUser) -> Result<Json<serde_json::Value>, StatusCode> {
    match session::create_ws_ticket(&state.pool, auth.user_id).await {
        Ok(ticket) => Ok(Json(serde_json::json!({ "ticket": ticket }))),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;

//! Guest identity, session tokens, and one-time websocket tickets.
//!
//! ARCHITECTURE
//! ============
//! There are no accounts. `register_guest` mints a bare user row plus a
//! long-lived session token, and every HTTP request authenticates with
//! that bearer token. Websocket upgrades cannot carry headers from a
//! browser, so they authenticate with a short-lived single-use ticket
//! fetched over HTTP instead; the session token itself never appears in
//! a WS URL.
//!
//! Expiry lives in the schema (`now() + interval` defaults), so tokens
//! and tickets age out without any server-side clock handling.

use std::fmt::Write;

use rand::Rng;
use sqlx::PgPool;
use uuid::Uuid;

pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

/// A 64-char hex session token from 32 random bytes.
#[must_use]
pub fn generate_token() -> String {
    bytes_to_hex(&rand::rng().random::<[u8; 32]>())
}

/// A 32-char hex websocket ticket from 16 random bytes.
#[must_use]
pub(crate) fn generate_ws_ticket() -> String {
    bytes_to_hex(&rand::rng().random::<[u8; 16]>())
}

/// Mint a guest user and an initial session, returning `(user_id, token)`.
pub async fn register_guest(pool: &PgPool) -> Result<(Uuid, String), sqlx::Error> {
    let user_id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id) VALUES ($1)")
        .bind(user_id)
        .execute(pool)
        .await?;

    let token = create_session(pool, user_id).await?;
    Ok((user_id, token))
}

/// Open a session for an existing user and return its token.
pub async fn create_session(pool: &PgPool, user_id: Uuid) -> Result<String, sqlx::Error> {
    let token = generate_token();
    sqlx::query("INSERT INTO sessions (token, user_id) VALUES ($1, $2)")
        .bind(&token)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(token)
}

/// Resolve an unexpired session token to its user id.
pub async fn validate_session(pool: &PgPool, token: &str) -> Result<Option<Uuid>, sqlx::Error> {
    sqlx::query_scalar("SELECT user_id FROM sessions WHERE token = $1 AND expires_at > now()")
        .bind(token)
        .fetch_optional(pool)
        .await
}

/// Log out: remove the session row. Unknown tokens are a no-op.
pub async fn delete_session(pool: &PgPool, token: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM sessions WHERE token = $1")
        .bind(token)
        .execute(pool)
        .await?;
    Ok(())
}

/// Issue a websocket ticket for the user.
pub async fn create_ws_ticket(pool: &PgPool, user_id: Uuid) -> Result<String, sqlx::Error> {
    let ticket = generate_ws_ticket();
    sqlx::query("INSERT INTO ws_tickets (ticket, user_id) VALUES ($1, $2)")
        .bind(&ticket)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(ticket)
}

/// Redeem a ticket, returning its user id.
///
/// The row is deleted in the same statement that reads it, so a ticket
/// can never authenticate two upgrades even under concurrent redemption.
pub async fn consume_ws_ticket(pool: &PgPool, ticket: &str) -> Result<Option<Uuid>, sqlx::Error> {
    sqlx::query_scalar("DELETE FROM ws_tickets WHERE ticket = $1 AND expires_at > now() RETURNING user_id")
        .bind(ticket)
        .fetch_optional(pool)
        .await
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;

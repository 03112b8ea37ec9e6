//! Participant service — join with a nickname, report progress status.
//!
//! DESIGN
//! ======
//! A participant record is keyed `(workspace_id, user_id)`, so joining
//! twice never duplicates membership; a re-join refreshes the nickname and
//! keeps the original status and join time. Status changes are owner-only
//! single-record writes enforced by the key itself.

use sqlx::PgPool;
use uuid::Uuid;

use wire::ErrorCode;
use wire::records::{Participant, ParticipantStatus, ValidationError, validate_nickname};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ParticipantError {
    #[error("workspace not found: {0}")]
    WorkspaceNotFound(Uuid),
    #[error("join the workspace before acting in it")]
    NotParticipant,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for ParticipantError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::WorkspaceNotFound(_) => "E_WORKSPACE_NOT_FOUND",
            Self::NotParticipant => "E_NOT_PARTICIPANT",
            Self::Validation(e) => e.error_code(),
            Self::Database(_) => "E_DATABASE",
        }
    }
}

// =============================================================================
// JOIN
// =============================================================================

/// Join a workspace as a participant. Re-joining updates the nickname but
/// preserves status and join time.
///
/// # Errors
///
/// Returns a validation error for a bad nickname, `WorkspaceNotFound` for an
/// unknown workspace, or a database error.
pub async fn join_participant(
    pool: &PgPool,
    workspace_id: Uuid,
    user_id: Uuid,
    nickname: &str,
) -> Result<Participant, ParticipantError> {
    validate_nickname(nickname)?;
    let nickname = nickname.trim();

    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM workspaces WHERE id = $1)")
        .bind(workspace_id)
        .fetch_one(pool)
        .await?;
    if !exists {
        return Err(ParticipantError::WorkspaceNotFound(workspace_id));
    }

    let joined_at_ms = wire::now_ms();
    let row = sqlx::query_as::<_, (String, i64)>(
        "INSERT INTO participants (workspace_id, user_id, nickname, status, joined_at_ms)
         VALUES ($1, $2, $3, 'not_started', $4)
         ON CONFLICT (workspace_id, user_id) DO UPDATE SET nickname = EXCLUDED.nickname
         RETURNING status, joined_at_ms",
    )
    .bind(workspace_id)
    .bind(user_id)
    .bind(nickname)
    .bind(joined_at_ms)
    .fetch_one(pool)
    .await?;

    Ok(Participant {
        user_id,
        nickname: nickname.to_string(),
        status: ParticipantStatus::parse(&row.0).unwrap_or(ParticipantStatus::NotStarted),
        joined_at_ms: row.1,
    })
}

// =============================================================================
// STATUS
// =============================================================================

/// Update the caller's own status record.
///
/// # Errors
///
/// Returns `NotParticipant` when the caller has no record in this workspace.
pub async fn set_status(
    pool: &PgPool,
    workspace_id: Uuid,
    user_id: Uuid,
    status: ParticipantStatus,
) -> Result<Participant, ParticipantError> {
    let row = sqlx::query_as::<_, (String, i64)>(
        "UPDATE participants SET status = $3
         WHERE workspace_id = $1 AND user_id = $2
         RETURNING nickname, joined_at_ms",
    )
    .bind(workspace_id)
    .bind(user_id)
    .bind(status.as_str())
    .fetch_optional(pool)
    .await?;

    let Some((nickname, joined_at_ms)) = row else {
        return Err(ParticipantError::NotParticipant);
    };
    Ok(Participant { user_id, nickname, status, joined_at_ms })
}

// =============================================================================
// LOOKUPS
// =============================================================================

/// Nickname of a workspace participant, or `NotParticipant`.
///
/// Used to snapshot the nickname into screenshots and comments at write
/// time, which doubles as the membership check for those operations.
///
/// # Errors
///
/// Returns `NotParticipant` when no record exists, or a database error.
pub async fn participant_nickname(
    pool: &PgPool,
    workspace_id: Uuid,
    user_id: Uuid,
) -> Result<String, ParticipantError> {
    let row: Option<(String,)> = sqlx::query_as(
        "SELECT nickname FROM participants WHERE workspace_id = $1 AND user_id = $2",
    )
    .bind(workspace_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    row.map(|(nickname,)| nickname).ok_or(ParticipantError::NotParticipant)
}

/// Whether the user has a participant record in the workspace.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn is_participant(pool: &PgPool, workspace_id: Uuid, user_id: Uuid) -> Result<bool, ParticipantError> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM participants WHERE workspace_id = $1 AND user_id = $2)",
    )
    .bind(workspace_id)
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    Ok(exists)
}

#[cfg(test)]
#[path = "participant_test.rs"]
mod tests;

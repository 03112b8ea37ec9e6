//! Comment service.
//!
//! Comments are append-only. The nickname is copied from the participant
//! record at post time, so later nickname changes do not rewrite history.

use sqlx::PgPool;
use uuid::Uuid;

use wire::ErrorCode;
use wire::records::{Comment, ValidationError, validate_comment_body};

use crate::services::participant::{self, ParticipantError};

#[derive(Debug, thiserror::Error)]
pub enum CommentError {
    #[error("workspace not found: {0}")]
    WorkspaceNotFound(Uuid),
    #[error("join the workspace before acting in it")]
    NotParticipant,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<ParticipantError> for CommentError {
    fn from(err: ParticipantError) -> Self {
        match err {
            ParticipantError::NotParticipant => Self::NotParticipant,
            ParticipantError::WorkspaceNotFound(id) => Self::WorkspaceNotFound(id),
            ParticipantError::Validation(e) => Self::Validation(e),
            ParticipantError::Database(e) => Self::Database(e),
        }
    }
}

impl ErrorCode for CommentError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::WorkspaceNotFound(_) => "E_WORKSPACE_NOT_FOUND",
            Self::NotParticipant => "E_NOT_PARTICIPANT",
            Self::Validation(e) => e.error_code(),
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

/// Post a comment as the given participant.
///
/// # Errors
///
/// Returns validation errors for a blank or over-limit body before any
/// query, `NotParticipant` for non-members, and database errors otherwise.
pub async fn post_comment(
    pool: &PgPool,
    workspace_id: Uuid,
    user_id: Uuid,
    body: &str,
) -> Result<Comment, CommentError> {
    let body = validate_comment_body(body)?;
    let nickname = participant::participant_nickname(pool, workspace_id, user_id).await?;

    let id = Uuid::new_v4();
    let created_at_ms = wire::now_ms();
    sqlx::query(
        "INSERT INTO comments (id, workspace_id, user_id, nickname, body, created_at_ms)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(id)
    .bind(workspace_id)
    .bind(user_id)
    .bind(&nickname)
    .bind(&body)
    .bind(created_at_ms)
    .execute(pool)
    .await?;

    Ok(Comment { id, user_id, nickname, body, created_at_ms })
}

#[cfg(test)]
#[path = "comment_test.rs"]
mod tests;

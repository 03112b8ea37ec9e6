//! Screenshot service — persist, reorder, delete.
//!
//! DESIGN
//! ======
//! A screenshot is two halves: the blob in the object store and the record
//! row in Postgres. The record is the source of truth; the blob is only
//! reachable through it. Writes happen blob-first so a record never points
//! at a missing image, and rank assignment happens inside the record
//! transaction with the workspace row locked, so simultaneous uploads
//! serialize and each one sees the true current maximum.
//!
//! ERROR HANDLING
//! ==============
//! If the record write fails after a first-time blob write, the blob is
//! deleted again as compensation. A crash inside that window leaves an
//! orphan for the sweep. Deletion is the mirror image: the blob delete is
//! best-effort and only the record delete decides the outcome.

use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use wire::ErrorCode;
use wire::records::{Screenshot, ValidationError, normalize_caption, validate_image_size};

use crate::services::participant::{self, ParticipantError};
use crate::services::storage::{StorageError, screenshot_path};
use crate::state::AppState;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ScreenshotError {
    #[error("workspace not found: {0}")]
    WorkspaceNotFound(Uuid),
    #[error("screenshot not found")]
    NotFound,
    #[error("join the workspace before acting in it")]
    NotParticipant,
    #[error("new order must contain each current screenshot exactly once")]
    InvalidOrder,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<ParticipantError> for ScreenshotError {
    fn from(err: ParticipantError) -> Self {
        match err {
            ParticipantError::NotParticipant => Self::NotParticipant,
            ParticipantError::WorkspaceNotFound(id) => Self::WorkspaceNotFound(id),
            ParticipantError::Validation(e) => Self::Validation(e),
            ParticipantError::Database(e) => Self::Database(e),
        }
    }
}

impl ErrorCode for ScreenshotError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::WorkspaceNotFound(_) => "E_WORKSPACE_NOT_FOUND",
            Self::NotFound => "E_SCREENSHOT_NOT_FOUND",
            Self::NotParticipant => "E_NOT_PARTICIPANT",
            Self::InvalidOrder => "E_INVALID_ORDER",
            Self::Validation(e) => e.error_code(),
            Self::Storage(e) => e.error_code(),
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Database(_))
    }
}

// =============================================================================
// PERSIST
// =============================================================================

/// Store an uploaded screenshot: blob first, then the record row.
///
/// First upload appends at rank `max + 1`; a re-upload replaces the image
/// and caption in place, keeping the rank the group may have assigned by
/// reordering.
///
/// # Errors
///
/// Returns validation errors before any write, `NotParticipant` for
/// non-members, storage errors from the blob write, and database errors
/// from the record transaction (after blob compensation where it applies).
pub async fn persist_screenshot(
    state: &AppState,
    workspace_id: Uuid,
    user_id: Uuid,
    image: &[u8],
    caption: Option<&str>,
) -> Result<Screenshot, ScreenshotError> {
    validate_image_size(image.len())?;
    let caption = normalize_caption(caption)?;
    let nickname = participant::participant_nickname(&state.pool, workspace_id, user_id).await?;

    // A replacement overwrites the blob in place, so compensation below must
    // know whether a record already pointed at this path.
    let had_record: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM screenshots WHERE workspace_id = $1 AND user_id = $2)",
    )
    .bind(workspace_id)
    .bind(user_id)
    .fetch_one(&state.pool)
    .await?;

    let path = screenshot_path(workspace_id, user_id);
    state.store.put(&path, image).await?;

    let uploaded_at_ms = wire::now_ms();
    let url = format!("{}?v={uploaded_at_ms}", state.store.url(&path));

    let record = write_record(&state.pool, workspace_id, user_id, &url, &nickname, caption, uploaded_at_ms).await;

    match record {
        Ok(screenshot) => Ok(screenshot),
        Err(e) => {
            if !had_record {
                // Compensate: drop the blob the failed record pointed at.
                if let Err(del) = state.store.delete(&path).await {
                    warn!(error = %del, %workspace_id, %user_id, "compensating blob delete failed; sweep will collect it");
                }
            }
            Err(e)
        }
    }
}

/// Insert or replace the screenshot record, assigning the rank inside the
/// transaction with the workspace row locked.
async fn write_record(
    pool: &PgPool,
    workspace_id: Uuid,
    user_id: Uuid,
    url: &str,
    nickname: &str,
    caption: Option<String>,
    uploaded_at_ms: i64,
) -> Result<Screenshot, ScreenshotError> {
    let mut tx = pool.begin().await?;

    // Serialize concurrent uploads per workspace: without this lock two
    // inserts can read the same maximum and collide on rank.
    let locked: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM workspaces WHERE id = $1 FOR UPDATE")
        .bind(workspace_id)
        .fetch_optional(tx.as_mut())
        .await?;
    if locked.is_none() {
        return Err(ScreenshotError::WorkspaceNotFound(workspace_id));
    }

    let max_rank: i32 = sqlx::query_scalar("SELECT COALESCE(MAX(rank), 0) FROM screenshots WHERE workspace_id = $1")
        .bind(workspace_id)
        .fetch_one(tx.as_mut())
        .await?;

    let row = sqlx::query_as::<_, (i32,)>(
        "INSERT INTO screenshots (workspace_id, user_id, url, nickname, rank, caption, uploaded_at_ms)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         ON CONFLICT (workspace_id, user_id) DO UPDATE SET
             url = EXCLUDED.url,
             nickname = EXCLUDED.nickname,
             caption = EXCLUDED.caption,
             uploaded_at_ms = EXCLUDED.uploaded_at_ms
         RETURNING rank",
    )
    .bind(workspace_id)
    .bind(user_id)
    .bind(url)
    .bind(nickname)
    .bind(max_rank + 1)
    .bind(&caption)
    .bind(uploaded_at_ms)
    .fetch_one(tx.as_mut())
    .await?;

    tx.commit().await?;

    Ok(Screenshot {
        user_id,
        url: url.to_string(),
        nickname: nickname.to_string(),
        rank: row.0,
        caption,
        uploaded_at_ms,
    })
}

// =============================================================================
// REORDER
// =============================================================================

/// Apply a complete re-ranking as one transaction.
///
/// `ordered` is every screenshot's user id in its new position; position
/// becomes rank (1-based). The whole batch commits or none of it does, so
/// subscribers never observe a half-applied order.
///
/// # Errors
///
/// Returns `InvalidOrder` unless `ordered` is exactly a permutation of the
/// workspace's current screenshots, `NotParticipant` for non-members.
pub async fn reorder_screenshots(
    state: &AppState,
    workspace_id: Uuid,
    user_id: Uuid,
    ordered: &[Uuid],
) -> Result<(), ScreenshotError> {
    if !participant::is_participant(&state.pool, workspace_id, user_id).await? {
        return Err(ScreenshotError::NotParticipant);
    }

    let mut tx = state.pool.begin().await?;

    let current: Vec<(Uuid,)> = sqlx::query_as(
        "SELECT user_id FROM screenshots WHERE workspace_id = $1 FOR UPDATE",
    )
    .bind(workspace_id)
    .fetch_all(tx.as_mut())
    .await?;

    if !is_permutation(ordered, &current) {
        return Err(ScreenshotError::InvalidOrder);
    }

    for (position, owner) in ordered.iter().enumerate() {
        let rank = i32::try_from(position + 1).map_err(|_| ScreenshotError::InvalidOrder)?;
        sqlx::query("UPDATE screenshots SET rank = $3 WHERE workspace_id = $1 AND user_id = $2")
            .bind(workspace_id)
            .bind(owner)
            .bind(rank)
            .execute(tx.as_mut())
            .await?;
    }

    // Deferred rank uniqueness is checked here, for the batch as a whole.
    tx.commit().await?;
    Ok(())
}

/// True when `ordered` lists each current screenshot exactly once.
fn is_permutation(ordered: &[Uuid], current: &[(Uuid,)]) -> bool {
    use std::collections::HashSet;

    if ordered.len() != current.len() {
        return false;
    }
    let proposed: HashSet<Uuid> = ordered.iter().copied().collect();
    if proposed.len() != ordered.len() {
        return false;
    }
    current.iter().all(|(id,)| proposed.contains(id))
}

// =============================================================================
// DELETE
// =============================================================================

/// Delete the caller's screenshot: blob best-effort, record decides.
///
/// # Errors
///
/// Returns `NotFound` when the caller has no screenshot here. A failed blob
/// delete is logged but never surfaces; the record delete alone reports.
pub async fn delete_screenshot(state: &AppState, workspace_id: Uuid, user_id: Uuid) -> Result<(), ScreenshotError> {
    let path = screenshot_path(workspace_id, user_id);
    if let Err(e) = state.store.delete(&path).await {
        warn!(error = %e, %workspace_id, %user_id, "blob delete failed; deleting record anyway");
    }

    let result = sqlx::query("DELETE FROM screenshots WHERE workspace_id = $1 AND user_id = $2")
        .bind(workspace_id)
        .bind(user_id)
        .execute(&state.pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ScreenshotError::NotFound);
    }
    Ok(())
}

#[cfg(test)]
#[path = "screenshot_test.rs"]
mod tests;

//! Orphan sweep — background collection of unreferenced screenshot blobs.
//!
//! DESIGN
//! ======
//! A blob becomes an orphan when the process dies between the blob write
//! and the record write, or when a compensating delete itself fails. The
//! sweep lists everything under the screenshot prefix, keeps blobs whose
//! record still exists, and deletes the rest once they are older than a
//! grace period. The grace period keeps the sweep from racing an upload
//! that has written its blob but not yet committed its record.
//!
//! Files that do not parse as screenshot paths are never touched.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::services::storage::{SCREENSHOT_PREFIX, StorageError, parse_screenshot_path};
use crate::state::AppState;

const DEFAULT_ORPHAN_SWEEP_INTERVAL_SECS: u64 = 900;
const DEFAULT_ORPHAN_GRACE_SECS: i64 = 3600;

#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

/// Spawn the background sweep task. Returns a handle for shutdown.
pub fn spawn_orphan_sweep(state: AppState) -> JoinHandle<()> {
    let interval_secs = env_parse("ORPHAN_SWEEP_INTERVAL_SECS", DEFAULT_ORPHAN_SWEEP_INTERVAL_SECS);
    let grace_secs = env_parse("ORPHAN_GRACE_SECS", DEFAULT_ORPHAN_GRACE_SECS);
    info!(interval_secs, grace_secs, "orphan sweep configured");

    tokio::spawn(async move {
        loop {
            match sweep_orphans(&state, grace_secs * 1000).await {
                Ok(0) => {}
                Ok(collected) => info!(collected, "orphan sweep collected blobs"),
                Err(e) => warn!(error = %e, "orphan sweep failed; will retry next cycle"),
            }
            tokio::time::sleep(Duration::from_secs(interval_secs)).await;
        }
    })
}

/// One sweep cycle. Returns how many orphaned blobs were deleted.
///
/// # Errors
///
/// Returns an error if listing the store or querying for records fails.
/// A failure deleting an individual blob is logged and skipped; the blob
/// stays a candidate for the next cycle.
pub async fn sweep_orphans(state: &AppState, grace_ms: i64) -> Result<usize, SweepError> {
    let now_ms = wire::now_ms();
    let mut collected = 0usize;

    for object in state.store.list(SCREENSHOT_PREFIX).await? {
        let Some((workspace_id, user_id)) = parse_screenshot_path(&object.path) else {
            continue;
        };
        // Young blobs may belong to an upload whose record has not landed yet.
        if now_ms - object.modified_at_ms <= grace_ms {
            continue;
        }

        let referenced: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM screenshots WHERE workspace_id = $1 AND user_id = $2)",
        )
        .bind(workspace_id)
        .bind(user_id)
        .fetch_one(&state.pool)
        .await?;
        if referenced {
            continue;
        }

        match state.store.delete(&object.path).await {
            Ok(()) => {
                info!(path = %object.path, %workspace_id, %user_id, "collected orphaned blob");
                collected += 1;
            }
            Err(e) => {
                warn!(error = %e, path = %object.path, "failed to delete orphaned blob");
            }
        }
    }

    Ok(collected)
}

#[cfg(test)]
#[path = "sweep_test.rs"]
mod tests;

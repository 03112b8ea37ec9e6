//! Workspace service — CRUD, hub join/part, and snapshot broadcast.
//!
//! DESIGN
//! ======
//! Workspaces are created and listed over REST; live subscription happens
//! over WS. Every record mutation is written through to Postgres, then the
//! affected collection is re-read and broadcast to the whole hub as a full
//! snapshot frame. Subscribers replace their local view wholesale, so there
//! is no delta merging and no way for a client to drift from backend truth.

use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use wire::records::{Comment, Participant, ParticipantStatus, Screenshot, Workspace};
use wire::{Data, Frame};

use crate::state::{AppState, ConnectedClient, WorkspaceHub};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("workspace not found: {0}")]
    NotFound(Uuid),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl wire::ErrorCode for WorkspaceError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_WORKSPACE_NOT_FOUND",
            Self::Database(_) => "E_DATABASE",
        }
    }
}

/// Which record collection a mutation touched. Drives snapshot broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Participants,
    Screenshots,
    Comments,
}

impl Collection {
    /// Syscall carried by this collection's snapshot frames.
    #[must_use]
    pub fn snapshot_syscall(self) -> &'static str {
        match self {
            Collection::Participants => "participant:snapshot",
            Collection::Screenshots => "screenshot:snapshot",
            Collection::Comments => "comment:snapshot",
        }
    }
}

// =============================================================================
// CRUD
// =============================================================================

/// Create a new workspace.
///
/// # Errors
///
/// Returns a database error if the insert fails.
pub async fn create_workspace(
    pool: &PgPool,
    title: &str,
    due_at_ms: i64,
    created_by: Uuid,
) -> Result<Workspace, WorkspaceError> {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO workspaces (id, title, due_at_ms, created_by) VALUES ($1, $2, $3, $4)")
        .bind(id)
        .bind(title)
        .bind(due_at_ms)
        .bind(created_by)
        .execute(pool)
        .await?;

    Ok(Workspace { id, title: title.to_string(), due_at_ms })
}

/// List workspaces the user created or participates in, soonest due first.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_workspaces(pool: &PgPool, user_id: Uuid) -> Result<Vec<Workspace>, WorkspaceError> {
    let rows = sqlx::query_as::<_, (Uuid, String, i64)>(
        "SELECT id, title, due_at_ms
         FROM workspaces w
         WHERE w.created_by = $1
            OR EXISTS (SELECT 1 FROM participants p WHERE p.workspace_id = w.id AND p.user_id = $1)
         ORDER BY due_at_ms ASC, id ASC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, title, due_at_ms)| Workspace { id, title, due_at_ms })
        .collect())
}

/// Fetch one workspace.
///
/// # Errors
///
/// Returns `NotFound` if no such workspace exists.
pub async fn get_workspace(pool: &PgPool, workspace_id: Uuid) -> Result<Workspace, WorkspaceError> {
    let row = sqlx::query_as::<_, (Uuid, String, i64)>(
        "SELECT id, title, due_at_ms FROM workspaces WHERE id = $1",
    )
    .bind(workspace_id)
    .fetch_optional(pool)
    .await?;

    let Some((id, title, due_at_ms)) = row else {
        return Err(WorkspaceError::NotFound(workspace_id));
    };
    Ok(Workspace { id, title, due_at_ms })
}

// =============================================================================
// HUB JOIN / PART
// =============================================================================

/// Subscribe a client to a workspace hub. Verifies the workspace exists.
///
/// # Errors
///
/// Returns `NotFound` for an unknown workspace, or a database error.
pub async fn join_hub(
    state: &AppState,
    workspace_id: Uuid,
    client_id: Uuid,
    user_id: Uuid,
    tx: tokio::sync::mpsc::Sender<Frame>,
) -> Result<(), WorkspaceError> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM workspaces WHERE id = $1)")
        .bind(workspace_id)
        .fetch_one(&state.pool)
        .await?;
    if !exists {
        return Err(WorkspaceError::NotFound(workspace_id));
    }

    let mut workspaces = state.workspaces.write().await;
    let hub = workspaces.entry(workspace_id).or_insert_with(WorkspaceHub::new);
    hub.clients.insert(client_id, ConnectedClient { user_id, tx });

    info!(%workspace_id, %client_id, clients = hub.clients.len(), "client joined workspace hub");
    Ok(())
}

/// Unsubscribe a client. Evicts the hub when the last client leaves.
pub async fn part_hub(state: &AppState, workspace_id: Uuid, client_id: Uuid) {
    let mut workspaces = state.workspaces.write().await;
    let Some(hub) = workspaces.get_mut(&workspace_id) else {
        return;
    };

    hub.clients.remove(&client_id);
    info!(%workspace_id, %client_id, remaining = hub.clients.len(), "client left workspace hub");

    if hub.clients.is_empty() {
        workspaces.remove(&workspace_id);
        info!(%workspace_id, "evicted workspace hub");
    }
}

// =============================================================================
// BROADCAST
// =============================================================================

/// Broadcast a frame to all clients in a workspace, optionally excluding one.
pub async fn broadcast(state: &AppState, workspace_id: Uuid, frame: &Frame, exclude: Option<Uuid>) {
    let workspaces = state.workspaces.read().await;
    let Some(hub) = workspaces.get(&workspace_id) else {
        return;
    };

    for (client_id, client) in &hub.clients {
        if exclude == Some(*client_id) {
            continue;
        }
        // Best-effort: if a client's channel is full, skip it.
        let _ = client.tx.try_send(frame.clone());
    }
}

/// Build a snapshot frame for one collection from a fresh database read.
///
/// # Errors
///
/// Returns a database error if the read fails.
pub async fn snapshot_frame(
    pool: &PgPool,
    workspace_id: Uuid,
    collection: Collection,
) -> Result<Frame, WorkspaceError> {
    let items = match collection {
        Collection::Participants => serde_json::to_value(list_participants(pool, workspace_id).await?),
        Collection::Screenshots => serde_json::to_value(list_screenshots(pool, workspace_id).await?),
        Collection::Comments => serde_json::to_value(list_comments(pool, workspace_id).await?),
    }
    .unwrap_or_default();

    let mut data = Data::new();
    data.insert(wire::FRAME_ITEMS.into(), items);
    Ok(Frame::request(collection.snapshot_syscall(), data).with_workspace_id(workspace_id))
}

/// Re-read one collection and push it to every hub subscriber, including the
/// client whose mutation triggered the refresh.
pub async fn broadcast_snapshot(state: &AppState, workspace_id: Uuid, collection: Collection) {
    match snapshot_frame(&state.pool, workspace_id, collection).await {
        Ok(frame) => broadcast(state, workspace_id, &frame, None).await,
        Err(e) => {
            tracing::error!(error = %e, %workspace_id, ?collection, "snapshot broadcast failed");
        }
    }
}

// =============================================================================
// COLLECTION READS
// =============================================================================

/// List participants in join order.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_participants(pool: &PgPool, workspace_id: Uuid) -> Result<Vec<Participant>, WorkspaceError> {
    let rows = sqlx::query_as::<_, (Uuid, String, String, i64)>(
        "SELECT user_id, nickname, status, joined_at_ms
         FROM participants WHERE workspace_id = $1
         ORDER BY joined_at_ms ASC, user_id ASC",
    )
    .bind(workspace_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(user_id, nickname, status, joined_at_ms)| Participant {
            user_id,
            nickname,
            status: ParticipantStatus::parse(&status).unwrap_or(ParticipantStatus::NotStarted),
            joined_at_ms,
        })
        .collect())
}

/// List screenshots in rank order.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_screenshots(pool: &PgPool, workspace_id: Uuid) -> Result<Vec<Screenshot>, WorkspaceError> {
    let rows = sqlx::query_as::<_, (Uuid, String, String, i32, Option<String>, i64)>(
        "SELECT user_id, url, nickname, rank, caption, uploaded_at_ms
         FROM screenshots WHERE workspace_id = $1
         ORDER BY rank ASC",
    )
    .bind(workspace_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(user_id, url, nickname, rank, caption, uploaded_at_ms)| Screenshot {
            user_id,
            url,
            nickname,
            rank,
            caption,
            uploaded_at_ms,
        })
        .collect())
}

/// List comments oldest first.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_comments(pool: &PgPool, workspace_id: Uuid) -> Result<Vec<Comment>, WorkspaceError> {
    let rows = sqlx::query_as::<_, (Uuid, Uuid, String, String, i64)>(
        "SELECT id, user_id, nickname, body, created_at_ms
         FROM comments WHERE workspace_id = $1
         ORDER BY created_at_ms ASC, id ASC",
    )
    .bind(workspace_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, user_id, nickname, body, created_at_ms)| Comment {
            id,
            user_id,
            nickname,
            body,
            created_at_ms,
        })
        .collect())
}

#[cfg(test)]
#[path = "workspace_test.rs"]
mod tests;

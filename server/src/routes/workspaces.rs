//! Workspace REST routes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use uuid::Uuid;

use wire::records::Workspace;

use crate::routes::auth::AuthUser;
use crate::services::workspace::{self, WorkspaceError};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateWorkspaceBody {
    pub title: String,
    pub due_at_ms: i64,
}

/// `POST /api/workspaces` — create a workspace.
pub async fn create_workspace_rest(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateWorkspaceBody>,
) -> Result<(StatusCode, Json<Workspace>), StatusCode> {
    let title = body.title.trim();
    if title.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let created = workspace::create_workspace(&state.pool, title, body.due_at_ms, auth.user_id)
        .await
        .map_err(workspace_error_to_status)?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// `GET /api/workspaces` — list the caller's workspaces, soonest due first.
pub async fn list_workspaces_rest(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<Workspace>>, StatusCode> {
    let listed = workspace::list_workspaces(&state.pool, auth.user_id)
        .await
        .map_err(workspace_error_to_status)?;
    Ok(Json(listed))
}

/// `GET /api/workspaces/{id}` — fetch one workspace.
///
/// Any authenticated user may fetch by id; that is how a shared link is
/// opened before joining.
pub async fn get_workspace_rest(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(workspace_id): Path<Uuid>,
) -> Result<Json<Workspace>, StatusCode> {
    let found = workspace::get_workspace(&state.pool, workspace_id)
        .await
        .map_err(workspace_error_to_status)?;
    Ok(Json(found))
}

pub(crate) fn workspace_error_to_status(err: WorkspaceError) -> StatusCode {
    match err {
        WorkspaceError::NotFound(_) => StatusCode::NOT_FOUND,
        WorkspaceError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
#[path = "workspaces_test.rs"]
mod tests;

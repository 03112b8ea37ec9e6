//! Screenshot upload route.
//!
//! Uploads arrive as multipart form data because the image body dwarfs the
//! metadata. The route re-checks what the client should already have
//! enforced (size ceiling, decodable image) before handing the bytes to the
//! screenshot service, then pushes a fresh screenshot snapshot to the hub.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use uuid::Uuid;

use wire::ErrorCode;
use wire::records::{MAX_IMAGE_BYTES, Screenshot, ValidationError};

use crate::routes::auth::AuthUser;
use crate::services::screenshot::{self, ScreenshotError};
use crate::services::workspace::{self, Collection};
use crate::state::AppState;

/// Request body cap for the upload route: the image ceiling plus headroom
/// for multipart framing and the caption field.
pub(crate) const MAX_UPLOAD_BODY_BYTES: usize = MAX_IMAGE_BYTES + 64 * 1024;

type ErrorBody = (StatusCode, Json<serde_json::Value>);

/// `POST /api/workspaces/{id}/screenshots` — multipart screenshot upload.
///
/// Fields: `image` (required, binary) and `caption` (optional, text).
/// Replaces the caller's previous screenshot in this workspace, if any.
pub async fn upload_screenshot(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(workspace_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Screenshot>), ErrorBody> {
    let mut image_bytes: Option<Vec<u8>> = None;
    let mut caption: Option<String> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(bad_request(format!("malformed multipart body: {e}"))),
        };
        match field.name() {
            Some("image") => match field.bytes().await {
                Ok(bytes) => image_bytes = Some(bytes.to_vec()),
                Err(e) => return Err(bad_request(format!("image field read failed: {e}"))),
            },
            Some("caption") => match field.text().await {
                Ok(text) => caption = Some(text),
                Err(e) => return Err(bad_request(format!("caption field read failed: {e}"))),
            },
            _ => {}
        }
    }

    let Some(image_bytes) = image_bytes else {
        return Err(bad_request("image field required"));
    };
    if image_bytes.len() > MAX_IMAGE_BYTES {
        return Err(screenshot_error_response(&ScreenshotError::Validation(
            ValidationError::ImageTooLarge(image_bytes.len()),
        )));
    }
    if image::load_from_memory(&image_bytes).is_err() {
        return Err(bad_request("image field is not a decodable image"));
    }

    let stored = screenshot::persist_screenshot(&state, workspace_id, auth.user_id, &image_bytes, caption.as_deref())
        .await
        .map_err(|e| screenshot_error_response(&e))?;

    workspace::broadcast_snapshot(&state, workspace_id, Collection::Screenshots).await;

    Ok((StatusCode::CREATED, Json(stored)))
}

fn bad_request(message: impl Into<String>) -> ErrorBody {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "message": message.into() })),
    )
}

pub(crate) fn screenshot_error_response(err: &ScreenshotError) -> ErrorBody {
    let status = match err {
        ScreenshotError::WorkspaceNotFound(_) | ScreenshotError::NotFound => StatusCode::NOT_FOUND,
        ScreenshotError::NotParticipant => StatusCode::FORBIDDEN,
        ScreenshotError::InvalidOrder => StatusCode::CONFLICT,
        ScreenshotError::Validation(e) => match e {
            ValidationError::ImageTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::UNPROCESSABLE_ENTITY,
        },
        ScreenshotError::Storage(_) | ScreenshotError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(serde_json::json!({ "code": err.error_code(), "message": err.to_string() })),
    )
}

#[cfg(test)]
#[path = "uploads_test.rs"]
mod tests;

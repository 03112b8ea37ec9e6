//! Entity records shared by server and client.
//!
//! Four record kinds flow through the system: the workspace itself, one
//! participant row per joined user, at most one screenshot per user, and
//! free-form comments. Records travel inside snapshot frames as plain JSON
//! and are stored document-per-entity on the server.
//!
//! Validation limits live here too, so the client can reject bad input
//! before any network call and the server can enforce the same rules on
//! whatever reaches it.

#[cfg(test)]
#[path = "records_test.rs"]
mod records_test;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ErrorCode;

// =============================================================================
// LIMITS
// =============================================================================

/// Maximum nickname length in characters.
pub const NICKNAME_MAX: usize = 20;

/// Maximum screenshot caption length in characters.
pub const CAPTION_MAX: usize = 50;

/// Maximum comment body length in characters.
pub const COMMENT_BODY_MAX: usize = 500;

/// Ceiling on an encoded screenshot payload, in bytes (10 MiB).
pub const MAX_IMAGE_BYTES: usize = 10_485_760;

/// Fixed JPEG quality factor applied to every screenshot (0.8).
pub const JPEG_QUALITY: u8 = 80;

// =============================================================================
// RECORDS
// =============================================================================

/// Progress status a participant reports for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl ParticipantStatus {
    /// Stable string form, matching the wire and database encoding.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ParticipantStatus::NotStarted => "not_started",
            ParticipantStatus::InProgress => "in_progress",
            ParticipantStatus::Completed => "completed",
        }
    }

    /// Parse the stable string form. Returns `None` for anything else.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "not_started" => Some(ParticipantStatus::NotStarted),
            "in_progress" => Some(ParticipantStatus::InProgress),
            "completed" => Some(ParticipantStatus::Completed),
            _ => None,
        }
    }
}

/// A shared session workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    /// Unique identifier.
    pub id: Uuid,
    /// Display title.
    pub title: String,
    /// Due date, milliseconds since Unix epoch.
    pub due_at_ms: i64,
}

/// A user's membership in one workspace. Keyed by user id, so a user has at
/// most one participant record per workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    /// The participant's user id (doubles as the record id).
    pub user_id: Uuid,
    /// Display name chosen at join time, 1-20 characters.
    pub nickname: String,
    /// Current progress status.
    pub status: ParticipantStatus,
    /// Join time, milliseconds since Unix epoch.
    pub joined_at_ms: i64,
}

/// A proof-of-progress screenshot. Keyed by the uploader's user id, so a user
/// has at most one screenshot per workspace and re-uploading replaces it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Screenshot {
    /// The uploader's user id (doubles as the record id).
    pub user_id: Uuid,
    /// URL of the stored image.
    pub url: String,
    /// Uploader's nickname, snapshotted at upload time.
    pub nickname: String,
    /// 1-based position in the workspace leaderboard. Unique per workspace,
    /// contiguous after any reorder.
    pub rank: i32,
    /// Optional caption, at most 50 characters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    /// Upload time, milliseconds since Unix epoch.
    pub uploaded_at_ms: i64,
}

/// A comment in the workspace feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    /// Unique identifier.
    pub id: Uuid,
    /// Author's user id.
    pub user_id: Uuid,
    /// Author's nickname, snapshotted at post time.
    pub nickname: String,
    /// Comment text, 1-500 characters after trimming.
    pub body: String,
    /// Post time, milliseconds since Unix epoch.
    pub created_at_ms: i64,
}

// =============================================================================
// VALIDATION
// =============================================================================

/// Input rejected before it reaches storage. Every variant renders a
/// user-displayable message and each limit gets a distinct code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("nickname must be 1-{NICKNAME_MAX} characters")]
    NicknameLength,
    #[error("caption must be at most {CAPTION_MAX} characters")]
    CaptionLength,
    #[error("comment cannot be empty")]
    CommentBlank,
    #[error("comment must be at most {COMMENT_BODY_MAX} characters")]
    CommentLength,
    #[error("image is {0} bytes; the limit is {MAX_IMAGE_BYTES} bytes")]
    ImageTooLarge(usize),
}

impl ErrorCode for ValidationError {
    fn error_code(&self) -> &'static str {
        match self {
            ValidationError::NicknameLength => "E_NICKNAME_LENGTH",
            ValidationError::CaptionLength => "E_CAPTION_LENGTH",
            ValidationError::CommentBlank => "E_COMMENT_BLANK",
            ValidationError::CommentLength => "E_COMMENT_LENGTH",
            ValidationError::ImageTooLarge(_) => "E_IMAGE_TOO_LARGE",
        }
    }
}

/// Validate a nickname: non-blank, at most [`NICKNAME_MAX`] characters.
///
/// # Errors
/// Returns `NicknameLength` when blank after trimming or over the limit.
pub fn validate_nickname(nickname: &str) -> Result<(), ValidationError> {
    let trimmed = nickname.trim();
    if trimmed.is_empty() || trimmed.chars().count() > NICKNAME_MAX {
        return Err(ValidationError::NicknameLength);
    }
    Ok(())
}

/// Normalize an optional caption: trims, maps blank to `None`, enforces
/// [`CAPTION_MAX`].
///
/// # Errors
/// Returns `CaptionLength` when the trimmed caption is over the limit.
pub fn normalize_caption(caption: Option<&str>) -> Result<Option<String>, ValidationError> {
    let Some(raw) = caption else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.chars().count() > CAPTION_MAX {
        return Err(ValidationError::CaptionLength);
    }
    Ok(Some(trimmed.to_string()))
}

/// Validate a comment body and return the trimmed text to store.
///
/// # Errors
/// Returns `CommentBlank` for whitespace-only input, `CommentLength` when
/// the trimmed body exceeds [`COMMENT_BODY_MAX`] characters.
pub fn validate_comment_body(body: &str) -> Result<String, ValidationError> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::CommentBlank);
    }
    if trimmed.chars().count() > COMMENT_BODY_MAX {
        return Err(ValidationError::CommentLength);
    }
    Ok(trimmed.to_string())
}

/// Check an encoded image payload against [`MAX_IMAGE_BYTES`].
///
/// # Errors
/// Returns `ImageTooLarge` with the offending size.
pub fn validate_image_size(len: usize) -> Result<(), ValidationError> {
    if len > MAX_IMAGE_BYTES {
        return Err(ValidationError::ImageTooLarge(len));
    }
    Ok(())
}

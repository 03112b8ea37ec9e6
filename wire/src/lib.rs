//! The `ShareNight` wire protocol: frames and shared entity records.
//!
//! ARCHITECTURE
//! ============
//! Everything realtime travels as a [`Frame`]. A client writes a request
//! frame to its WebSocket, the server routes it by the prefix of `syscall`
//! ("workspace:", "participant:", ...), and the answer comes back as a
//! stream of item frames closed by a done or error frame. Whenever a
//! collection changes, subscribers receive a snapshot frame carrying the
//! whole collection; nobody merges deltas.
//!
//! DESIGN
//! ======
//! - The payload is one flat `Map<String, Value>`. Nesting happens only
//!   inside well-known keys such as `items`.
//! - Replies point at their request through `parent_id`.
//! - Frames travel as JSON text, the native format for both crates here.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod records;

// =============================================================================
// FIELD CONSTANTS
// =============================================================================

/// Payload key holding the human-readable message of an error frame.
pub const FRAME_MESSAGE: &str = "message";

/// Payload key holding the stable `E_*` code of an error frame.
pub const FRAME_CODE: &str = "code";

/// Payload key flagging whether the failed operation is worth retrying.
pub const FRAME_RETRYABLE: &str = "retryable";

/// Payload key holding the record list of a snapshot frame.
pub const FRAME_ITEMS: &str = "items";

// =============================================================================
// TYPES
// =============================================================================

/// The flat frame payload.
pub type Data = HashMap<String, serde_json::Value>;

/// Where a frame sits in a request/response stream.
///
/// A stream is always `request → item* → done`, or `request → error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Request,
    Item,
    Done,
    Error,
    Cancel,
}

impl Status {
    /// Whether this status closes the stream.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Status::Request | Status::Item)
    }
}

/// The universal message type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub id: Uuid,
    pub parent_id: Option<Uuid>,
    /// Milliseconds since the Unix epoch, stamped at construction.
    pub ts: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<Uuid>,
    pub from: Option<String>,
    pub syscall: String,
    pub status: Status,
    pub data: Data,
}

// =============================================================================
// ERROR CODES
// =============================================================================

/// Stable `E_*` code plus retry hint, for building structured error frames.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

// =============================================================================
// CONSTRUCTORS
// =============================================================================

/// Milliseconds since the Unix epoch, clamped to zero on clock trouble.
#[must_use]
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(0))
}

impl Frame {
    /// Start a new request stream. Every syscall begins here.
    pub fn request(syscall: impl Into<String>, data: Data) -> Self {
        Self {
            syscall: syscall.into(),
            status: Status::Request,
            id: Uuid::new_v4(),
            parent_id: None,
            ts: now_ms(),
            workspace_id: None,
            from: None,
            data,
        }
    }

    /// One result within the stream. Non-terminal.
    #[must_use]
    pub fn item(&self, data: Data) -> Self {
        self.respond(Status::Item, data)
    }

    /// Close the stream successfully with an empty payload.
    #[must_use]
    pub fn done(&self) -> Self {
        self.respond(Status::Done, Data::new())
    }

    /// Close the stream successfully, carrying a payload.
    #[must_use]
    pub fn done_with(&self, data: Data) -> Self {
        self.respond(Status::Done, data)
    }

    /// Close the stream with a bare message. Prefer [`Frame::error_from`]
    /// when a typed error is at hand.
    #[must_use]
    pub fn error(&self, message: impl Into<String>) -> Self {
        let data = Data::from([(FRAME_MESSAGE.to_string(), serde_json::Value::String(message.into()))]);
        self.respond(Status::Error, data)
    }

    /// Close the stream with a typed error: code, message, retry hint.
    #[must_use]
    pub fn error_from(&self, err: &(impl ErrorCode + ?Sized)) -> Self {
        let data = Data::from([
            (FRAME_CODE.to_string(), serde_json::Value::from(err.error_code())),
            (FRAME_MESSAGE.to_string(), serde_json::Value::from(err.to_string())),
            (FRAME_RETRYABLE.to_string(), serde_json::Value::from(err.retryable())),
        ]);
        self.respond(Status::Error, data)
    }

    /// A reply keeps the request's `syscall` and `workspace_id` and records
    /// the request id as `parent_id`.
    fn respond(&self, status: Status, data: Data) -> Self {
        Self {
            syscall: self.syscall.clone(),
            status,
            id: Uuid::new_v4(),
            parent_id: Some(self.id),
            ts: now_ms(),
            workspace_id: self.workspace_id,
            from: None,
            data,
        }
    }
}

// =============================================================================
// BUILDERS
// =============================================================================

impl Frame {
    #[must_use]
    pub fn with_workspace_id(mut self, workspace_id: Uuid) -> Self {
        self.workspace_id = Some(workspace_id);
        self
    }

    #[must_use]
    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

// =============================================================================
// ACCESSORS
// =============================================================================

impl Frame {
    /// The routing prefix: everything before the first ':', or the whole
    /// syscall when there is none.
    #[must_use]
    pub fn prefix(&self) -> &str {
        self.syscall
            .split_once(':')
            .map_or(self.syscall.as_str(), |(prefix, _)| prefix)
    }

    /// The message of an error frame, when one is present.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.data.get(FRAME_MESSAGE).and_then(serde_json::Value::as_str)
    }

    /// Deserialize the record list of a snapshot frame.
    ///
    /// # Errors
    /// Returns a `serde_json::Error` when `items` is absent or has the
    /// wrong shape.
    pub fn items<T: serde::de::DeserializeOwned>(&self) -> Result<Vec<T>, serde_json::Error> {
        match self.data.get(FRAME_ITEMS) {
            Some(value) => serde_json::from_value(value.clone()),
            None => serde_json::from_value(serde_json::Value::Null),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_starts_a_fresh_stream() {
        let frame = Frame::request("workspace:create", Data::new());

        assert_eq!(frame.status, Status::Request);
        assert_eq!(frame.syscall, "workspace:create");
        assert!(frame.parent_id.is_none());
        assert!(frame.workspace_id.is_none());
        assert!(frame.ts > 0);
    }

    #[test]
    fn replies_correlate_and_inherit() {
        let workspace_id = Uuid::new_v4();
        let req = Frame::request("comment:post", Data::new()).with_workspace_id(workspace_id);

        let item = req.item(Data::new());
        assert_eq!(item.status, Status::Item);
        assert_eq!(item.parent_id, Some(req.id));
        assert_eq!(item.workspace_id, Some(workspace_id));
        assert_eq!(item.syscall, "comment:post");

        let done = req.done();
        assert_eq!(done.status, Status::Done);
        assert!(done.data.is_empty());
    }

    #[test]
    fn done_with_carries_payload() {
        let req = Frame::request("participant:join", Data::new());
        let done = req.done_with(Data::from([("rank".to_string(), serde_json::json!(3))]));

        assert_eq!(done.status, Status::Done);
        assert_eq!(done.parent_id, Some(req.id));
        assert_eq!(done.data.get("rank").and_then(serde_json::Value::as_i64), Some(3));
    }

    #[test]
    fn only_done_error_cancel_are_terminal() {
        for status in [Status::Done, Status::Error, Status::Cancel] {
            assert!(status.is_terminal());
        }
        for status in [Status::Request, Status::Item] {
            assert!(!status.is_terminal());
        }
    }

    #[test]
    fn prefix_splits_on_first_colon() {
        assert_eq!(Frame::request("screenshot:reorder", Data::new()).prefix(), "screenshot");
        assert_eq!(Frame::request("noseparator", Data::new()).prefix(), "noseparator");
    }

    #[test]
    fn frames_survive_json() {
        let workspace_id = Uuid::new_v4();
        let original = Frame::request("workspace:join", Data::new())
            .with_workspace_id(workspace_id)
            .with_from("test-user")
            .with_data("key", "value");

        let text = serde_json::to_string(&original).expect("serialize");
        let parsed: Frame = serde_json::from_str(&text).expect("deserialize");

        assert_eq!(parsed.id, original.id);
        assert_eq!(parsed.workspace_id, Some(workspace_id));
        assert_eq!(parsed.syscall, "workspace:join");
        assert_eq!(parsed.from.as_deref(), Some("test-user"));
        assert_eq!(parsed.data.get("key").and_then(serde_json::Value::as_str), Some("value"));
    }

    #[test]
    fn typed_errors_become_structured_frames() {
        #[derive(Debug, thiserror::Error)]
        #[error("not found")]
        struct NotFound;

        impl ErrorCode for NotFound {
            fn error_code(&self) -> &'static str {
                "E_NOT_FOUND"
            }
        }

        let err = Frame::request("workspace:join", Data::new()).error_from(&NotFound);

        assert_eq!(err.status, Status::Error);
        assert_eq!(err.data.get(FRAME_CODE).and_then(serde_json::Value::as_str), Some("E_NOT_FOUND"));
        assert_eq!(err.error_message(), Some("not found"));
        assert_eq!(err.data.get(FRAME_RETRYABLE).and_then(serde_json::Value::as_bool), Some(false));
    }

    #[test]
    fn items_reads_snapshot_payloads() {
        let snapshot = Frame::request("comment:snapshot", Data::new())
            .with_data(FRAME_ITEMS, serde_json::json!(["a", "b"]));

        let items: Vec<String> = snapshot.items().expect("items");
        assert_eq!(items, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn items_without_payload_is_an_error() {
        let frame = Frame::request("comment:snapshot", Data::new());
        assert!(frame.items::<String>().is_err());
    }
}

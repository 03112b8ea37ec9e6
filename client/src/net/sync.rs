//! Websocket sync client.
//!
//! ARCHITECTURE
//! ============
//! One `SyncClient` owns one websocket session. After the ticket handshake a
//! reader task routes every inbound frame: replies (frames with a
//! `parent_id`) complete the matching pending request, broadcast frames fan
//! out to `Subscription` handles by syscall. Requests are plain
//! send-then-await with a timeout, so callers get `Result`s instead of
//! callback soup.
//!
//! SUBSCRIPTION LIFETIME
//! =====================
//! `subscribe` and `join_workspace` hand back owned `Subscription` values.
//! Dropping a handle is the unsubscribe: the reader prunes closed channels
//! on the next broadcast. Snapshot frames always carry the whole collection,
//! so a handle that missed frames while its buffer was full is made whole by
//! the next one.

#[cfg(test)]
#[path = "sync_test.rs"]
mod tests;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use uuid::Uuid;

use wire::records::{ParticipantStatus, Workspace, validate_comment_body, validate_nickname};
use wire::{Data, Frame, Status};

/// Snapshot syscalls the server broadcasts after every mutation.
pub const PARTICIPANT_SNAPSHOT: &str = "participant:snapshot";
pub const SCREENSHOT_SNAPSHOT: &str = "screenshot:snapshot";
pub const COMMENT_SNAPSHOT: &str = "comment:snapshot";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const SUBSCRIPTION_BUFFER: usize = 64;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("websocket connect failed: {0}")]
    Connect(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("websocket send failed: {0}")]
    Send(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("frame encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("websocket closed")]
    Closed,
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),
    #[error("server returned error for {syscall}: {message}")]
    Server {
        syscall: String,
        code: Option<String>,
        message: String,
    },
    #[error("missing expected field `{0}`")]
    MissingField(&'static str),
    #[error(transparent)]
    Validation(#[from] wire::records::ValidationError),
}

/// Routing state shared between the client handle and its reader task.
struct Router {
    pending: Mutex<HashMap<Uuid, oneshot::Sender<Frame>>>,
    subscriptions: Mutex<Vec<SubEntry>>,
}

struct SubEntry {
    syscall: String,
    workspace_id: Option<Uuid>,
    tx: mpsc::Sender<Frame>,
}

/// An owned broadcast feed. Dropping it detaches from the stream.
pub struct Subscription {
    rx: mpsc::Receiver<Frame>,
}

impl Subscription {
    /// Next broadcast frame; `None` once the connection is gone.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.rx.recv().await
    }

    /// Non-blocking variant for render loops.
    pub fn try_recv(&mut self) -> Option<Frame> {
        self.rx.try_recv().ok()
    }
}

/// A joined workspace: its record plus the three live collection feeds.
/// Dropping this detaches all of them.
pub struct JoinedWorkspace {
    pub workspace: Workspace,
    pub participants: Subscription,
    pub screenshots: Subscription,
    pub comments: Subscription,
}

/// One live websocket session.
pub struct SyncClient {
    sink: Mutex<WsSink>,
    router: Arc<Router>,
    reader: JoinHandle<()>,
    client_id: Uuid,
    user_id: Uuid,
}

impl SyncClient {
    /// Connect with a one-time ticket and complete the `session:connected`
    /// handshake.
    ///
    /// # Errors
    /// Returns connect, handshake-timeout, or malformed-welcome errors.
    pub async fn connect(base_url: &str, ticket: &str) -> Result<Self, SyncError> {
        let url = ws_url(base_url, ticket)?;
        let (stream, _) = connect_async(url)
            .await
            .map_err(|e| SyncError::Connect(Box::new(e)))?;
        let (sink, mut source) = stream.split();

        let welcome = tokio::time::timeout(CONNECT_TIMEOUT, wait_connected(&mut source))
            .await
            .map_err(|_| SyncError::Timeout("session:connected"))??;
        let client_id = field_uuid(&welcome, "client_id")?;
        let user_id = field_uuid(&welcome, "user_id")?;

        let router = Arc::new(Router {
            pending: Mutex::new(HashMap::new()),
            subscriptions: Mutex::new(Vec::new()),
        });
        let reader = tokio::spawn(read_loop(source, router.clone()));

        Ok(Self { sink: Mutex::new(sink), router, reader, client_id, user_id })
    }

    /// Server-assigned id for this connection.
    #[must_use]
    pub fn client_id(&self) -> Uuid {
        self.client_id
    }

    /// The authenticated user behind the ticket.
    #[must_use]
    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    /// Send a request frame and await its terminal reply.
    ///
    /// # Errors
    /// Returns send/timeout/closed errors, or `Server` for an error reply.
    pub async fn request(&self, frame: Frame) -> Result<Frame, SyncError> {
        let id = frame.id;
        let (tx, rx) = oneshot::channel();
        self.router.pending.lock().await.insert(id, tx);

        if let Err(e) = self.send(&frame).await {
            self.router.pending.lock().await.remove(&id);
            return Err(e);
        }

        let reply = match tokio::time::timeout(REQUEST_TIMEOUT, rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => return Err(SyncError::Closed),
            Err(_) => {
                self.router.pending.lock().await.remove(&id);
                return Err(SyncError::Timeout("reply"));
            }
        };

        if reply.status == Status::Error {
            return Err(SyncError::Server {
                syscall: reply.syscall.clone(),
                code: reply
                    .data
                    .get(wire::FRAME_CODE)
                    .and_then(|v| v.as_str())
                    .map(ToOwned::to_owned),
                message: reply.error_message().unwrap_or("request failed").to_owned(),
            });
        }
        Ok(reply)
    }

    /// Subscribe to every broadcast of one syscall, any workspace.
    pub async fn subscribe(&self, syscall: impl Into<String>) -> Subscription {
        self.subscribe_scoped(syscall.into(), None).await
    }

    /// Join a workspace and return its record plus the three collection
    /// feeds. The feeds are registered before the join request goes out, so
    /// the initial snapshots land in them rather than racing the reply.
    ///
    /// Re-joining a different workspace parts the previous one server-side;
    /// drop the previous `JoinedWorkspace` alongside.
    ///
    /// # Errors
    /// Returns request errors, or `Server` when the workspace is unknown.
    pub async fn join_workspace(&self, workspace_id: Uuid) -> Result<JoinedWorkspace, SyncError> {
        let participants = self
            .subscribe_scoped(PARTICIPANT_SNAPSHOT.to_string(), Some(workspace_id))
            .await;
        let screenshots = self
            .subscribe_scoped(SCREENSHOT_SNAPSHOT.to_string(), Some(workspace_id))
            .await;
        let comments = self
            .subscribe_scoped(COMMENT_SNAPSHOT.to_string(), Some(workspace_id))
            .await;

        let reply = self
            .request(Frame::request("workspace:join", Data::new()).with_workspace_id(workspace_id))
            .await?;
        let workspace = reply
            .data
            .get("workspace")
            .cloned()
            .and_then(|v| serde_json::from_value::<Workspace>(v).ok())
            .ok_or(SyncError::MissingField("workspace"))?;

        Ok(JoinedWorkspace { workspace, participants, screenshots, comments })
    }

    // =========================================================================
    // IMPERATIVE ACTIONS
    // =========================================================================

    /// Join the workspace roster under a nickname.
    ///
    /// # Errors
    /// Returns `Validation` before any network traffic for a bad nickname.
    pub async fn join_as(&self, workspace_id: Uuid, nickname: &str) -> Result<(), SyncError> {
        validate_nickname(nickname)?;
        let frame = Frame::request("participant:join", Data::new())
            .with_workspace_id(workspace_id)
            .with_data("nickname", nickname);
        self.request(frame).await.map(|_| ())
    }

    /// Report the caller's progress status.
    ///
    /// # Errors
    /// Returns request or server errors.
    pub async fn set_status(
        &self,
        workspace_id: Uuid,
        status: ParticipantStatus,
    ) -> Result<(), SyncError> {
        let frame = Frame::request("participant:status", Data::new())
            .with_workspace_id(workspace_id)
            .with_data("status", status.as_str());
        self.request(frame).await.map(|_| ())
    }

    /// Post a comment to the workspace feed.
    ///
    /// # Errors
    /// Returns `Validation` before any network traffic for a blank or
    /// over-long body.
    pub async fn post_comment(&self, workspace_id: Uuid, body: &str) -> Result<(), SyncError> {
        let trimmed = validate_comment_body(body)?;
        let frame = Frame::request("comment:post", Data::new())
            .with_workspace_id(workspace_id)
            .with_data("body", trimmed);
        self.request(frame).await.map(|_| ())
    }

    /// Persist a complete new leaderboard order, first rank first. Applied
    /// all-or-nothing server-side.
    ///
    /// # Errors
    /// Returns request errors, or `Server` when the order is stale or not a
    /// permutation.
    pub async fn reorder_screenshots(
        &self,
        workspace_id: Uuid,
        order: &[Uuid],
    ) -> Result<(), SyncError> {
        let frame = Frame::request("screenshot:reorder", Data::new())
            .with_workspace_id(workspace_id)
            .with_data("order", serde_json::json!(order));
        self.request(frame).await.map(|_| ())
    }

    /// Delete the caller's own screenshot.
    ///
    /// # Errors
    /// Returns request or server errors.
    pub async fn delete_screenshot(&self, workspace_id: Uuid) -> Result<(), SyncError> {
        let frame =
            Frame::request("screenshot:delete", Data::new()).with_workspace_id(workspace_id);
        self.request(frame).await.map(|_| ())
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    async fn subscribe_scoped(&self, syscall: String, workspace_id: Option<Uuid>) -> Subscription {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        self.router
            .subscriptions
            .lock()
            .await
            .push(SubEntry { syscall, workspace_id, tx });
        Subscription { rx }
    }

    async fn send(&self, frame: &Frame) -> Result<(), SyncError> {
        let json = serde_json::to_string(frame)?;
        self.sink
            .lock()
            .await
            .send(Message::Text(json.into()))
            .await
            .map_err(|e| SyncError::Send(Box::new(e)))
    }
}

impl Drop for SyncClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

// =============================================================================
// READER TASK
// =============================================================================

async fn wait_connected(source: &mut SplitStream<WsStream>) -> Result<Frame, SyncError> {
    loop {
        let Some(message) = source.next().await else {
            return Err(SyncError::Closed);
        };
        match message.map_err(|e| SyncError::Connect(Box::new(e)))? {
            Message::Text(text) => {
                if let Ok(frame) = serde_json::from_str::<Frame>(text.as_str()) {
                    if frame.syscall == "session:connected" {
                        return Ok(frame);
                    }
                }
            }
            Message::Close(_) => return Err(SyncError::Closed),
            _ => {}
        }
    }
}

async fn read_loop(mut source: SplitStream<WsStream>, router: Arc<Router>) {
    while let Some(message) = source.next().await {
        let text = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => continue,
        };
        match serde_json::from_str::<Frame>(text.as_str()) {
            Ok(frame) => route_frame(&router, frame).await,
            Err(e) => tracing::warn!(error = %e, "discarding unparseable frame"),
        }
    }

    // Connection gone: fail pending requests, end subscription streams.
    router.pending.lock().await.clear();
    router.subscriptions.lock().await.clear();
}

async fn route_frame(router: &Router, frame: Frame) {
    if let Some(parent_id) = frame.parent_id {
        if let Some(waiter) = router.pending.lock().await.remove(&parent_id) {
            let _ = waiter.send(frame);
        }
        return;
    }

    let mut subscriptions = router.subscriptions.lock().await;
    subscriptions.retain(|entry| !entry.tx.is_closed());
    for entry in subscriptions.iter() {
        if entry.syscall != frame.syscall {
            continue;
        }
        if entry.workspace_id.is_none_or(|id| frame.workspace_id == Some(id)) {
            // Best effort: a full buffer drops this frame, and the next
            // snapshot carries the whole collection anyway.
            let _ = entry.tx.try_send(frame.clone());
        }
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn ws_url(base_url: &str, ticket: &str) -> Result<String, SyncError> {
    let trimmed = base_url.trim_end_matches('/');
    if let Some(rest) = trimmed.strip_prefix("http://") {
        return Ok(format!("ws://{rest}/api/ws?ticket={ticket}"));
    }
    if let Some(rest) = trimmed.strip_prefix("https://") {
        return Ok(format!("wss://{rest}/api/ws?ticket={ticket}"));
    }
    Err(SyncError::InvalidBaseUrl(base_url.to_owned()))
}

fn field_uuid(frame: &Frame, key: &'static str) -> Result<Uuid, SyncError> {
    frame
        .data
        .get(key)
        .and_then(serde_json::Value::as_str)
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .ok_or(SyncError::MissingField(key))
}

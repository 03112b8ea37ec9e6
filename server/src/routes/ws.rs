//! WebSocket handler — frame dispatch and snapshot fan-out.
//!
//! DESIGN
//! ======
//! On upgrade, generates a client ID and enters a `select!` loop:
//! - Incoming client frames → parse + dispatch by syscall prefix
//! - Snapshot frames from the workspace hub → forward to client
//!
//! Handler functions are pure business logic — they validate, call services,
//! and return an `Outcome`. The dispatch layer owns all outbound concerns:
//! reply to sender and snapshot broadcast to the hub.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade (ticket auth) → send `session:connected` with `client_id`
//! 2. `workspace:join` → subscribe + initial snapshots of all collections
//! 3. Mutating syscalls → service write → fresh snapshot to the whole hub,
//!    sender included; sender additionally gets `done` for correlation
//! 4. Close → leave hub

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use wire::records::ParticipantStatus;
use wire::{Data, Frame};

use crate::services;
use crate::services::workspace::Collection;
use crate::state::AppState;

// =============================================================================
// OUTCOME
// =============================================================================

/// Result returned by handler functions. The dispatch layer uses this to
/// decide who receives what — handlers never send frames directly.
enum Outcome {
    /// Send done+data to sender, then the given frames (initial snapshots).
    ReplyThen { reply: Data, follow: Vec<Frame> },
    /// Re-read one collection and push it to every hub subscriber, sender
    /// included. Sender additionally gets an empty done for correlation.
    Refresh(Collection),
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(ticket) = params.get("ticket") else {
        return (StatusCode::UNAUTHORIZED, "ticket required").into_response();
    };

    match services::session::consume_ws_ticket(&state.pool, ticket).await {
        Ok(Some(user_id)) => ws.on_upgrade(move |socket| run_ws(socket, state, user_id)),
        Ok(None) => (StatusCode::UNAUTHORIZED, "invalid or expired ticket").into_response(),
        Err(e) => {
            tracing::error!(error = %e, "ws ticket validation failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "ticket validation error").into_response()
        }
    }
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, user_id: Uuid) {
    let client_id = Uuid::new_v4();

    // Per-connection channel for snapshot frames from the workspace hub.
    let (client_tx, mut client_rx) = mpsc::channel::<Frame>(256);

    let welcome = Frame::request("session:connected", Data::new())
        .with_data("client_id", client_id.to_string())
        .with_data("user_id", user_id.to_string());
    if send_frame(&mut socket, &welcome).await.is_err() {
        return;
    }

    info!(%client_id, %user_id, "ws: client connected");

    // Which workspace hub this client belongs to, if any.
    let mut current_workspace: Option<Uuid> = None;

    loop {
        tokio::select! {
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        dispatch_frame(&state, &mut socket, &mut current_workspace, client_id, user_id, &client_tx, &text).await;
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
            Some(frame) = client_rx.recv() => {
                if send_frame(&mut socket, &frame).await.is_err() {
                    break;
                }
            }
        }
    }

    if let Some(workspace_id) = current_workspace {
        services::workspace::part_hub(&state, workspace_id, client_id).await;
    }
    info!(%client_id, "ws: client disconnected");
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Parse an incoming JSON frame, dispatch to handler, apply outcome.
async fn dispatch_frame(
    state: &AppState,
    socket: &mut WebSocket,
    current_workspace: &mut Option<Uuid>,
    client_id: Uuid,
    user_id: Uuid,
    client_tx: &mpsc::Sender<Frame>,
    text: &str,
) {
    let sender_frames = process_inbound_text(state, current_workspace, client_id, user_id, client_tx, text).await;
    for frame in sender_frames {
        let _ = send_frame(socket, &frame).await;
    }
}

/// Parse and process one inbound text frame and return frames for the sender.
///
/// This keeps the websocket transport concerns separate from frame handling,
/// so tests can exercise dispatch and snapshot behavior end-to-end.
async fn process_inbound_text(
    state: &AppState,
    current_workspace: &mut Option<Uuid>,
    client_id: Uuid,
    user_id: Uuid,
    client_tx: &mpsc::Sender<Frame>,
    text: &str,
) -> Vec<Frame> {
    let Ok(mut req) = serde_json::from_str::<Frame>(text).inspect_err(|e| {
        warn!(%client_id, error = %e, "ws: invalid inbound frame");
    }) else {
        let err = Frame::request("gateway:error", Data::new()).with_data("message", "invalid json".to_string());
        return vec![err];
    };

    // Stamp the authenticated user_id as `from`.
    req.from = Some(user_id.to_string());

    info!(%client_id, id = %req.id, syscall = %req.syscall, status = ?req.status, "ws: recv frame");

    let prefix = req.prefix();
    let result = match prefix {
        "workspace" => handle_workspace(state, current_workspace, client_id, user_id, client_tx, &req).await,
        "participant" => handle_participant(state, *current_workspace, user_id, &req).await,
        "comment" => handle_comment(state, *current_workspace, user_id, &req).await,
        "screenshot" => handle_screenshot(state, *current_workspace, user_id, &req).await,
        _ => Err(req.error(format!("unknown prefix: {prefix}"))),
    };

    // Apply outcome — the dispatch layer owns all outbound logic.
    match result {
        Ok(Outcome::ReplyThen { reply, follow }) => {
            let mut frames = vec![req.done_with(reply)];
            frames.extend(follow);
            frames
        }
        Ok(Outcome::Refresh(collection)) => {
            if let Some(workspace_id) = *current_workspace {
                services::workspace::broadcast_snapshot(state, workspace_id, collection).await;
            }
            vec![req.done()]
        }
        Err(err_frame) => {
            vec![err_frame]
        }
    }
}

// =============================================================================
// WORKSPACE HANDLERS
// =============================================================================

async fn handle_workspace(
    state: &AppState,
    current_workspace: &mut Option<Uuid>,
    client_id: Uuid,
    user_id: Uuid,
    client_tx: &mpsc::Sender<Frame>,
    req: &Frame,
) -> Result<Outcome, Frame> {
    let op = req.syscall.split_once(':').map_or("", |(_, op)| op);

    match op {
        "join" => {
            let Some(workspace_id) = req.workspace_id.or_else(|| {
                req.data
                    .get("workspace_id")
                    .and_then(|v| v.as_str())
                    .and_then(|s| s.parse().ok())
            }) else {
                return Err(req.error("workspace_id required"));
            };

            // Leave the current hub if already joined somewhere.
            if let Some(old_workspace) = current_workspace.take() {
                services::workspace::part_hub(state, old_workspace, client_id).await;
            }

            let workspace = match services::workspace::get_workspace(&state.pool, workspace_id).await {
                Ok(ws) => ws,
                Err(e) => return Err(req.error_from(&e)),
            };
            if let Err(e) =
                services::workspace::join_hub(state, workspace_id, client_id, user_id, client_tx.clone()).await
            {
                return Err(req.error_from(&e));
            }
            *current_workspace = Some(workspace_id);

            // Initial state: one snapshot per collection, to the joiner only.
            let mut follow = Vec::with_capacity(3);
            for collection in [Collection::Participants, Collection::Screenshots, Collection::Comments] {
                match services::workspace::snapshot_frame(&state.pool, workspace_id, collection).await {
                    Ok(frame) => follow.push(frame),
                    Err(e) => return Err(req.error_from(&e)),
                }
            }

            let mut reply = Data::new();
            reply.insert("workspace".into(), serde_json::to_value(&workspace).unwrap_or_default());
            Ok(Outcome::ReplyThen { reply, follow })
        }
        _ => Err(req.error(format!("unknown workspace op: {op}"))),
    }
}

// =============================================================================
// PARTICIPANT HANDLERS
// =============================================================================

async fn handle_participant(
    state: &AppState,
    current_workspace: Option<Uuid>,
    user_id: Uuid,
    req: &Frame,
) -> Result<Outcome, Frame> {
    let Some(workspace_id) = current_workspace else {
        return Err(req.error("must join a workspace first"));
    };

    let op = req.syscall.split_once(':').map_or("", |(_, op)| op);

    match op {
        "join" => {
            let nickname = req.data.get("nickname").and_then(|v| v.as_str()).unwrap_or("");
            match services::participant::join_participant(&state.pool, workspace_id, user_id, nickname).await {
                Ok(_) => Ok(Outcome::Refresh(Collection::Participants)),
                Err(e) => Err(req.error_from(&e)),
            }
        }
        "status" => {
            let raw = req.data.get("status").and_then(|v| v.as_str()).unwrap_or("");
            let Some(status) = ParticipantStatus::parse(raw) else {
                return Err(req.error("status must be one of not_started, in_progress, completed"));
            };
            match services::participant::set_status(&state.pool, workspace_id, user_id, status).await {
                Ok(_) => Ok(Outcome::Refresh(Collection::Participants)),
                Err(e) => Err(req.error_from(&e)),
            }
        }
        _ => Err(req.error(format!("unknown participant op: {op}"))),
    }
}

// =============================================================================
// COMMENT HANDLERS
// =============================================================================

async fn handle_comment(
    state: &AppState,
    current_workspace: Option<Uuid>,
    user_id: Uuid,
    req: &Frame,
) -> Result<Outcome, Frame> {
    let Some(workspace_id) = current_workspace else {
        return Err(req.error("must join a workspace first"));
    };

    let op = req.syscall.split_once(':').map_or("", |(_, op)| op);

    match op {
        "post" => {
            let body = req.data.get("body").and_then(|v| v.as_str()).unwrap_or("");
            match services::comment::post_comment(&state.pool, workspace_id, user_id, body).await {
                Ok(_) => Ok(Outcome::Refresh(Collection::Comments)),
                Err(e) => Err(req.error_from(&e)),
            }
        }
        _ => Err(req.error(format!("unknown comment op: {op}"))),
    }
}

// =============================================================================
// SCREENSHOT HANDLERS
// =============================================================================

async fn handle_screenshot(
    state: &AppState,
    current_workspace: Option<Uuid>,
    user_id: Uuid,
    req: &Frame,
) -> Result<Outcome, Frame> {
    let Some(workspace_id) = current_workspace else {
        return Err(req.error("must join a workspace first"));
    };

    let op = req.syscall.split_once(':').map_or("", |(_, op)| op);

    match op {
        "reorder" => {
            let Some(order) = req.data.get("order").and_then(|v| v.as_array()) else {
                return Err(req.error("order required"));
            };
            let mut ordered = Vec::with_capacity(order.len());
            for value in order {
                let Some(id) = value.as_str().and_then(|s| s.parse::<Uuid>().ok()) else {
                    return Err(req.error("order must be a list of user ids"));
                };
                ordered.push(id);
            }

            match services::screenshot::reorder_screenshots(state, workspace_id, user_id, &ordered).await {
                Ok(()) => Ok(Outcome::Refresh(Collection::Screenshots)),
                Err(e) => Err(req.error_from(&e)),
            }
        }
        "delete" => match services::screenshot::delete_screenshot(state, workspace_id, user_id).await {
            Ok(()) => Ok(Outcome::Refresh(Collection::Screenshots)),
            Err(e) => Err(req.error_from(&e)),
        },
        _ => Err(req.error(format!("unknown screenshot op: {op}"))),
    }
}

// =============================================================================
// HELPERS
// =============================================================================

async fn send_frame(socket: &mut WebSocket, frame: &Frame) -> Result<(), ()> {
    let Ok(json) = serde_json::to_string(frame).inspect_err(|e| {
        warn!(error = %e, "ws: failed to serialize frame");
    }) else {
        return Err(());
    };

    if frame.status == wire::Status::Error {
        let code = frame.data.get(wire::FRAME_CODE).and_then(|v| v.as_str()).unwrap_or("-");
        warn!(id = %frame.id, syscall = %frame.syscall, code, message = frame.error_message().unwrap_or("-"), "ws: send error frame");
    } else {
        info!(id = %frame.id, syscall = %frame.syscall, status = ?frame.status, "ws: send frame");
    }

    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;

use super::*;

use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use wire::records::{Comment, Participant, Screenshot, ValidationError};

type ServerWs = WebSocketStream<TcpStream>;

// =============================================================================
// LOOPBACK FIXTURE
// =============================================================================

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let base = format!("http://{}", listener.local_addr().expect("addr"));
    (listener, base)
}

async fn accept_one(listener: TcpListener) -> ServerWs {
    let (stream, _) = listener.accept().await.expect("accept");
    accept_async(stream).await.expect("ws handshake")
}

async fn send_frame(ws: &mut ServerWs, frame: &Frame) {
    let json = serde_json::to_string(frame).expect("encode");
    ws.send(Message::Text(json.into())).await.expect("send");
}

async fn recv_frame(ws: &mut ServerWs) -> Frame {
    loop {
        let message = ws.next().await.expect("stream open").expect("message");
        if let Message::Text(text) = message {
            return serde_json::from_str(text.as_str()).expect("frame");
        }
    }
}

fn welcome(client_id: Uuid, user_id: Uuid) -> Frame {
    Frame::request("session:connected", Data::new())
        .with_data("client_id", client_id.to_string())
        .with_data("user_id", user_id.to_string())
}

fn snapshot(syscall: &str, workspace_id: Uuid, items: serde_json::Value) -> Frame {
    Frame::request(syscall, Data::new())
        .with_workspace_id(workspace_id)
        .with_data(wire::FRAME_ITEMS, items)
}

// =============================================================================
// URL MAPPING
// =============================================================================

#[test]
fn http_base_urls_map_to_ws_and_carry_the_ticket() {
    let url = ws_url("http://localhost:3000", "t-123").expect("url");
    assert_eq!(url, "ws://localhost:3000/api/ws?ticket=t-123");
}

#[test]
fn https_base_urls_map_to_wss_and_trailing_slashes_drop() {
    let url = ws_url("https://night.example/", "t-9").expect("url");
    assert_eq!(url, "wss://night.example/api/ws?ticket=t-9");
}

#[test]
fn other_schemes_are_rejected() {
    assert!(matches!(ws_url("ftp://night.example", "t"), Err(SyncError::InvalidBaseUrl(_))));
    assert!(matches!(ws_url("night.example", "t"), Err(SyncError::InvalidBaseUrl(_))));
}

// =============================================================================
// HANDSHAKE
// =============================================================================

#[tokio::test]
async fn connect_resolves_ids_from_the_welcome_frame() {
    let (listener, base) = bind().await;
    let client_id = Uuid::new_v4();
    let user_id = Uuid::new_v4();

    let server = tokio::spawn(async move {
        let mut ws = accept_one(listener).await;
        // Non-frame noise before the welcome must be skipped, not fatal.
        ws.send(Message::Text("not a frame".to_string().into())).await.expect("send noise");
        send_frame(&mut ws, &welcome(client_id, user_id)).await;
        ws
    });

    let client = SyncClient::connect(&base, "ticket-1").await.expect("connect");
    assert_eq!(client.client_id(), client_id);
    assert_eq!(client.user_id(), user_id);

    let _ws = server.await.expect("server task");
}

// =============================================================================
// REQUEST CORRELATION
// =============================================================================

#[tokio::test]
async fn replies_are_matched_by_parent_id() {
    let (listener, base) = bind().await;

    let server = tokio::spawn(async move {
        let mut ws = accept_one(listener).await;
        send_frame(&mut ws, &welcome(Uuid::new_v4(), Uuid::new_v4())).await;
        let req = recv_frame(&mut ws).await;
        // An unrelated broadcast must not satisfy the pending request.
        send_frame(&mut ws, &snapshot(PARTICIPANT_SNAPSHOT, Uuid::new_v4(), serde_json::json!([])))
            .await;
        let mut data = Data::new();
        data.insert("title".into(), serde_json::json!("midnight run"));
        send_frame(&mut ws, &req.done_with(data)).await;
        ws
    });

    let client = SyncClient::connect(&base, "t").await.expect("connect");
    let reply = client
        .request(Frame::request("workspace:title", Data::new()))
        .await
        .expect("reply");
    assert_eq!(reply.status, Status::Done);
    assert_eq!(
        reply.data.get("title").and_then(serde_json::Value::as_str),
        Some("midnight run")
    );

    let _ws = server.await.expect("server task");
}

#[tokio::test]
async fn error_replies_become_typed_errors() {
    let (listener, base) = bind().await;

    let server = tokio::spawn(async move {
        let mut ws = accept_one(listener).await;
        send_frame(&mut ws, &welcome(Uuid::new_v4(), Uuid::new_v4())).await;
        let req = recv_frame(&mut ws).await;
        send_frame(&mut ws, &req.error_from(&ValidationError::CommentBlank)).await;
        ws
    });

    let client = SyncClient::connect(&base, "t").await.expect("connect");
    let err = client
        .request(Frame::request("comment:post", Data::new()))
        .await
        .expect_err("error reply");
    match err {
        SyncError::Server { syscall, code, message } => {
            assert_eq!(syscall, "comment:post");
            assert_eq!(code.as_deref(), Some("E_COMMENT_BLANK"));
            assert!(!message.is_empty());
        }
        other => panic!("expected server error, got {other:?}"),
    }

    let _ws = server.await.expect("server task");
}

// =============================================================================
// CONVENIENCE ACTIONS
// =============================================================================

#[tokio::test]
async fn bad_inputs_are_rejected_before_any_frame_is_sent() {
    let (listener, base) = bind().await;

    let server = tokio::spawn(async move {
        let mut ws = accept_one(listener).await;
        send_frame(&mut ws, &welcome(Uuid::new_v4(), Uuid::new_v4())).await;
        ws
    });

    let client = SyncClient::connect(&base, "t").await.expect("connect");
    let workspace_id = Uuid::new_v4();

    let err = client.join_as(workspace_id, &"x".repeat(21)).await.expect_err("long nickname");
    assert!(matches!(err, SyncError::Validation(ValidationError::NicknameLength)));

    let err = client.post_comment(workspace_id, "   ").await.expect_err("blank comment");
    assert!(matches!(err, SyncError::Validation(ValidationError::CommentBlank)));

    let _ws = server.await.expect("server task");
}

#[tokio::test]
async fn actions_send_scoped_request_frames() {
    let (listener, base) = bind().await;

    let server = tokio::spawn(async move {
        let mut ws = accept_one(listener).await;
        send_frame(&mut ws, &welcome(Uuid::new_v4(), Uuid::new_v4())).await;
        let mut seen = Vec::new();
        for _ in 0..2 {
            let req = recv_frame(&mut ws).await;
            send_frame(&mut ws, &req.done()).await;
            seen.push(req);
        }
        seen
    });

    let client = SyncClient::connect(&base, "t").await.expect("connect");
    let workspace_id = Uuid::new_v4();
    let first = Uuid::new_v4();
    let second = Uuid::new_v4();

    client
        .set_status(workspace_id, ParticipantStatus::InProgress)
        .await
        .expect("set status");
    client
        .reorder_screenshots(workspace_id, &[first, second])
        .await
        .expect("reorder");

    let seen = server.await.expect("server task");
    assert_eq!(seen[0].syscall, "participant:status");
    assert_eq!(seen[0].workspace_id, Some(workspace_id));
    assert_eq!(
        seen[0].data.get("status").and_then(serde_json::Value::as_str),
        Some("in_progress")
    );
    assert_eq!(seen[1].syscall, "screenshot:reorder");
    assert_eq!(seen[1].data.get("order"), Some(&serde_json::json!([first, second])));
}

// =============================================================================
// JOIN + FEEDS
// =============================================================================

#[tokio::test]
async fn join_workspace_returns_the_record_and_feeds_the_initial_snapshots() {
    let (listener, base) = bind().await;
    let workspace_id = Uuid::new_v4();
    let workspace =
        Workspace { id: workspace_id, title: "crunch night".into(), due_at_ms: 1_700_000_000_000 };
    let roster = vec![Participant {
        user_id: Uuid::new_v4(),
        nickname: "mara".into(),
        status: ParticipantStatus::InProgress,
        joined_at_ms: 1,
    }];

    let server = tokio::spawn({
        let workspace = workspace.clone();
        let roster = roster.clone();
        async move {
            let mut ws = accept_one(listener).await;
            send_frame(&mut ws, &welcome(Uuid::new_v4(), Uuid::new_v4())).await;

            let req = recv_frame(&mut ws).await;
            assert_eq!(req.syscall, "workspace:join");
            assert_eq!(req.workspace_id, Some(workspace.id));

            // A snapshot for some other workspace must not leak into the feeds.
            send_frame(
                &mut ws,
                &snapshot(PARTICIPANT_SNAPSHOT, Uuid::new_v4(), serde_json::json!([{}, {}])),
            )
            .await;

            // Initial snapshots go out before the reply, like the live server.
            let items = serde_json::to_value(&roster).expect("items");
            send_frame(&mut ws, &snapshot(PARTICIPANT_SNAPSHOT, workspace.id, items)).await;
            send_frame(&mut ws, &snapshot(SCREENSHOT_SNAPSHOT, workspace.id, serde_json::json!([])))
                .await;
            send_frame(&mut ws, &snapshot(COMMENT_SNAPSHOT, workspace.id, serde_json::json!([])))
                .await;

            let mut data = Data::new();
            data.insert("workspace".into(), serde_json::to_value(&workspace).expect("workspace"));
            send_frame(&mut ws, &req.done_with(data)).await;
            ws
        }
    });

    let client = SyncClient::connect(&base, "t").await.expect("connect");
    let mut joined = client.join_workspace(workspace_id).await.expect("join");
    assert_eq!(joined.workspace.title, "crunch night");
    assert_eq!(joined.workspace.id, workspace_id);

    let frame = joined.participants.recv().await.expect("participant snapshot");
    assert_eq!(frame.workspace_id, Some(workspace_id));
    let received: Vec<Participant> = frame.items().expect("roster");
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].nickname, "mara");

    let frame = joined.screenshots.recv().await.expect("screenshot snapshot");
    assert!(frame.items::<Screenshot>().expect("screenshots").is_empty());
    let frame = joined.comments.recv().await.expect("comment snapshot");
    assert!(frame.items::<Comment>().expect("comments").is_empty());

    let _ws = server.await.expect("server task");
}

#[tokio::test]
async fn dropped_subscriptions_detach_without_breaking_the_rest() {
    let (listener, base) = bind().await;

    let server = tokio::spawn(async move {
        let mut ws = accept_one(listener).await;
        send_frame(&mut ws, &welcome(Uuid::new_v4(), Uuid::new_v4())).await;
        // The ping request serializes against the client-side subscribe calls.
        let req = recv_frame(&mut ws).await;
        for _ in 0..2 {
            send_frame(&mut ws, &snapshot(COMMENT_SNAPSHOT, Uuid::new_v4(), serde_json::json!([])))
                .await;
        }
        send_frame(&mut ws, &req.done()).await;
        ws
    });

    let client = SyncClient::connect(&base, "t").await.expect("connect");
    let dropped = client.subscribe(COMMENT_SNAPSHOT).await;
    let mut kept = client.subscribe(COMMENT_SNAPSHOT).await;
    drop(dropped);

    client.request(Frame::request("sync:ping", Data::new())).await.expect("ping");

    let first = kept.recv().await.expect("first broadcast");
    assert_eq!(first.syscall, COMMENT_SNAPSHOT);
    let second = kept.recv().await.expect("second broadcast");
    assert_eq!(second.syscall, COMMENT_SNAPSHOT);
    assert!(kept.try_recv().is_none());

    let _ws = server.await.expect("server task");
}

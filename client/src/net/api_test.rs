use super::*;

// Nothing listens here; tests that reach the network would fail loudly.
const DEAD_URL: &str = "http://127.0.0.1:9";

// =============================================================================
// URL HANDLING
// =============================================================================

#[test]
fn resolve_url_joins_server_relative_paths() {
    let api = ApiClient::new("http://box:3000/");
    assert_eq!(
        api.resolve_url("/media/workspaces/w/screenshots/u.jpg?v=5"),
        "http://box:3000/media/workspaces/w/screenshots/u.jpg?v=5"
    );
}

#[test]
fn resolve_url_passes_absolute_urls_through() {
    let api = ApiClient::new("http://box:3000");
    assert_eq!(api.resolve_url("https://cdn/x.jpg"), "https://cdn/x.jpg");
    assert_eq!(api.resolve_url("http://cdn/x.jpg"), "http://cdn/x.jpg");
}

#[test]
fn base_url_trailing_slash_is_trimmed() {
    let api = ApiClient::new("http://box:3000///");
    assert_eq!(api.resolve_url("/healthz"), "http://box:3000/healthz");
}

// =============================================================================
// SESSION TOKEN
// =============================================================================

#[test]
fn with_session_token_resumes_a_session() {
    let api = ApiClient::new(DEAD_URL).with_session_token("abc123");
    assert_eq!(api.session_token(), Some("abc123"));
}

#[tokio::test]
async fn authed_calls_fail_before_any_request_when_not_logged_in() {
    let api = ApiClient::new(DEAD_URL);

    assert!(matches!(api.ws_ticket().await, Err(ApiError::MissingSessionToken)));
    assert!(matches!(api.list_workspaces().await, Err(ApiError::MissingSessionToken)));
    assert!(matches!(
        api.create_workspace("late shift", 1_700_000_000_000).await,
        Err(ApiError::MissingSessionToken)
    ));
    assert!(matches!(
        api.upload_screenshot(Uuid::from_u128(1), vec![0xFF], None, |_| {}).await,
        Err(ApiError::MissingSessionToken)
    ));
}

// =============================================================================
// ERROR BODY PARSING
// =============================================================================

#[test]
fn server_error_surfaces_code_and_message() {
    let body = serde_json::json!({"code": "E_CAPTION_LENGTH", "message": "caption must be at most 50 characters"});
    let err = server_error(422, &body);

    match err {
        ApiError::Server { status, code, message } => {
            assert_eq!(status, 422);
            assert_eq!(code.as_deref(), Some("E_CAPTION_LENGTH"));
            assert_eq!(message, "caption must be at most 50 characters");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn server_error_falls_back_to_the_raw_body() {
    let body = serde_json::json!({"weird": true});
    let err = server_error(500, &body);

    match err {
        ApiError::Server { status, code, message } => {
            assert_eq!(status, 500);
            assert!(code.is_none());
            assert_eq!(message, body.to_string());
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

// =============================================================================
// RESPONSE FIELD HELPERS
// =============================================================================

#[test]
fn field_helpers_extract_typed_values() {
    let id = Uuid::from_u128(42);
    let value = serde_json::json!({"user_id": id.to_string(), "token": "deadbeef"});

    assert_eq!(field_uuid(&value, "user_id").unwrap(), id);
    assert_eq!(field_str(&value, "token").unwrap(), "deadbeef");
}

#[test]
fn field_helpers_reject_missing_or_malformed_values() {
    let value = serde_json::json!({"user_id": "not-a-uuid"});

    assert!(matches!(field_uuid(&value, "user_id"), Err(ApiError::MissingField("user_id"))));
    assert!(matches!(field_str(&value, "token"), Err(ApiError::MissingField("token"))));
}

//! HTTP API client.
//!
//! DESIGN
//! ======
//! Thin reqwest wrapper over the server's REST surface: guest sessions,
//! websocket tickets, workspace CRUD, and the multipart screenshot upload.
//! The session token rides as a bearer header. Server error bodies carry
//! `{code, message}`; both are surfaced so callers can branch on the code
//! and display the message.

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;

use serde_json::Value;
use uuid::Uuid;

use wire::records::{Screenshot, Workspace};

/// Bytes handed to the transport per progress tick during uploads.
const UPLOAD_CHUNK_BYTES: usize = 64 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not logged in; call login_guest first")]
    MissingSessionToken,
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {message}")]
    Server {
        status: u16,
        code: Option<String>,
        message: String,
    },
    #[error("missing expected field `{0}`")]
    MissingField(&'static str),
}

/// An authenticated guest identity.
#[derive(Debug, Clone)]
pub struct GuestSession {
    pub user_id: Uuid,
    pub token: String,
}

/// Client for the server's HTTP surface.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session_token: Option<String>,
}

impl ApiClient {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session_token: None,
        }
    }

    /// Resume an existing session instead of logging in again.
    #[must_use]
    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }

    /// Resolve a server-relative URL (such as a screenshot's `/media/...`
    /// path) against this client's base URL. Absolute URLs pass through.
    #[must_use]
    pub fn resolve_url(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            return url.to_string();
        }
        format!("{}{url}", self.base_url)
    }

    // =========================================================================
    // AUTH
    // =========================================================================

    /// Create a guest user and session. The token is retained for
    /// subsequent calls.
    ///
    /// # Errors
    /// Returns transport errors or a malformed-response error.
    pub async fn login_guest(&mut self) -> Result<GuestSession, ApiError> {
        let response = self.http.post(self.api_url("/api/auth/guest")).send().await?;
        let value = read_json(response).await?;

        let session = GuestSession {
            user_id: field_uuid(&value, "user_id")?,
            token: field_str(&value, "token")?,
        };
        self.session_token = Some(session.token.clone());
        Ok(session)
    }

    /// Delete the current session server-side and forget the token.
    ///
    /// # Errors
    /// Returns `MissingSessionToken` when not logged in, or transport errors.
    pub async fn logout(&mut self) -> Result<(), ApiError> {
        let token = self.bearer()?.to_string();
        let response = self
            .http
            .post(self.api_url("/api/auth/logout"))
            .bearer_auth(token)
            .send()
            .await?;
        check_status(response).await?;
        self.session_token = None;
        Ok(())
    }

    /// Mint a one-time websocket ticket for `SyncClient::connect`.
    ///
    /// # Errors
    /// Returns `MissingSessionToken` when not logged in, or transport errors.
    pub async fn ws_ticket(&self) -> Result<String, ApiError> {
        let response = self
            .http
            .post(self.api_url("/api/auth/ws-ticket"))
            .bearer_auth(self.bearer()?)
            .send()
            .await?;
        let value = read_json(response).await?;
        field_str(&value, "ticket")
    }

    // =========================================================================
    // WORKSPACES
    // =========================================================================

    /// # Errors
    /// Returns `MissingSessionToken`, transport, or server errors.
    pub async fn create_workspace(&self, title: &str, due_at_ms: i64) -> Result<Workspace, ApiError> {
        let response = self
            .http
            .post(self.api_url("/api/workspaces"))
            .bearer_auth(self.bearer()?)
            .json(&serde_json::json!({ "title": title, "due_at_ms": due_at_ms }))
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json::<Workspace>().await?)
    }

    /// List workspaces the caller created or joined, soonest due first.
    ///
    /// # Errors
    /// Returns `MissingSessionToken`, transport, or server errors.
    pub async fn list_workspaces(&self) -> Result<Vec<Workspace>, ApiError> {
        let response = self
            .http
            .get(self.api_url("/api/workspaces"))
            .bearer_auth(self.bearer()?)
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json::<Vec<Workspace>>().await?)
    }

    /// Fetch one workspace by id, for the shared-link join flow.
    ///
    /// # Errors
    /// Returns `MissingSessionToken`, transport, or server errors.
    pub async fn get_workspace(&self, workspace_id: Uuid) -> Result<Workspace, ApiError> {
        let response = self
            .http
            .get(self.api_url(&format!("/api/workspaces/{workspace_id}")))
            .bearer_auth(self.bearer()?)
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json::<Workspace>().await?)
    }

    // =========================================================================
    // SCREENSHOT UPLOAD
    // =========================================================================

    /// Upload an encoded JPEG as the caller's screenshot for a workspace.
    ///
    /// The body streams in chunks; `on_progress` observes the handed-off
    /// fraction in `0.0..=1.0`. The server replies with the persisted record.
    ///
    /// # Errors
    /// Returns `MissingSessionToken`, transport, or server errors.
    pub async fn upload_screenshot(
        &self,
        workspace_id: Uuid,
        jpeg: Vec<u8>,
        caption: Option<String>,
        on_progress: impl FnMut(f64) + Send + 'static,
    ) -> Result<Screenshot, ApiError> {
        let token = self.bearer()?.to_string();
        let content_length = jpeg.len() as u64;

        let part = reqwest::multipart::Part::stream_with_length(
            progress_body(jpeg, on_progress),
            content_length,
        )
        .file_name("screenshot.jpg")
        .mime_str("image/jpeg")?;

        let mut form = reqwest::multipart::Form::new().part("image", part);
        if let Some(caption) = caption {
            form = form.text("caption", caption);
        }

        let response = self
            .http
            .post(self.api_url(&format!("/api/workspaces/{workspace_id}/screenshots")))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json::<Screenshot>().await?)
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    fn api_url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn bearer(&self) -> Result<&str, ApiError> {
        self.session_token.as_deref().ok_or(ApiError::MissingSessionToken)
    }
}

/// Wrap the payload in a chunked streaming body that reports progress as the
/// transport pulls it.
#[allow(clippy::cast_precision_loss)]
fn progress_body(jpeg: Vec<u8>, mut on_progress: impl FnMut(f64) + Send + 'static) -> reqwest::Body {
    let total = jpeg.len().max(1);
    let chunks: Vec<Vec<u8>> = jpeg.chunks(UPLOAD_CHUNK_BYTES).map(<[u8]>::to_vec).collect();
    let mut sent = 0usize;

    reqwest::Body::wrap_stream(futures_util::stream::iter(chunks.into_iter().map(
        move |chunk| {
            sent += chunk.len();
            on_progress(sent as f64 / total as f64);
            Ok::<Vec<u8>, std::io::Error>(chunk)
        },
    )))
}

/// Fail on non-success statuses, surfacing the server's `{code, message}`.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let value = response.json::<Value>().await.unwrap_or(Value::Null);
    Err(server_error(status.as_u16(), &value))
}

async fn read_json(response: reqwest::Response) -> Result<Value, ApiError> {
    let response = check_status(response).await?;
    Ok(response.json::<Value>().await?)
}

fn server_error(status: u16, value: &Value) -> ApiError {
    let code = value
        .get(wire::FRAME_CODE)
        .and_then(Value::as_str)
        .map(ToOwned::to_owned);
    let message = value
        .get(wire::FRAME_MESSAGE)
        .and_then(Value::as_str)
        .map_or_else(|| value.to_string(), ToOwned::to_owned);
    ApiError::Server { status, code, message }
}

fn field_str(value: &Value, key: &'static str) -> Result<String, ApiError> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or(ApiError::MissingField(key))
}

fn field_uuid(value: &Value, key: &'static str) -> Result<Uuid, ApiError> {
    value
        .get(key)
        .and_then(Value::as_str)
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .ok_or(ApiError::MissingField(key))
}

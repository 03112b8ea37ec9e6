//! Screenshot upload pipeline.
//!
//! One attempt walks `Idle → Validating → Uploading → Persisting → Done`,
//! with `Error` reachable from every working phase. Validation failures
//! (undecodable input, encoded size over the ceiling, over-long caption)
//! surface their error and park the machine back at `Idle` without touching
//! the network. Phases are published through a `tokio::sync::watch` channel,
//! so observers always see the latest state even if they missed
//! intermediate hops.

#[cfg(test)]
#[path = "upload_test.rs"]
mod tests;

use std::io::Cursor;

use image::ImageOutputFormat;
use tokio::sync::watch;
use uuid::Uuid;

use wire::records::{JPEG_QUALITY, Screenshot, normalize_caption, validate_image_size};

use crate::net::api::{ApiClient, ApiError};

/// Where an upload attempt currently stands.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum UploadPhase {
    #[default]
    Idle,
    Validating,
    Uploading {
        /// Fraction of the encoded body handed to the transport, 0.0 to 1.0.
        progress: f64,
    },
    Persisting,
    Done,
    Error {
        message: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("the selected file is not a decodable image: {0}")]
    Decode(image::ImageError),
    #[error("re-encoding the image failed: {0}")]
    Encode(image::ImageError),
    #[error(transparent)]
    Validation(#[from] wire::records::ValidationError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Drives upload attempts and publishes their phase.
pub struct Uploader {
    phase_tx: watch::Sender<UploadPhase>,
    phase_rx: watch::Receiver<UploadPhase>,
}

impl Uploader {
    #[must_use]
    pub fn new() -> Self {
        let (phase_tx, phase_rx) = watch::channel(UploadPhase::Idle);
        Self { phase_tx, phase_rx }
    }

    /// The current phase.
    #[must_use]
    pub fn phase(&self) -> UploadPhase {
        self.phase_rx.borrow().clone()
    }

    /// A watcher for phase changes, for progress bars and status lines.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<UploadPhase> {
        self.phase_rx.clone()
    }

    /// Validate, re-encode, and upload one screenshot.
    ///
    /// A new attempt may be started after any outcome; it begins by
    /// overwriting the published phase.
    ///
    /// # Errors
    /// Returns validation errors before any network traffic, transport and
    /// server errors after.
    pub async fn upload(
        &self,
        api: &ApiClient,
        workspace_id: Uuid,
        source: &[u8],
        caption: Option<&str>,
    ) -> Result<Screenshot, UploadError> {
        self.set(UploadPhase::Validating);

        let caption = match normalize_caption(caption) {
            Ok(caption) => caption,
            Err(e) => return Err(self.reject(e.into())),
        };
        let jpeg = match prepare_jpeg(source) {
            Ok(bytes) => bytes,
            Err(e) => return Err(self.reject(e)),
        };

        self.set(UploadPhase::Uploading { progress: 0.0 });
        let phase_tx = self.phase_tx.clone();
        let result = api
            .upload_screenshot(workspace_id, jpeg, caption, move |progress| {
                // The whole body handed off means we are waiting on the
                // server to write the record.
                let next = if progress >= 1.0 {
                    UploadPhase::Persisting
                } else {
                    UploadPhase::Uploading { progress }
                };
                let _ = phase_tx.send(next);
            })
            .await;

        match result {
            Ok(screenshot) => {
                self.set(UploadPhase::Done);
                Ok(screenshot)
            }
            Err(e) => {
                let err = UploadError::from(e);
                self.set(UploadPhase::Error { message: err.to_string() });
                Err(err)
            }
        }
    }

    fn set(&self, phase: UploadPhase) {
        let _ = self.phase_tx.send(phase);
    }

    /// Publish the failure, then park back at `Idle` so the caller can fix
    /// the input and retry.
    fn reject(&self, err: UploadError) -> UploadError {
        self.set(UploadPhase::Error { message: err.to_string() });
        self.set(UploadPhase::Idle);
        err
    }
}

impl Default for Uploader {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode any supported image format and re-encode it as a sharing-quality
/// JPEG. The size ceiling applies to the encoded output, before any network
/// traffic.
///
/// # Errors
/// Returns `Decode` for undecodable input, `Encode` for encoder failures,
/// and `Validation` when the encoded image is over the ceiling.
pub fn prepare_jpeg(source: &[u8]) -> Result<Vec<u8>, UploadError> {
    let img = image::load_from_memory(source).map_err(UploadError::Decode)?;
    let mut out = Vec::new();
    img.write_to(&mut Cursor::new(&mut out), ImageOutputFormat::Jpeg(JPEG_QUALITY))
        .map_err(UploadError::Encode)?;
    validate_image_size(out.len())?;
    Ok(out)
}

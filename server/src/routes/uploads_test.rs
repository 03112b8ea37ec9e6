use super::*;

#[test]
fn body_cap_leaves_headroom_over_image_ceiling() {
    assert!(MAX_UPLOAD_BODY_BYTES > MAX_IMAGE_BYTES);
}

#[test]
fn oversized_image_maps_to_413_with_code() {
    let err = ScreenshotError::Validation(ValidationError::ImageTooLarge(MAX_IMAGE_BYTES + 1));
    let (status, body) = screenshot_error_response(&err);

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body.0.get("code").and_then(|v| v.as_str()), Some("E_IMAGE_TOO_LARGE"));
    assert!(body.0.get("message").and_then(|v| v.as_str()).is_some());
}

#[test]
fn caption_validation_maps_to_422() {
    let err = ScreenshotError::Validation(ValidationError::CaptionLength);
    let (status, body) = screenshot_error_response(&err);

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body.0.get("code").and_then(|v| v.as_str()), Some("E_CAPTION_LENGTH"));
}

#[test]
fn membership_and_lookup_failures_map_to_403_and_404() {
    let (status, _) = screenshot_error_response(&ScreenshotError::NotParticipant);
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = screenshot_error_response(&ScreenshotError::WorkspaceNotFound(Uuid::new_v4()));
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = screenshot_error_response(&ScreenshotError::NotFound);
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[test]
fn backend_failures_map_to_500() {
    let storage = ScreenshotError::Storage(crate::services::storage::StorageError::Io(std::io::Error::other("disk")));
    let (status, body) = screenshot_error_response(&storage);
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body.0.get("code").and_then(|v| v.as_str()), Some("E_STORAGE_IO"));

    let (status, _) = screenshot_error_response(&ScreenshotError::Database(sqlx::Error::PoolClosed));
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

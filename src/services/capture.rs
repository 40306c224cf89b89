//! Capture-Import Transaction — import external image bytes as a new shape.
//!
//! DESIGN
//! ======
//! The whole operation runs inside one undo boundary so the host coalesces
//! upload, creation, placement, and selection into a single undoable action.
//! The boundary token is released on every exit path: a failed upload or a
//! failed mid-transaction step aborts the remaining steps but never skips
//! the finish. The undo machinery itself belongs to the host; this layer
//! only delimits it.

use tracing::{error, info};

use crate::api::{DocumentHost, HostError, HostShape};
use crate::config::{CAPTURE_MEDIA_NAME, CAPTURE_MIME, RuntimeSettings};
use crate::protocol::ShapeId;

/// Failure of the capture-import transaction.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("capture import requires a non-empty selection")]
    EmptySelection,
    #[error("media upload returned no reference")]
    UploadReturnedNothing,
    #[error("media upload timed out after {0:?}")]
    UploadTimeout(std::time::Duration),
    #[error("transaction step failed: {0}")]
    Step(#[from] HostError),
}

/// Upload image bytes and materialize them as a new rectangle next to the
/// current selection, all inside one undo boundary.
///
/// The new shape sits immediately to the right of `selection[0]`, separated
/// by the configured margin, matches its size exactly, carries the uploaded
/// image as a fully opaque fill, and becomes the sole selection.
///
/// # Errors
///
/// Returns [`CaptureError`] when the selection is empty, the upload fails or
/// yields no reference, or any mutation step rejects. On every failure after
/// the boundary was opened, the boundary is still closed exactly once and no
/// selection change is made by this layer.
pub async fn import_capture(
    host: &dyn DocumentHost,
    image_data: &[u8],
    settings: &RuntimeSettings,
) -> Result<ShapeId, CaptureError> {
    let selection = host.selection().await?;
    let Some(anchor) = selection.first() else {
        return Err(CaptureError::EmptySelection);
    };

    let token = host.undo_block_begin().await?;
    let result = run_steps(host, anchor, image_data, settings).await;

    // Always executed, success or failure: the boundary must not dangle.
    if let Err(e) = host.undo_block_finish(token).await {
        error!(error = %e, "failed to close undo block after capture import");
    }

    if let Ok(shape) = &result {
        info!(%shape, "capture imported as new shape");
    }
    result
}

async fn run_steps(
    host: &dyn DocumentHost,
    anchor: &HostShape,
    image_data: &[u8],
    settings: &RuntimeSettings,
) -> Result<ShapeId, CaptureError> {
    let upload = tokio::time::timeout(
        settings.upload_timeout,
        host.upload_media(CAPTURE_MEDIA_NAME, image_data, CAPTURE_MIME),
    )
    .await;
    let media = match upload {
        Ok(Ok(Some(media))) => media,
        Ok(Ok(None)) => return Err(CaptureError::UploadReturnedNothing),
        Ok(Err(source)) => return Err(source.into()),
        Err(_) => return Err(CaptureError::UploadTimeout(settings.upload_timeout)),
    };

    let rect = host.create_rectangle().await?;
    host.set_position(rect, anchor.x + anchor.width + settings.capture_margin, anchor.y)
        .await?;
    host.resize(rect, anchor.width, anchor.height).await?;
    host.set_image_fill(rect, media, 1.0).await?;
    host.set_selection(vec![rect]).await?;

    Ok(rect)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use super::*;
    use crate::api::test_helpers::{ScriptedHost, UploadMode, init_tracing, shape};

    const BYTES: &[u8] = &[137, 80, 78, 71];

    fn host_with_anchor() -> (ScriptedHost, HostShape) {
        let anchor = shape("anchor", 100.0, 40.0, 200.0, 120.0);
        (ScriptedHost::new(vec![anchor.clone()]), anchor)
    }

    #[tokio::test]
    async fn success_creates_positioned_sized_filled_shape() {
        let (host, anchor) = host_with_anchor();
        let settings = RuntimeSettings::default();

        let rect = import_capture(&host, BYTES, &settings).await.unwrap();

        assert_eq!(host.created.lock().unwrap().as_slice(), &[rect]);

        let (x, y) = host.positions.lock().unwrap()[&rect];
        assert!((x - (anchor.x + anchor.width + settings.capture_margin)).abs() < f64::EPSILON);
        assert!((y - anchor.y).abs() < f64::EPSILON);

        let (w, h) = host.sizes.lock().unwrap()[&rect];
        assert!((w - anchor.width).abs() < f64::EPSILON);
        assert!((h - anchor.height).abs() < f64::EPSILON);

        let (_, opacity) = host.fills.lock().unwrap()[&rect];
        assert!((opacity - 1.0).abs() < f64::EPSILON);

        // The new shape becomes the sole selection.
        assert_eq!(host.selection_assignments.lock().unwrap().as_slice(), &[vec![rect]]);
    }

    #[tokio::test]
    async fn success_releases_undo_boundary_exactly_once() {
        let (host, _) = host_with_anchor();
        import_capture(&host, BYTES, &RuntimeSettings::default()).await.unwrap();

        assert_eq!(host.begin_count.load(Ordering::SeqCst), 1);
        assert_eq!(host.finish_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn uploads_tagged_capture_bytes() {
        let (host, _) = host_with_anchor();
        import_capture(&host, BYTES, &RuntimeSettings::default()).await.unwrap();

        let uploaded = host.uploaded.lock().unwrap();
        assert_eq!(uploaded.len(), 1);
        let (name, bytes, mime) = &uploaded[0];
        assert_eq!(name, CAPTURE_MEDIA_NAME);
        assert_eq!(bytes, BYTES);
        assert_eq!(mime, CAPTURE_MIME);
    }

    #[tokio::test]
    async fn upload_rejection_creates_nothing_and_releases_boundary() {
        let (host, _) = host_with_anchor();
        *host.upload_mode.lock().unwrap() = UploadMode::Reject;

        let result = import_capture(&host, BYTES, &RuntimeSettings::default()).await;

        assert!(matches!(result.unwrap_err(), CaptureError::Step(_)));
        assert!(host.created.lock().unwrap().is_empty());
        assert!(host.selection_assignments.lock().unwrap().is_empty());
        assert_eq!(host.finish_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn upload_without_reference_creates_nothing_and_releases_boundary() {
        let (host, _) = host_with_anchor();
        *host.upload_mode.lock().unwrap() = UploadMode::ReturnNone;

        let result = import_capture(&host, BYTES, &RuntimeSettings::default()).await;

        assert!(matches!(result.unwrap_err(), CaptureError::UploadReturnedNothing));
        assert!(host.created.lock().unwrap().is_empty());
        assert_eq!(host.finish_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stalled_upload_times_out_and_releases_boundary() {
        let (host, _) = host_with_anchor();
        *host.upload_mode.lock().unwrap() = UploadMode::Stall(80);
        let settings = RuntimeSettings { upload_timeout: Duration::from_millis(10), ..RuntimeSettings::default() };

        let result = import_capture(&host, BYTES, &settings).await;

        assert!(matches!(result.unwrap_err(), CaptureError::UploadTimeout(_)));
        assert!(host.created.lock().unwrap().is_empty());
        assert_eq!(host.finish_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn mid_transaction_failure_releases_boundary_and_skips_selection() {
        init_tracing();
        let (host, _) = host_with_anchor();
        *host.fail_set_position.lock().unwrap() = true;

        let result = import_capture(&host, BYTES, &RuntimeSettings::default()).await;

        assert!(matches!(result.unwrap_err(), CaptureError::Step(_)));
        // The rectangle was created inside the boundary; undo coalescing is
        // the host's job. This layer must not have touched the selection.
        assert!(host.selection_assignments.lock().unwrap().is_empty());
        assert_eq!(host.finish_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_selection_never_opens_a_boundary() {
        let host = ScriptedHost::new(vec![]);

        let result = import_capture(&host, BYTES, &RuntimeSettings::default()).await;

        assert!(matches!(result.unwrap_err(), CaptureError::EmptySelection));
        assert_eq!(host.begin_count.load(Ordering::SeqCst), 0);
        assert_eq!(host.finish_count.load(Ordering::SeqCst), 0);
    }
}

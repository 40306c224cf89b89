//! Export Fan-Out — concurrent per-shape rasterization in selection order.
//!
//! DESIGN
//! ======
//! The selection snapshot is captured by the caller at invocation time; jobs
//! in flight keep operating on it even if the live selection changes
//! underneath them. Ordering is an explicit invariant, not an accident of
//! the gather primitive: every job carries its input index and results are
//! placed into an index-addressed buffer, so the output order equals the
//! input order regardless of completion order.
//!
//! Failure policy is all-or-nothing: one failed or timed-out job fails the
//! whole batch. A partial result list would silently break the order/length
//! invariant the panel relies on.

use std::time::Duration;

use futures::future::join_all;
use tokio::time::timeout;

use crate::api::{DocumentHost, HostError};
use crate::config::RuntimeSettings;
use crate::protocol::{ExportJobResult, ShapeId, ShapeSnapshot};

/// Failure of one job, reported for the whole batch.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("export of shape {id} (job {index}) failed: {source}")]
    Job {
        index: usize,
        id: ShapeId,
        source: HostError,
    },
    #[error("export of shape {id} (job {index}) timed out after {timeout:?}")]
    Timeout {
        index: usize,
        id: ShapeId,
        timeout: Duration,
    },
}

/// Export every shape of the captured selection concurrently.
///
/// Returns one result per input shape, in input order.
///
/// # Errors
///
/// Returns [`ExportError`] if any single job rejects or exceeds the
/// configured export timeout; no partial batch is produced.
pub async fn export_selection(
    host: &dyn DocumentHost,
    selection: &[ShapeSnapshot],
    settings: &RuntimeSettings,
) -> Result<Vec<ExportJobResult>, ExportError> {
    let jobs = selection.iter().enumerate().map(|(index, shape)| async move {
        let export = timeout(
            settings.export_timeout,
            host.export_shape(shape.id, settings.export_format, settings.export_scale),
        )
        .await;

        match export {
            Ok(Ok(image_data)) => Ok((
                index,
                ExportJobResult {
                    image_data,
                    width: shape.width,
                    height: shape.height,
                    x: shape.x,
                    y: shape.y,
                },
            )),
            Ok(Err(source)) => Err(ExportError::Job { index, id: shape.id, source }),
            Err(_) => Err(ExportError::Timeout { index, id: shape.id, timeout: settings.export_timeout }),
        }
    });

    // Indexed gather: completion order never influences output order.
    let mut slots: Vec<Option<ExportJobResult>> = Vec::new();
    slots.resize_with(selection.len(), || None);
    for outcome in join_all(jobs).await {
        let (index, result) = outcome?;
        slots[index] = Some(result);
    }

    Ok(slots.into_iter().flatten().collect())
}

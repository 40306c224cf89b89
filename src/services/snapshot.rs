//! Shape Snapshot Builder — host shapes to wire snapshots.
//!
//! Pure transformation: reads already-resident shape properties, no I/O.
//! Snapshots are built fresh on every selection or shape-change event and
//! superseded wholesale by the next batch.

use crate::api::HostShape;
use crate::protocol::ShapeSnapshot;

/// Build wire snapshots for the current selection, in host order.
///
/// Returns `None` for an empty selection: "nothing selected" is an explicit
/// state on the wire, distinct from a zero-length list.
#[must_use]
pub fn build_snapshots(selection: &[HostShape]) -> Option<Vec<ShapeSnapshot>> {
    if selection.is_empty() {
        return None;
    }
    Some(selection.iter().map(snapshot_of).collect())
}

fn snapshot_of(shape: &HostShape) -> ShapeSnapshot {
    ShapeSnapshot {
        id: shape.id,
        name: shape.name.clone(),
        x: shape.x,
        y: shape.y,
        width: shape.width,
        height: shape.height,
        kind: shape.kind.clone(),
    }
}

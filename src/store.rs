//! Outbound Mirror Store — the panel's keyed projection of the selection.
//!
//! SYSTEM CONTEXT
//! ==============
//! The panel keeps per-shape presentation metadata (name, stacking order,
//! position overrides) that local gestures such as drag-to-reorder mutate
//! between host resyncs. A host-driven `initialize` replaces the whole map:
//! last-writer-wins, never a merge, so panel-local overrides not re-supplied
//! by the host are discarded. All mutations are synchronous and the store is
//! only touched from the panel's single-threaded context — no locking.

#[cfg(test)]
#[path = "store_test.rs"]
mod store_test;

use std::collections::HashMap;

use crate::protocol::{ShapeId, ShapeSnapshot};

/// Presentation metadata for one mirrored shape. Fields are optional because
/// a mutation on an id the host never supplied creates a degenerate entry
/// with only the targeted field set — defined behavior, not an error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MirrorEntry {
    pub name: Option<String>,
    pub stack_index: Option<i64>,
    pub x: Option<f64>,
    pub y: Option<f64>,
}

/// Position axis targeted by [`MirrorStore::update_position`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

/// Order-independent map from shape identity to presentation metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MirrorStore {
    entries: HashMap<ShapeId, MirrorEntry>,
}

impl MirrorStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entire map from a host resync. Whole-map replace:
    /// entries absent from `snapshots` are discarded, stacking order resets
    /// to zero.
    pub fn initialize(&mut self, snapshots: &[ShapeSnapshot]) {
        self.entries = snapshots
            .iter()
            .map(|snap| {
                let entry = MirrorEntry {
                    name: Some(snap.name.clone()),
                    stack_index: Some(0),
                    x: Some(snap.x),
                    y: Some(snap.y),
                };
                (snap.id, entry)
            })
            .collect();
    }

    /// Apply a host selection message: resync on `Some`, clear on `None`.
    pub fn apply_selection(&mut self, selection: Option<&[ShapeSnapshot]>) {
        match selection {
            Some(snapshots) => self.initialize(snapshots),
            None => self.clear(),
        }
    }

    /// Set one entry's stacking order, leaving its other fields untouched.
    pub fn update_stack_index(&mut self, id: ShapeId, stack_index: i64) {
        self.entries.entry(id).or_default().stack_index = Some(stack_index);
    }

    /// Set one entry's position on one axis, leaving everything else untouched.
    pub fn update_position(&mut self, id: ShapeId, axis: Axis, value: f64) {
        let entry = self.entries.entry(id).or_default();
        match axis {
            Axis::X => entry.x = Some(value),
            Axis::Y => entry.y = Some(value),
        }
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn get(&self, id: ShapeId) -> Option<&MirrorEntry> {
        self.entries.get(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

//! Listener Rebinder — the shape-change subscription state machine.
//!
//! DESIGN
//! ======
//! At most one shape-change subscription is ever live, tracking the first
//! shape of the current selection. On every selection change the existing
//! binding is destroyed before any new one is created, so two bindings for
//! different shapes can never overlap and no subscription leaks across
//! selections. Binding only the first shape keeps subscription cost O(1)
//! regardless of selection size; edits to the 2nd..nth selected shape do not
//! trigger a resend. Known limitation, kept deliberately.
//!
//! The binding state lives here, owned by the [`Rebinder`] instance — never
//! in a free-floating mutable variable shared across event handlers.

use tracing::debug;

use crate::api::{DocumentHost, EventTopic, HostError, HostShape, Subscription};
use crate::protocol::ShapeId;

/// Binding state: `Idle` or tracking exactly one shape.
#[derive(Debug, Default, PartialEq, Eq)]
enum Binding {
    #[default]
    Idle,
    Bound { shape: ShapeId, subscription: Subscription },
}

/// Owns the single live shape-change subscription.
#[derive(Debug, Default)]
pub struct Rebinder {
    binding: Binding,
}

impl Rebinder {
    #[must_use]
    pub fn new() -> Self {
        Self { binding: Binding::Idle }
    }

    /// Shape currently tracked, if any.
    #[must_use]
    pub fn bound_shape(&self) -> Option<ShapeId> {
        match self.binding {
            Binding::Idle => None,
            Binding::Bound { shape, .. } => Some(shape),
        }
    }

    /// Re-derive the binding for a new selection.
    ///
    /// Any existing binding is destroyed first, unconditionally. A non-empty
    /// selection then binds its first shape; an empty one leaves the machine
    /// idle.
    ///
    /// # Errors
    ///
    /// Returns the host error from `unsubscribe` or `subscribe`. In both
    /// cases the old binding is already gone — the no-overlap invariant holds
    /// even on the error path.
    pub async fn rebind(&mut self, host: &dyn DocumentHost, selection: &[HostShape]) -> Result<(), HostError> {
        self.release(host).await?;

        if let Some(first) = selection.first() {
            let subscription = host.subscribe(EventTopic::ShapeChange(first.id)).await?;
            debug!(shape = %first.id, "bound shape-change subscription");
            self.binding = Binding::Bound { shape: first.id, subscription };
        }
        Ok(())
    }

    /// Destroy the current binding, if any, and return to `Idle`.
    ///
    /// The state transitions to `Idle` before the host call, so a failed
    /// `unsubscribe` can never leave a stale binding tracked.
    ///
    /// # Errors
    ///
    /// Returns the host error from `unsubscribe`.
    pub async fn release(&mut self, host: &dyn DocumentHost) -> Result<(), HostError> {
        if let Binding::Bound { shape, subscription } = std::mem::take(&mut self.binding) {
            debug!(%shape, "releasing shape-change subscription");
            host.unsubscribe(subscription).await?;
        }
        Ok(())
    }
}

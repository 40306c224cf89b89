//! Host capability surface consumed by the plugin runtime.
//!
//! DESIGN
//! ======
//! The host document (shapes, selection, theme, media storage, undo history)
//! lives on the privileged side of the sandbox. This module specifies the
//! capabilities the runtime is allowed to call, as an async trait so the
//! embedder can back them with whatever bridge its sandbox provides.
//!
//! Event delivery is split from event interest: `subscribe` expresses
//! interest in a topic and returns an opaque [`Subscription`] handle that
//! must be passed back to `unsubscribe`. The events themselves arrive on the
//! [`HostEvent`] channel the embedder hands to the runtime. Handle-based
//! subscription keeps the shape-change rebinding explicit — there is never a
//! hidden callback registration to leak.

use async_trait::async_trait;
use uuid::Uuid;

use crate::protocol::ShapeId;

// =============================================================================
// TYPES
// =============================================================================

/// A shape as reported by the host document, with its properties already
/// resident. The plugin consumes this model; it never reimplements it.
#[derive(Debug, Clone, PartialEq)]
pub struct HostShape {
    pub id: ShapeId,
    pub name: String,
    /// Shape type as reported by the host ("rect", "path", ...).
    pub kind: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Opaque reference to an uploaded media asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MediaRef(Uuid);

impl MediaRef {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MediaRef {
    fn default() -> Self {
        Self::new()
    }
}

/// Opaque handle returned by [`DocumentHost::subscribe`] and required by
/// [`DocumentHost::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(Uuid);

impl Subscription {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for Subscription {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle delimiting a region of document mutations the host coalesces into
/// one undoable action. Move-only: `undo_block_finish` consumes it, so a
/// double release is a type error.
#[derive(Debug, PartialEq, Eq)]
pub struct UndoToken(Uuid);

impl UndoToken {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UndoToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Event topic a subscription expresses interest in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTopic {
    /// The selection set changed.
    SelectionChange,
    /// The host theme changed.
    ThemeChange,
    /// One specific shape mutated.
    ShapeChange(ShapeId),
}

/// Event delivered by the host on the runtime's event channel.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    SelectionChanged,
    ShapeChanged(ShapeId),
    ThemeChanged(String),
}

/// Raster format for shape export. Exports are always PNG; the enum keeps
/// the format explicit on the wire to the host bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Png,
}

impl ExportFormat {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Png => "png",
        }
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Failure reported by a host capability call.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("shape not found: {0}")]
    ShapeNotFound(ShapeId),
    #[error("unknown subscription handle")]
    UnknownSubscription,
    #[error("export rejected: {0}")]
    ExportRejected(String),
    #[error("media upload rejected: {0}")]
    UploadRejected(String),
    #[error("host call failed: {0}")]
    Call(String),
}

// =============================================================================
// CAPABILITIES
// =============================================================================

/// Capabilities the host sandbox grants the plugin runtime.
///
/// All calls may suspend: property reads can be backed by I/O and every call
/// crosses the sandbox bridge. Implementations must be safe to call from a
/// single cooperative event loop — the runtime never calls concurrently into
/// the same capability except during the export fan-out, where `export_shape`
/// jobs run in parallel.
#[async_trait]
pub trait DocumentHost: Send + Sync {
    /// Current selection in host-reported order, geometry resident.
    async fn selection(&self) -> Result<Vec<HostShape>, HostError>;

    /// Current theme name.
    async fn theme(&self) -> Result<String, HostError>;

    /// Express interest in an event topic. Events for the topic start
    /// arriving on the runtime's event channel until `unsubscribe`.
    async fn subscribe(&self, topic: EventTopic) -> Result<Subscription, HostError>;

    /// Withdraw a previously granted subscription.
    async fn unsubscribe(&self, subscription: Subscription) -> Result<(), HostError>;

    /// Export one shape to a raster format at the given scale factor.
    async fn export_shape(&self, id: ShapeId, format: ExportFormat, scale: u32) -> Result<Vec<u8>, HostError>;

    /// Upload raw bytes as a new media asset. `Ok(None)` means the host
    /// accepted the call but produced no usable reference.
    async fn upload_media(&self, name: &str, bytes: &[u8], mime: &str) -> Result<Option<MediaRef>, HostError>;

    /// Create a new rectangle shape with default state.
    async fn create_rectangle(&self) -> Result<ShapeId, HostError>;

    /// Move a shape to an absolute position.
    async fn set_position(&self, id: ShapeId, x: f64, y: f64) -> Result<(), HostError>;

    /// Resize a shape to exact dimensions.
    async fn resize(&self, id: ShapeId, width: f64, height: f64) -> Result<(), HostError>;

    /// Assign an uploaded image as the shape's sole fill.
    async fn set_image_fill(&self, id: ShapeId, media: MediaRef, opacity: f64) -> Result<(), HostError>;

    /// Replace the current selection.
    async fn set_selection(&self, ids: Vec<ShapeId>) -> Result<(), HostError>;

    /// Open an undo boundary. Mutations until the matching finish coalesce
    /// into one undoable action.
    async fn undo_block_begin(&self) -> Result<UndoToken, HostError>;

    /// Close an undo boundary. Consumes the token.
    async fn undo_block_finish(&self, token: UndoToken) -> Result<(), HostError>;
}

// =============================================================================
// TEST HELPERS
// =============================================================================

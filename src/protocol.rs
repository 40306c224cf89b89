//! Message types crossing the sandbox/panel boundary, plus the JSON codec.
//!
//! DESIGN
//! ======
//! The host sandbox and the panel UI run in isolated contexts and exchange
//! only serialized messages. Every message is a tagged record: the `type`
//! field selects the variant, matching the wire shapes the panel expects.
//! Empty selection is an explicit state (`selection: null`), never an
//! omitted field — the panel must be able to distinguish "nothing selected"
//! from "no update received".

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a document shape.
pub type ShapeId = Uuid;

// =============================================================================
// VALUE TYPES
// =============================================================================

/// An immutable, serializable copy of one shape's identity and geometry at a
/// single instant. Produced fresh on every selection or shape-change event
/// and superseded wholesale by the next snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeSnapshot {
    pub id: ShapeId,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Shape type as reported by the host document ("rect", "path", ...).
    #[serde(rename = "type")]
    pub kind: String,
}

/// One shape's rendered raster plus its source geometry.
///
/// The byte payload serializes as a JSON array of numbers — a transport-safe
/// ordered sequence the panel context can consume without shared memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportJobResult {
    #[serde(rename = "imageData")]
    pub image_data: Vec<u8>,
    pub width: f64,
    pub height: f64,
    pub x: f64,
    pub y: f64,
}

// =============================================================================
// MESSAGES
// =============================================================================

/// Host sandbox → panel UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HostMessage {
    /// The selection set changed or was re-requested. `None` means nothing
    /// is selected; it crosses the wire as `selection: null`.
    #[serde(rename = "selectionchange")]
    SelectionChange {
        #[serde(default)]
        selection: Option<Vec<ShapeSnapshot>>,
    },
    /// The host theme changed.
    #[serde(rename = "themechange")]
    ThemeChange { theme: String },
    /// Aggregated result of an export fan-out, in selection order.
    #[serde(rename = "export-result")]
    ExportResult { exports: Vec<ExportJobResult> },
}

/// Panel UI → host sandbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PanelMessage {
    /// The panel finished booting and wants an immediate selection resend.
    #[serde(rename = "ready")]
    Ready,
    /// Export every currently selected shape and send back `export-result`.
    #[serde(rename = "export-selection")]
    ExportSelection,
    /// Import externally captured image bytes as a new shape.
    #[serde(rename = "add-capture")]
    AddCapture {
        #[serde(rename = "imageData")]
        image_data: Vec<u8>,
    },
}

// =============================================================================
// CODEC
// =============================================================================

/// Error returned by [`decode_message`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The text could not be decoded as a known tagged message.
    #[error("failed to decode message: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Encode a message into JSON text for the sandbox boundary.
#[must_use]
pub fn encode_message<T: Serialize>(message: &T) -> String {
    // Serializing these tagged records cannot fail: no non-string map keys,
    // no fallible Serialize impls.
    serde_json::to_string(message).unwrap_or_default()
}

/// Decode JSON text from the sandbox boundary into a message.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] for malformed text or an unknown `type` tag.
pub fn decode_message<T: for<'de> Deserialize<'de>>(text: &str) -> Result<T, CodecError> {
    Ok(serde_json::from_str(text)?)
}

// =============================================================================
// TESTS
// =============================================================================

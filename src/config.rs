//! Panel launch parameters and fixed operation constants.
//!
//! The export scale and capture margin are caller-fixed configuration, not
//! user-settable. Timeouts guard against an unresponsive host bridge and can
//! be tuned through the environment.

use std::time::Duration;

use crate::api::ExportFormat;

/// Human-readable panel title shown by the host chrome.
pub const PANEL_TITLE: &str = "Selection Viewer";

/// Initial panel dimensions in pixels.
pub const PANEL_WIDTH: u32 = 800;
pub const PANEL_HEIGHT: u32 = 800;

/// Scale factor for selection exports.
pub const EXPORT_SCALE: u32 = 4;

/// Horizontal gap between the anchor selection and an imported capture.
pub const CAPTURE_MARGIN: f64 = 20.0;

/// Media-asset name tag for uploaded captures.
pub const CAPTURE_MEDIA_NAME: &str = "3d-capture";

/// MIME tag for uploaded capture bytes.
pub const CAPTURE_MIME: &str = "image/png";

pub const DEFAULT_EXPORT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_UPLOAD_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// RUNTIME SETTINGS
// =============================================================================

/// Fixed operating parameters for the plugin runtime.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuntimeSettings {
    pub export_format: ExportFormat,
    pub export_scale: u32,
    pub capture_margin: f64,
    /// Upper bound on one export job before the whole batch fails.
    pub export_timeout: Duration,
    /// Upper bound on the capture upload before the transaction aborts.
    pub upload_timeout: Duration,
}

impl RuntimeSettings {
    /// Settings with environment-tunable timeouts.
    ///
    /// Optional:
    /// - `PANELSYNC_EXPORT_TIMEOUT_SECS`: default 30
    /// - `PANELSYNC_UPLOAD_TIMEOUT_SECS`: default 30
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            export_timeout: Duration::from_secs(env_parse_u64(
                "PANELSYNC_EXPORT_TIMEOUT_SECS",
                DEFAULT_EXPORT_TIMEOUT_SECS,
            )),
            upload_timeout: Duration::from_secs(env_parse_u64(
                "PANELSYNC_UPLOAD_TIMEOUT_SECS",
                DEFAULT_UPLOAD_TIMEOUT_SECS,
            )),
            ..Self::default()
        }
    }
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            export_format: ExportFormat::Png,
            export_scale: EXPORT_SCALE,
            capture_margin: CAPTURE_MARGIN,
            export_timeout: Duration::from_secs(DEFAULT_EXPORT_TIMEOUT_SECS),
            upload_timeout: Duration::from_secs(DEFAULT_UPLOAD_TIMEOUT_SECS),
        }
    }
}

fn env_parse_u64(var: &str, default: u64) -> u64 {
    std::env::var(var)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

// =============================================================================
// PANEL OPTIONS
// =============================================================================

/// Launch parameters for the panel UI: title, initial size, and the theme
/// passed as a startup query parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelOptions {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub startup_theme: String,
}

impl PanelOptions {
    #[must_use]
    pub fn new(startup_theme: impl Into<String>) -> Self {
        Self {
            title: PANEL_TITLE.into(),
            width: PANEL_WIDTH,
            height: PANEL_HEIGHT,
            startup_theme: startup_theme.into(),
        }
    }

    /// Query string handed to the panel at launch.
    #[must_use]
    pub fn startup_query(&self) -> String {
        format!("?theme={}", self.startup_theme)
    }
}

//! Bidirectional synchronization layer between a sandboxed design-document
//! host and an isolated panel UI.
//!
//! ARCHITECTURE
//! ============
//! The host sandbox holds live access to the document (shapes, selection,
//! theme); the panel mirrors that state and issues mutation requests back.
//! Everything flows through serialized messages — never shared memory:
//!
//! - [`api`] — capabilities the host grants the runtime, as an async trait
//! - [`protocol`] — the tagged messages crossing the sandbox boundary
//! - [`runtime`] — the host-side event loop wiring events to services
//! - [`services`] — snapshot building, listener rebinding, export fan-out,
//!   and the capture-import transaction
//! - [`store`] — the panel-side mirror of selection metadata
//! - [`config`] — panel launch parameters and operation constants
//!
//! The embedder implements [`api::DocumentHost`], feeds host events into the
//! runtime's event channel, bridges panel messages both ways, and opens the
//! panel with [`config::PanelOptions`]. Process bootstrapping stays outside
//! this crate.

pub mod api;
pub mod config;
pub mod protocol;
pub mod runtime;
pub mod services;
pub mod store;

pub use api::{DocumentHost, HostError, HostEvent};
pub use config::{PanelOptions, RuntimeSettings};
pub use protocol::{HostMessage, PanelMessage, ShapeSnapshot};
pub use runtime::PluginRuntime;
pub use store::MirrorStore;

//! Host-side operations behind the panel protocol.
//!
//! ARCHITECTURE
//! ============
//! Service modules own the business logic so the runtime loop can stay
//! focused on event dispatch and outbound messaging. Each service catches
//! nothing itself — failures surface as typed errors and the runtime decides
//! what is logged and what reaches the panel.

pub mod capture;
pub mod export;
pub mod rebind;
pub mod snapshot;

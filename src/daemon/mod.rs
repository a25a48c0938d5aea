//! Daemon communication for the interactive shell.
//!
//! This module provides the wire protocol and process lifecycle for the
//! long-lived background helper that answers completion and environment
//! queries over its standard streams.
//!
//! ## Components
//!
//! - [`protocol`]: request variants, control markers, line-oriented framing
//! - [`manager`]: daemon spawn/respawn/teardown and the cached handle

pub mod manager;
pub mod protocol;

pub use manager::{DaemonCommand, DaemonHandle, DaemonManager};
pub use protocol::{ControlMarker, RequestKind};

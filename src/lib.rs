//! ushell - shell integration client for the completion daemon.
//!
//! An interactive shell session keeps one long-lived background helper
//! process (the daemon) that answers two kinds of queries over its standard
//! streams: tab-completion candidates for a partially typed command line,
//! and a snapshot of session environment variables for the current working
//! directory. This crate is the shell-side half of that arrangement: the
//! line-oriented wire protocol, the daemon's process lifecycle, and the two
//! clients the shell hooks invoke on tab-press and prompt redraw.

pub mod cli;
pub mod complete;
pub mod config;
pub mod daemon;
pub mod envsync;
pub mod error;
pub mod session;

pub use complete::CompletionClient;
pub use config::SessionConfig;
pub use envsync::EnvSyncClient;
pub use error::{Result, UshellError};
pub use session::Session;

//! Coding-time tracker CLI library.
//!
//! Wires the session engine to the REST ledger, the editor host protocol
//! and the workspace link file.

mod cli;
pub mod commands;
mod config;
pub mod host;
pub mod scheduler;
pub mod workspace_map;

pub use cli::{Cli, Commands, ProjectsAction};
pub use config::{Config, ConfigError};

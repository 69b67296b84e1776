//! CLI subcommand implementations.

pub mod link;
pub mod projects;
pub mod run;
pub mod status;
pub mod today;

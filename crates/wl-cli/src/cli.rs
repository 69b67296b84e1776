//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Editor coding-time tracker.
///
/// Turns editor activity signals into time entries on a remote
/// time-tracking service, attributed to the project linked to the workspace.
#[derive(Debug, Parser)]
#[command(name = "wl", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Track a workspace, reading host events as JSON lines from stdin.
    Run {
        /// Workspace URI reported by the editor.
        #[arg(long)]
        workspace: String,

        /// Start without editor focus.
        #[arg(long)]
        unfocused: bool,
    },

    /// Attribute a workspace to a remote project.
    Link {
        #[arg(long)]
        workspace: String,

        /// Remote project id.
        #[arg(long)]
        project: String,
    },

    /// Remove a workspace's project link.
    Unlink {
        #[arg(long)]
        workspace: String,
    },

    /// Show configuration and linked workspaces.
    Status,

    /// Show today's tracked time per project from the ledger.
    Today,

    /// Manage remote projects.
    #[command(subcommand)]
    Projects(ProjectsAction),
}

/// Actions for the projects subcommand.
#[derive(Debug, Subcommand)]
pub enum ProjectsAction {
    /// List the organization's projects.
    List,

    /// Create a project.
    Create {
        /// Name of the project.
        name: String,

        /// Link this workspace to the new project.
        #[arg(long)]
        link: Option<String>,
    },
}

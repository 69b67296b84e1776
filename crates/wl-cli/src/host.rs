//! Line-delimited JSON protocol between the editor host and `wl run`.
//!
//! The host writes one event per line on stdin; `wl run` answers with
//! status lines on stdout. Logs go to stderr so they never mix with status.

use std::io::Write;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use wl_core::{ProjectId, ProjectKey, StatusSink, StatusSummary};

/// Signals sent by the editor host.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostEvent {
    /// Any user interaction with the editor.
    Activity,
    Focus {
        focused: bool,
    },
    /// The open workspace changed.
    Workspace {
        uri: String,
    },
    /// Explicit "sync now" request.
    Sync,
    /// Fresh credentials, e.g. after the user re-authenticated.
    Credentials {
        token: String,
        #[serde(default)]
        member_id: Option<String>,
    },
    /// Seeds today's total before the first reconciliation.
    Initial {
        ms: i64,
        #[serde(default)]
        project: Option<String>,
    },
    Stop,
}

impl HostEvent {
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }

    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Activity => "activity",
            Self::Focus { .. } => "focus",
            Self::Workspace { .. } => "workspace",
            Self::Sync => "sync",
            Self::Credentials { .. } => "credentials",
            Self::Initial { .. } => "initial",
            Self::Stop => "stop",
        }
    }
}

// Credentials carry a token, so Debug only shows the variant.
impl std::fmt::Debug for HostEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostEvent")
            .field("type", &self.kind())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum HostMessage<'a> {
    Status {
        text: &'a str,
        project: Option<&'a str>,
        total_ms: i64,
        active: bool,
    },
}

/// Encodes a summary as one status line, without the trailing newline.
pub fn status_line(summary: &StatusSummary) -> String {
    let message = HostMessage::Status {
        text: &summary.text,
        project: summary.project.project_id().map(ProjectId::as_str),
        total_ms: summary.total_ms,
        active: summary.active,
    };
    serde_json::to_string(&message).unwrap_or_default()
}

/// Writes status lines to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl StatusSink for StdoutSink {
    fn publish(&self, summary: &StatusSummary) {
        let line = status_line(summary);
        let mut stdout = std::io::stdout().lock();
        if writeln!(stdout, "{line}").and_then(|()| stdout.flush()).is_err() {
            debug!("host stopped reading status lines");
        }
    }
}

/// Forwards parsed events from `input` until EOF or the receiver is gone.
///
/// Malformed lines are logged and skipped.
pub async fn forward_events<R>(input: R, events: mpsc::Sender<HostEvent>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(input).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                match HostEvent::parse(&line) {
                    Ok(event) => {
                        if events.send(event).await.is_err() {
                            return;
                        }
                    }
                    Err(err) => warn!(error = %err, "ignoring malformed host event"),
                }
            }
            Ok(None) => {
                debug!("host closed stdin");
                return;
            }
            Err(err) => {
                warn!(error = %err, "failed to read host events");
                return;
            }
        }
    }
}

/// Parses the optional project of an `initial` event.
pub fn initial_project(project: Option<&str>) -> Option<ProjectKey> {
    project.map(|id| ProjectId::new(id).map_or(ProjectKey::Unassigned, ProjectKey::Project))
}

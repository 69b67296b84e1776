//! `wl run`: tracks one editor session fed by host events on stdin.

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::error;

use wl_core::{Ledger, Tracker};

use crate::Config;
use crate::host::{StdoutSink, forward_events};
use crate::scheduler::{OfflineLedger, Reauthenticate, Scheduler, SchedulerOptions};
use crate::workspace_map::MappedResolver;

/// Host events buffered between the stdin reader and the scheduler.
const EVENT_BUFFER: usize = 256;

pub async fn run(config: &Config, workspace: &str, focused: bool) -> Result<()> {
    let policy = config
        .validated_policy()
        .context("refusing to start tracking")?;
    let resolver = MappedResolver::new(config.mapping_path.clone(), workspace);

    match config.ledger_client() {
        Ok(client) => {
            let tracker = Tracker::new(
                client,
                Box::new(resolver.clone()),
                Box::new(StdoutSink),
                policy,
                Utc::now(),
                focused,
            )
            .with_template(config.entry_template())
            .with_member(config.member_id());
            drive(tracker, resolver, config, true).await;
        }
        Err(err) => {
            error!(error = %err, "remote sync disabled, tracking locally only");
            let tracker = Tracker::new(
                OfflineLedger,
                Box::new(resolver.clone()),
                Box::new(StdoutSink),
                policy,
                Utc::now(),
                focused,
            );
            drive(tracker, resolver, config, false).await;
        }
    }
    Ok(())
}

async fn drive<L>(tracker: Tracker<L>, resolver: MappedResolver, config: &Config, sync_enabled: bool)
where
    L: Ledger + Reauthenticate + 'static,
{
    let options = SchedulerOptions {
        sync_enabled,
        shutdown_timeout: config.shutdown_timeout(),
    };
    let (sender, events) = mpsc::channel(EVENT_BUFFER);
    let reader = tokio::spawn(forward_events(tokio::io::stdin(), sender));

    let mut scheduler = Scheduler::new(tracker, resolver, options);
    scheduler.run(events).await;
    reader.abort();
}

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use wl_cli::commands::{link, projects, run, status, today};
use wl_cli::{Cli, Commands, Config, ProjectsAction};

/// How long to wait for stray blocking tasks, such as a pending stdin read.
const RUNTIME_SHUTDOWN: Duration = Duration::from_millis(100);

fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");
    Ok(config)
}

/// Runs `future` on a single-threaded runtime.
fn block_on<F: Future<Output = Result<()>>>(future: F) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let result = runtime.block_on(future);
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN);
    result
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support; stdout is reserved for status lines
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let mut stdout = std::io::stdout();
    match &cli.command {
        Some(Commands::Run {
            workspace,
            unfocused,
        }) => {
            let config = load_config(cli.config.as_deref())?;
            block_on(run::run(&config, workspace, !*unfocused))?;
        }
        Some(Commands::Link { workspace, project }) => {
            let config = load_config(cli.config.as_deref())?;
            link::link(&mut stdout, &config, workspace, project)?;
        }
        Some(Commands::Unlink { workspace }) => {
            let config = load_config(cli.config.as_deref())?;
            link::unlink(&mut stdout, &config, workspace)?;
        }
        Some(Commands::Status) => {
            let config = load_config(cli.config.as_deref())?;
            status::run(&mut stdout, &config)?;
        }
        Some(Commands::Today) => {
            let config = load_config(cli.config.as_deref())?;
            block_on(today::run(&mut stdout, &config))?;
        }
        Some(Commands::Projects(action)) => {
            let config = load_config(cli.config.as_deref())?;
            match action {
                ProjectsAction::List => block_on(projects::list(&mut stdout, &config))?,
                ProjectsAction::Create {
                    name,
                    link: workspace,
                } => block_on(projects::create(
                    &mut stdout,
                    &config,
                    name,
                    workspace.as_deref(),
                ))?,
            }
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}

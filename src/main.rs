//! taskdeck
//!
//! Task management REST server with checklist progress tracking,
//! role-based access, dashboards and spreadsheet reports.

use anyhow::Result;
use clap::Parser;
use std::fs::OpenOptions;
use taskdeck::api::{self, AppState};
use taskdeck::auth::Credentials;
use taskdeck::cli::export::ExportArgs;
use taskdeck::cli::{Cli, Command};
use taskdeck::config::Config;
use taskdeck::db::Database;
use taskdeck::export::build_report;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Initialize logging based on the `--log` option. `RUST_LOG` wins over `--verbose`.
fn init_logging(target: &str, verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match target {
        "0" | "off" => {
            // No logging
        }
        "1" | "stdout" => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter())
                .with_writer(std::io::stdout)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        "2" | "stderr" => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter())
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        filename => {
            // Log to file (append mode)
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(filename)?;
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter())
                .with_writer(file)
                .with_ansi(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log, cli.verbose)?;

    let mut config = Config::discover(cli.config.as_deref())?;

    // Override from CLI arguments
    if let Some(db_path) = &cli.database {
        config.server.db_path = db_path.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(dir) = &cli.uploads_dir {
        config.server.uploads_dir = dir.clone();
    }

    match cli.command {
        Some(Command::Export(args)) => run_export(&config, args),
        Some(Command::Serve) | None => run_server(config).await,
    }
}

async fn run_server(config: Config) -> Result<()> {
    config.validate()?;
    config.ensure_dirs()?;

    let db = Database::open(&config.server.db_path)?;
    let credentials = Credentials::new(&config.auth)?;
    info!("Database: {}", config.server.db_path.display());
    info!("Uploads: {}", config.server.uploads_dir.display());
    if config.policy.admin_only_task_updates {
        info!("Task edits restricted to admins");
    }

    let handle = api::start_server(AppState::new(db, credentials, config)).await?;

    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");
    handle.shutdown().await;

    Ok(())
}

fn run_export(config: &Config, args: ExportArgs) -> Result<()> {
    let db = Database::open(&config.server.db_path)?;
    let bytes = build_report(&db, args.report)?;

    let path = args.output_path();
    std::fs::write(&path, &bytes)?;
    eprintln!("Exported {} bytes to {}", bytes.len(), path.display());

    Ok(())
}

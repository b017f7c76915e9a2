//! Backups of AWS RDS SQL Server databases
//!
//! Starts native backups to S3, waits for them, downloads them and restores
//! them into a SQL Server container or a local SQL Server.

// rds-backup/src/main.rs
mod backup;
mod cli;
mod client;
mod config;
mod download;
mod errors;
mod restore;
mod status;

use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};

use cli::{App, SubCommands};
use client::command::{CommandExecutor, SystemCommand};
use config::FileConfig;

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let app = App::parse();
    init_logging(app.global_opts.verbose);

    match run_app(app).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    // Only fails when a logger is already installed.
    let _ = TermLogger::init(level, Config::default(), TerminalMode::Mixed, ColorChoice::Auto);
}

/// `DOCKER_CONTENT_TRUST=1` makes `docker run` verify image signatures,
/// which the SQL Server image does not carry.
fn content_trust_enabled() -> bool {
    env::var("DOCKER_CONTENT_TRUST").is_ok_and(|value| value == "1")
}

async fn run_app(app: App) -> Result<()> {
    if let SubCommands::Version = app.command {
        println!("rds-backup version ({})", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let file = FileConfig::load(app.global_opts.config.as_deref())
        .context("Failed to load option defaults")?;
    let executor: Arc<dyn CommandExecutor> = Arc::new(SystemCommand);

    match app.command {
        SubCommands::Create(args) => {
            let create = config::create_config(&args, &file, content_trust_enabled())
                .context("Invalid options for create")?;
            backup::run_create_flow(&create, executor)
                .await
                .context("Backup process failed")?;
        }
        SubCommands::Download(args) => {
            let download = config::download_config(&args, &file, content_trust_enabled())
                .context("Invalid options for download")?;
            download::run_download_flow(&download, executor)
                .await
                .context("Download process failed")?;
        }
        SubCommands::Restore(args) => {
            let restore = config::restore_config(&args, &file, content_trust_enabled())
                .context("Invalid options for restore")?;
            restore::run_restore_flow(&restore, executor)
                .await
                .context("Restore process failed")?;
        }
        SubCommands::Status(args) => {
            let status = config::status_config(&args, &file, content_trust_enabled())
                .context("Invalid options for status")?;
            status::run_status_flow(&status, executor)
                .await
                .context("Status check failed")?;
        }
        SubCommands::Version => {}
    }
    Ok(())
}

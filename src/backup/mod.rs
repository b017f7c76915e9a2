// rds-backup/src/backup/mod.rs
pub mod poller;

use std::sync::Arc;

use log::info;

use crate::client::aws::AwsCli;
use crate::client::command::CommandExecutor;
use crate::client::{SqlClient, get_client};
use crate::config::CreateConfig;
use crate::download::ensure_aws_ready;
use crate::errors::{AppError, Result};
use crate::restore::restore_backup;
use poller::{BackupOutcome, BackupPoller};

/// Public entry point for the create command.
pub async fn run_create_flow(config: &CreateConfig, executor: Arc<dyn CommandExecutor>) -> Result<()> {
    let aws = AwsCli::new(executor.clone());
    if config.needs_download() {
        ensure_aws_ready(&aws).await?;
    }

    let client = get_client(executor.clone(), config.content_trust_enabled)
        .await
        .ok_or(AppError::EnvironmentUnavailable)?;

    create_backup(client.as_ref(), &aws, executor, config).await
}

/// Starts a native backup to S3 and, as requested, waits for it, downloads
/// it and restores it.
///
/// Nothing started on RDS is rolled back when a later step fails.
pub async fn create_backup(
    client: &dyn SqlClient,
    aws: &AwsCli,
    executor: Arc<dyn CommandExecutor>,
    config: &CreateConfig,
) -> Result<()> {
    let backup = &config.backup;
    let connection = &backup.connection;

    // Read before the backup starts, while the source database is known to be reachable.
    let logical_names = match config.restore {
        Some(_) => Some(client.get_logical_names(connection).await?),
        None => None,
    };

    let task = client.start_backup(backup).await?;
    if task.is_empty() {
        return Err(AppError::RemoteTask("Unable to create a backup task".to_string()));
    }
    info!("Backup task [{}] started...", task);

    if config.needs_completion() {
        let poller = BackupPoller::new(config.poll_interval).with_timeout(config.timeout);
        match poller.wait_for_completion(client, connection, &task).await? {
            BackupOutcome::Succeeded => info!(
                "Backup completed (on AWS S3 at s3://{}/{}).",
                backup.bucket, backup.object_name
            ),
            BackupOutcome::Failed(message) => return Err(AppError::RemoteTask(message)),
        }
    }

    if !config.needs_download() {
        return Ok(());
    }

    let backup_path = aws
        .download_backup(
            &backup.bucket,
            &backup.object_name,
            config.download_directory.as_deref(),
        )
        .await?;

    if let Some(options) = &config.restore {
        let mut options = options.clone();
        if let Some(names) = logical_names {
            options.logical_names = names;
        }
        restore_backup(
            executor,
            &options.target(backup_path),
            config.content_trust_enabled,
        )
        .await?;
    }
    Ok(())
}

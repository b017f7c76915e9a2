// rds-backup/src/download/mod.rs
use std::sync::Arc;

use crate::client::aws::AwsCli;
use crate::client::command::CommandExecutor;
use crate::config::DownloadConfig;
use crate::errors::{AppError, Result};
use crate::restore::restore_backup;

/// Fails unless the AWS CLI is installed and has credentials.
pub async fn ensure_aws_ready(aws: &AwsCli) -> Result<()> {
    if !aws.is_installed().await {
        return Err(AppError::InvalidInput("AWS CLI is required".to_string()));
    }
    if !aws.are_credentials_configured().await {
        return Err(AppError::InvalidInput(
            "AWS CLI credentials are not configured yet. Please try 'aws configure'".to_string(),
        ));
    }
    Ok(())
}

/// Public entry point for the download command.
pub async fn run_download_flow(config: &DownloadConfig, executor: Arc<dyn CommandExecutor>) -> Result<()> {
    let aws = AwsCli::new(executor.clone());
    ensure_aws_ready(&aws).await?;

    let backup_path = aws
        .download_backup(&config.bucket, &config.filename, config.download_directory.as_deref())
        .await?;

    if let Some(options) = &config.restore {
        restore_backup(
            executor,
            &options.target(backup_path),
            config.content_trust_enabled,
        )
        .await?;
    }
    Ok(())
}

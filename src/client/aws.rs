// rds-backup/src/client/aws.rs
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::info;

use super::command::CommandExecutor;
use super::resolve_backup_path;
use crate::errors::Result;

pub const AWS: &str = "aws";

/// Thin wrapper over the AWS CLI for fetching backups from S3.
pub struct AwsCli {
    executor: Arc<dyn CommandExecutor>,
}

impl AwsCli {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self { executor }
    }

    async fn aws(&self, args: &[&str]) -> Result<String> {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        self.executor.execute(AWS, &args).await
    }

    pub async fn is_installed(&self) -> bool {
        self.aws(&["help"]).await.is_ok()
    }

    pub async fn are_credentials_configured(&self) -> bool {
        self.aws(&["s3", "ls"]).await.is_ok()
    }

    /// Copies `s3://bucket/filename` into `directory` (the working directory
    /// when `None`) and returns where the file landed.
    pub async fn download_backup(
        &self,
        bucket: &str,
        filename: &str,
        directory: Option<&Path>,
    ) -> Result<PathBuf> {
        let source = format!("s3://{}/{}", bucket, filename);
        let destination = resolve_backup_path(directory, filename)?;

        info!("Download of backup from AWS S3 ({}) started...", source);
        let target = destination.to_string_lossy().into_owned();
        self.aws(&["s3", "cp", source.as_str(), target.as_str()])
            .await?;
        info!(
            "Download of the backup has been completed ({})",
            destination.display()
        );
        Ok(destination)
    }
}

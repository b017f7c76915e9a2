// rds-backup/src/client/native.rs
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info, warn};

use super::command::CommandExecutor;
use super::statements::{self, TaskField};
use super::{
    BackupRequest, ClientKind, DatabaseConnection, LogicalNames,
    RestoreRequest, SqlClient, TaskHandle, get_sql_output, parse_task_id,
};
use crate::errors::{AppError, Result};

pub const SQLCMD: &str = "sqlcmd";

/// Installation directory of a default SQL Server 2016 instance.
pub const DEFAULT_SERVER_INSTALLATION_PATH: &str =
    r"C:\Program Files\Microsoft SQL Server\MSSQL13.MSSQLSERVER\MSSQL";

/// `sqlcmd` installed on this machine.
pub struct NativeClient {
    executor: Arc<dyn CommandExecutor>,
    supported_host: bool,
}

impl NativeClient {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            executor,
            // The Linux sqlcmd package cannot reach RDS the way this tool needs.
            supported_host: !cfg!(target_os = "linux"),
        }
    }

    async fn query(&self, connection: &DatabaseConnection, statement: &str) -> Result<String> {
        self.executor
            .execute(SQLCMD, &statements::sqlcmd_args(connection, statement))
            .await
    }

    async fn task_field(
        &self,
        connection: &DatabaseConnection,
        field: TaskField,
        task: Option<&TaskHandle>,
    ) -> Result<String> {
        let statement = statements::task_status_statement(&connection.database, field, task);
        let output = self.query(connection, &statement).await?;
        get_sql_output(&output)
    }

    /// Copies the backup into the server's `Backup` directory, restores it and
    /// removes the copy again whatever the outcome of the restore.
    pub async fn restore(&self, target: &NativeRestore) -> Result<()> {
        let request = &target.request;
        if !tokio::fs::try_exists(&request.backup_path).await? {
            return Err(AppError::BackupNotFound(request.backup_path.clone()));
        }
        if let Some(custom) = &target.custom_data_path {
            if !tokio::fs::try_exists(custom).await? {
                return Err(AppError::InvalidInput(format!(
                    "the specified restore-data-directory ({}) does not exist",
                    custom.display()
                )));
            }
        }

        info!("Starting to restore onto local SQL Server...");

        let staged = StagedBackup::copy(&request.backup_path, &target.staging_path()?).await?;
        info!(
            "Copied from {} to {} to prepare restoration.",
            request.backup_path.display(),
            staged.path().display()
        );

        let (data_path, log_path) = target.target_paths();
        let database = target.restored_database();
        let statement = statements::restore_statement(
            database,
            &staged.path().to_string_lossy(),
            &request.logical_names.data,
            &data_path.to_string_lossy(),
            &request.logical_names.log,
            &log_path.to_string_lossy(),
        );

        info!("Restoring...");
        self.executor
            .execute(SQLCMD, &["-Q".to_string(), statement])
            .await?;
        info!("Restore has been completed (as database '{}').", database);
        Ok(())
    }
}

#[async_trait]
impl SqlClient for NativeClient {
    fn kind(&self) -> ClientKind {
        ClientKind::Native
    }

    async fn is_environment_satisfied(&mut self) -> bool {
        if !self.supported_host {
            return false;
        }
        match self.executor.execute(SQLCMD, &["-?".to_string()]).await {
            Ok(_) => true,
            Err(e) => {
                debug!("sqlcmd is not available: {}", e);
                false
            }
        }
    }

    async fn get_status(
        &self,
        connection: &DatabaseConnection,
        task: Option<&TaskHandle>,
    ) -> Result<String> {
        self.task_field(connection, TaskField::Lifecycle, task).await
    }

    async fn get_completion_percentage(
        &self,
        connection: &DatabaseConnection,
        task: Option<&TaskHandle>,
    ) -> Result<String> {
        self.task_field(connection, TaskField::Complete, task).await
    }

    async fn get_task_message(
        &self,
        connection: &DatabaseConnection,
        task: Option<&TaskHandle>,
    ) -> Result<String> {
        self.task_field(connection, TaskField::TaskInfo, task).await
    }

    async fn start_backup(&self, request: &BackupRequest) -> Result<TaskHandle> {
        let output = self
            .query(&request.connection, &statements::backup_statement(request))
            .await?;
        parse_task_id(&output)
    }

    async fn get_logical_names(&self, connection: &DatabaseConnection) -> Result<LogicalNames> {
        let data = get_sql_output(
            &self
                .query(connection, statements::DATA_LOGICAL_NAME_QUERY)
                .await?,
        )?;
        let log = get_sql_output(
            &self
                .query(connection, statements::LOG_LOGICAL_NAME_QUERY)
                .await?,
        )?;
        Ok(LogicalNames { data, log })
    }
}

/// Restore onto a SQL Server installed on this machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeRestore {
    pub request: RestoreRequest,
    pub server_path: PathBuf,
    /// Restore under this name instead of the original database name.
    pub rename: Option<String>,
    /// Put both MDF and LDF here instead of the server's `DATA` and `LOG`.
    pub custom_data_path: Option<PathBuf>,
}

impl NativeRestore {
    pub fn restored_database(&self) -> &str {
        self.rename
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.request.database)
    }

    pub fn staging_path(&self) -> Result<PathBuf> {
        Ok(self
            .server_path
            .join("Backup")
            .join(self.request.backup_filename()?))
    }

    /// Physical MDF and LDF paths the restored files are moved to.
    pub fn target_paths(&self) -> (PathBuf, PathBuf) {
        let (data_dir, log_dir) = match &self.custom_data_path {
            Some(custom) => (custom.clone(), custom.clone()),
            None => (self.server_path.join("DATA"), self.server_path.join("LOG")),
        };
        let database = self.restored_database();
        (
            data_dir.join(format!("{}.mdf", database)),
            log_dir.join(format!("{}.ldf", database)),
        )
    }
}

/// Copy of a backup inside the server's backup directory, deleted on drop.
struct StagedBackup {
    path: PathBuf,
}

impl StagedBackup {
    async fn copy(source: &Path, destination: &Path) -> Result<Self> {
        tokio::fs::copy(source, destination).await?;
        Ok(Self {
            path: destination.to_path_buf(),
        })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagedBackup {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => info!("Removed file {}. Clean up done.", self.path.display()),
            Err(e) => warn!("Failed to remove {}: {}", self.path.display(), e),
        }
    }
}

// rds-backup/src/client/mod.rs
pub mod aws;
pub mod command;
pub mod docker;
pub mod native;
pub(crate) mod statements;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info};

use crate::errors::{AppError, Result};
use command::CommandExecutor;
use docker::DockerClient;
use native::NativeClient;

/// Default port of SQL Server.
pub const DEFAULT_SERVER_PORT: u16 = 1433;

pub const SUCCESS_STATUS: &str = "SUCCESS";
pub const ERROR_STATUS: &str = "ERROR";

/// Where and how to reach the RDS instance.
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseConnection {
    pub server: String,
    pub username: String,
    pub password: String,
    pub database: String,
}

impl DatabaseConnection {
    pub fn new(
        server: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            server: server.into(),
            username: username.into(),
            password: password.into(),
            database: database.into(),
        }
    }
}

impl fmt::Debug for DatabaseConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConnection")
            .field("server", &self.server)
            .field("username", &self.username)
            .field("password", &"********")
            .field("database", &self.database)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupRequest {
    pub connection: DatabaseConnection,
    pub bucket: String,
    pub object_name: String,
}

/// Identifier RDS hands back for a started backup task.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskHandle(String);

impl TaskHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for TaskHandle {
    fn from(value: &str) -> Self {
        TaskHandle(value.to_string())
    }
}

impl From<String> for TaskHandle {
    fn from(value: String) -> Self {
        TaskHandle(value)
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of a backup task as reported by `rds_task_status`.
///
/// Only `SUCCESS` and `ERROR` are terminal; anything else, including an empty
/// string, means the task is still going.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    InProgress(String),
    Success,
    Error,
}

impl TaskStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            SUCCESS_STATUS => TaskStatus::Success,
            ERROR_STATUS => TaskStatus::Error,
            other => TaskStatus::InProgress(other.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::InProgress(_))
    }
}

/// Logical file names of a database's data (MDF) and log (LDF) files.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LogicalNames {
    pub data: String,
    pub log: String,
}

/// Fields shared by both restore shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreRequest {
    /// Downloaded `.bak` file on this machine.
    pub backup_path: PathBuf,
    pub database: String,
    pub logical_names: LogicalNames,
}

impl RestoreRequest {
    pub fn backup_filename(&self) -> Result<String> {
        self.backup_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| AppError::BackupNotFound(self.backup_path.clone()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreTarget {
    Container(docker::ContainerRestore),
    Native(native::NativeRestore),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientKind {
    Native,
    Docker,
}

impl fmt::Display for ClientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientKind::Native => f.write_str("native sqlcmd"),
            ClientKind::Docker => f.write_str("sqlcmd in Docker"),
        }
    }
}

/// A way of reaching `sqlcmd`, either installed locally or inside a container.
#[async_trait]
pub trait SqlClient: Send + Sync {
    fn kind(&self) -> ClientKind;

    /// Go/no-go check for this host. Never fails, only answers.
    async fn is_environment_satisfied(&mut self) -> bool;

    async fn get_status(
        &self,
        connection: &DatabaseConnection,
        task: Option<&TaskHandle>,
    ) -> Result<String>;

    async fn get_completion_percentage(
        &self,
        connection: &DatabaseConnection,
        task: Option<&TaskHandle>,
    ) -> Result<String>;

    async fn get_task_message(
        &self,
        connection: &DatabaseConnection,
        task: Option<&TaskHandle>,
    ) -> Result<String>;

    async fn start_backup(&self, request: &BackupRequest) -> Result<TaskHandle>;

    async fn get_logical_names(&self, connection: &DatabaseConnection) -> Result<LogicalNames>;
}

/// Line of `sqlcmd` output holding the value of a single-column query.
///
/// With `SET NOCOUNT ON` the tool prints the column header and a dashed
/// underline before the value, so the answer always sits on the third line.
pub const QUERY_VALUE_LINE: usize = 2;

/// Line holding the task id after `rds_backup_database`, which prints one
/// extra line ahead of the header.
pub const BACKUP_TASK_ID_LINE: usize = 3;

/// Returns the trimmed line at `index`, or the raw output as a
/// [`AppError::MalformedOutput`] when the tool printed fewer lines.
pub fn extract_line(raw_output: &str, index: usize) -> Result<String> {
    raw_output
        .split('\n')
        .nth(index)
        .map(|line| line.trim().to_string())
        .ok_or_else(|| AppError::MalformedOutput(raw_output.to_string()))
}

pub fn get_sql_output(raw_output: &str) -> Result<String> {
    extract_line(raw_output, QUERY_VALUE_LINE)
}

/// Task id printed by `rds_backup_database`.
///
/// An empty line yields an empty handle. Anything other than digits is a
/// `sqlcmd` message in place of the id and yields [`AppError::MalformedOutput`].
pub fn parse_task_id(raw_output: &str) -> Result<TaskHandle> {
    let id = extract_line(raw_output, BACKUP_TASK_ID_LINE)?;
    if !id.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::MalformedOutput(raw_output.to_string()));
    }
    Ok(TaskHandle::from(id))
}

/// Absolute location of a downloaded backup: `directory/filename`, with a
/// relative or missing directory taken from the working directory.
pub fn resolve_backup_path(directory: Option<&Path>, filename: &str) -> Result<PathBuf> {
    let base = match directory {
        Some(dir) if dir.is_absolute() => dir.to_path_buf(),
        Some(dir) => std::env::current_dir()?.join(dir),
        None => std::env::current_dir()?,
    };
    Ok(base.join(filename))
}

/// Returns the first candidate whose environment check passes.
///
/// Candidates after the chosen one are never checked.
pub async fn select_client(candidates: Vec<Box<dyn SqlClient>>) -> Option<Box<dyn SqlClient>> {
    for mut candidate in candidates {
        if candidate.is_environment_satisfied().await {
            info!("Using {}", candidate.kind());
            return Some(candidate);
        }
        debug!("{} is not usable on this machine", candidate.kind());
    }
    None
}

/// Picks native `sqlcmd` when it runs here, otherwise `sqlcmd` in Docker.
pub async fn get_client(
    executor: Arc<dyn CommandExecutor>,
    content_trust_enabled: bool,
) -> Option<Box<dyn SqlClient>> {
    let candidates: Vec<Box<dyn SqlClient>> = vec![
        Box::new(NativeClient::new(executor.clone())),
        Box::new(DockerClient::new(executor).with_content_trust(content_trust_enabled)),
    ];
    select_client(candidates).await
}

// rds-backup/src/status/mod.rs
use std::sync::Arc;

use crate::client::command::CommandExecutor;
use crate::client::{DatabaseConnection, SqlClient, TaskStatus, get_client};
use crate::config::StatusConfig;
use crate::errors::{AppError, Result};

/// Describes the most recent backup task of the database.
///
/// A failed task is described by its own message, a running one by its
/// lifecycle and completion percentage.
pub async fn report_status(client: &dyn SqlClient, connection: &DatabaseConnection) -> Result<String> {
    let status = client.get_status(connection, None).await?;
    match TaskStatus::parse(&status) {
        TaskStatus::Error => client.get_task_message(connection, None).await,
        TaskStatus::InProgress(lifecycle) if !lifecycle.is_empty() => {
            let percentage = client.get_completion_percentage(connection, None).await?;
            Ok(format!("{} ({}%)", lifecycle, percentage))
        }
        _ => Ok(status),
    }
}

/// Public entry point for the status command.
pub async fn run_status_flow(config: &StatusConfig, executor: Arc<dyn CommandExecutor>) -> Result<()> {
    let client = get_client(executor, config.content_trust_enabled)
        .await
        .ok_or(AppError::EnvironmentUnavailable)?;
    println!("{}", report_status(client.as_ref(), &config.connection).await?);
    Ok(())
}

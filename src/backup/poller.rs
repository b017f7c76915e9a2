// rds-backup/src/backup/poller.rs
use std::io::Write;
use std::time::Duration;

use log::{debug, error, info};
use tokio::time::Instant;

use crate::client::{DatabaseConnection, SqlClient, TaskHandle, TaskStatus};
use crate::errors::{AppError, Result};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// How a backup task ended, as far as RDS is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupOutcome {
    Succeeded,
    /// The task reported `ERROR`; carries the task's own message.
    Failed(String),
}

/// Polls `rds_task_status` until a backup task reaches a terminal state.
#[derive(Debug, Clone, Copy)]
pub struct BackupPoller {
    interval: Duration,
    timeout: Option<Duration>,
}

impl Default for BackupPoller {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl BackupPoller {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            timeout: None,
        }
    }

    /// Gives up with [`AppError::Timeout`] once `timeout` has passed.
    /// Without one the poller waits for as long as the task takes.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Blocks until the task reports `SUCCESS` or `ERROR`.
    ///
    /// A failing status or message query stops polling immediately and is
    /// returned as-is; nothing is retried.
    pub async fn wait_for_completion(
        &self,
        client: &dyn SqlClient,
        connection: &DatabaseConnection,
        task: &TaskHandle,
    ) -> Result<BackupOutcome> {
        let started = Instant::now();
        info!("Waiting for backup task [{}] to complete...", task);
        loop {
            let status = client.get_status(connection, Some(task)).await?;
            debug!("Backup task [{}] status: {:?}", task, status);

            match TaskStatus::parse(&status) {
                TaskStatus::Success => {
                    println!();
                    return Ok(BackupOutcome::Succeeded);
                }
                TaskStatus::Error => {
                    println!();
                    let message = client.get_task_message(connection, Some(task)).await?;
                    error!("{}", message);
                    return Ok(BackupOutcome::Failed(message));
                }
                TaskStatus::InProgress(_) => {}
            }

            if let Some(timeout) = self.timeout {
                if started.elapsed() + self.interval > timeout {
                    println!();
                    return Err(AppError::Timeout(timeout));
                }
            }

            // Progress dots go straight to stdout so they stay on one line;
            // the logger would put each one on its own line.
            let _ = write_progress_dot(&mut std::io::stdout());
            tokio::time::sleep(self.interval).await;
        }
    }
}

fn write_progress_dot<W: Write>(out: &mut W) -> std::io::Result<()> {
    write!(out, ".")?;
    out.flush()
}

// rds-backup/src/restore/mod.rs
use std::path::PathBuf;
use std::sync::Arc;

use crate::client::command::CommandExecutor;
use crate::client::docker::{ContainerRestore, DockerClient};
use crate::client::native::{NativeClient, NativeRestore};
use crate::client::{LogicalNames, RestoreRequest, RestoreTarget, resolve_backup_path};
use crate::config::RestoreConfig;
use crate::errors::Result;

/// Where a backup is restored to, before the backup file itself is known.
#[derive(Clone, PartialEq, Eq)]
pub enum RestoreMode {
    Container {
        container_name: String,
        port: u16,
        password: String,
    },
    Native {
        server_path: PathBuf,
        rename: Option<String>,
        custom_data_path: Option<PathBuf>,
    },
}

impl std::fmt::Debug for RestoreMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RestoreMode::Container {
                container_name,
                port,
                ..
            } => f
                .debug_struct("Container")
                .field("container_name", container_name)
                .field("port", port)
                .finish_non_exhaustive(),
            RestoreMode::Native {
                server_path,
                rename,
                custom_data_path,
            } => f
                .debug_struct("Native")
                .field("server_path", server_path)
                .field("rename", rename)
                .field("custom_data_path", custom_data_path)
                .finish(),
        }
    }
}

impl RestoreMode {
    pub fn target(&self, request: RestoreRequest) -> RestoreTarget {
        match self {
            RestoreMode::Container {
                container_name,
                port,
                password,
            } => RestoreTarget::Container(ContainerRestore {
                request,
                container_name: container_name.clone(),
                port: *port,
                password: password.clone(),
            }),
            RestoreMode::Native {
                server_path,
                rename,
                custom_data_path,
            } => RestoreTarget::Native(NativeRestore {
                request,
                server_path: server_path.clone(),
                rename: rename.clone(),
                custom_data_path: custom_data_path.clone(),
            }),
        }
    }
}

/// Restore settings supplied on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreOptions {
    pub database: String,
    pub logical_names: LogicalNames,
    pub mode: RestoreMode,
}

impl RestoreOptions {
    pub fn target(&self, backup_path: PathBuf) -> RestoreTarget {
        self.mode.target(RestoreRequest {
            backup_path,
            database: self.database.clone(),
            logical_names: self.logical_names.clone(),
        })
    }
}

/// Restores onto a new container or the local server, as `target` says.
pub async fn restore_backup(
    executor: Arc<dyn CommandExecutor>,
    target: &RestoreTarget,
    content_trust_enabled: bool,
) -> Result<()> {
    match target {
        RestoreTarget::Container(container) => {
            DockerClient::new(executor)
                .with_content_trust(content_trust_enabled)
                .restore(container)
                .await
        }
        RestoreTarget::Native(native) => NativeClient::new(executor).restore(native).await,
    }
}

/// Public entry point for the restore command.
pub async fn run_restore_flow(config: &RestoreConfig, executor: Arc<dyn CommandExecutor>) -> Result<()> {
    let backup_path = resolve_backup_path(config.download_directory.as_deref(), &config.filename)?;
    restore_backup(
        executor,
        &config.options.target(backup_path),
        config.content_trust_enabled,
    )
    .await
}

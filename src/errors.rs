use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unable to find a sqlcmd client")]
    EnvironmentUnavailable,

    #[error("Failed to start {program}: {detail}")]
    CommandSpawn { program: String, detail: String },

    #[error("{program} exited with {}: {stderr}", exit_code_label(.code))]
    CommandFailed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Please disable Docker Content Trust (export DOCKER_CONTENT_TRUST=0)")]
    ContentTrustEnabled,

    // Display is the raw tool output so the caller sees exactly what came back.
    #[error("{0}")]
    MalformedOutput(String),

    #[error("{0}")]
    RemoteTask(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("Backup file {} does not exist", .0.display())]
    BackupNotFound(PathBuf),

    #[error("Backup task did not finish within {0:?}")]
    Timeout(Duration),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
}

fn exit_code_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit status {}", code),
        None => "no exit status".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

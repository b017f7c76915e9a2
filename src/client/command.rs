// rds-backup/src/client/command.rs
use async_trait::async_trait;
use log::debug;
#[cfg(test)]
use mockall::automock;
use tokio::process::Command;
use which::which;

use crate::errors::{AppError, Result};

/// Runs an external program and hands back what it printed to stdout.
///
/// This is the only place the tool touches real processes. Every client takes
/// one by injection so tests can assert on the exact invocation instead of
/// running `sqlcmd`, `docker` or `aws`.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, program: &str, args: &[String]) -> Result<String>;
}

/// Executes commands on the local machine.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommand;

#[async_trait]
impl CommandExecutor for SystemCommand {
    async fn execute(&self, program: &str, args: &[String]) -> Result<String> {
        debug!("Command executed: {} {}", program, redact_args(args).join(" "));

        let resolved = which(program).map_err(|e| AppError::CommandSpawn {
            program: program.to_string(),
            detail: format!("{} executable not found in PATH ({})", program, e),
        })?;

        let output = Command::new(&resolved)
            .args(args)
            .output()
            .await
            .map_err(|e| AppError::CommandSpawn {
                program: program.to_string(),
                detail: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(AppError::CommandFailed {
                program: program.to_string(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

const MASK: &str = "********";

/// Copies the argument list for logging with passwords masked: the value
/// after `-P` and any `SA_PASSWORD=` assignment.
pub fn redact_args(args: &[String]) -> Vec<String> {
    let mut redacted = Vec::with_capacity(args.len());
    let mut mask_next = false;
    for arg in args {
        if mask_next {
            redacted.push(MASK.to_string());
            mask_next = false;
            continue;
        }
        mask_next = arg == "-P";
        if arg.starts_with("SA_PASSWORD=") {
            redacted.push(format!("SA_PASSWORD={}", MASK));
        } else {
            redacted.push(arg.clone());
        }
    }
    redacted
}

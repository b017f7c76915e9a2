use assert_cmd::prelude::*; // Add methods on commands
use predicates::prelude::*; // Used for writing assertions
use std::process::Command; // Run programs

const CARGO_BIN: &str = "rds-backup";

const CONNECTION_ENV: &[&str] = &[
    "RDS_BACKUP_SERVER",
    "RDS_BACKUP_USERNAME",
    "RDS_BACKUP_PASSWORD",
    "RDS_BACKUP_DATABASE",
    "RDS_BACKUP_BUCKET",
];

/// The binary run from an empty directory, so no `.env` or
/// `rds-backup.json` is picked up.
fn isolated(dir: &tempfile::TempDir) -> Result<Command, Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin(CARGO_BIN)?;
    cmd.current_dir(dir.path());
    for var in CONNECTION_ENV {
        cmd.env_remove(var);
    }
    Ok(cmd)
}

#[test]
fn help() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin(CARGO_BIN)?;

    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Usage: "))
        .stdout(predicate::str::contains("create"));

    Ok(())
}

#[test]
fn version() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin(CARGO_BIN)?;

    cmd.arg("version");
    cmd.assert().success().stdout(predicate::str::diff(format!(
        "rds-backup version ({})\n",
        env!("CARGO_PKG_VERSION")
    )));

    Ok(())
}

#[test]
fn create_without_options_lists_every_problem() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let mut cmd = isolated(&dir)?;

    cmd.arg("create");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Invalid options for create"))
        .stderr(predicate::str::contains("--server AWS RDS SQL server must be specified"))
        .stderr(predicate::str::contains("--bucket AWS S3 Bucket must be specified"))
        .stderr(predicate::str::contains("--filename Filename must be specified"));

    Ok(())
}

#[test]
fn restore_in_container_rejects_native_only_options() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let mut cmd = isolated(&dir)?;

    cmd.args([
        "restore",
        "-f",
        "sales.bak",
        "-d",
        "sales",
        "-m",
        "sales_data",
        "-l",
        "sales_log",
        "--restore-database",
        "sales_copy",
    ]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("--container Container name must be specified"))
        .stderr(predicate::str::contains(
            "--restore-database cannot be used in Docker container restore",
        ));

    Ok(())
}

#[test]
fn status_requires_connection_options() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let mut cmd = isolated(&dir)?;

    cmd.arg("status");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("--database Name of database must be specified"));

    Ok(())
}

#[test]
fn explicit_config_file_must_exist() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let mut cmd = isolated(&dir)?;

    cmd.args(["status", "--config", "missing.json"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load option defaults"));

    Ok(())
}

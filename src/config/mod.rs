// rds-backup/src/config/mod.rs
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::debug;
use serde::Deserialize;

use crate::backup::poller::DEFAULT_POLL_INTERVAL;
use crate::cli::{
    CreateArgs, DownloadArgs, LogicalNameArgs, RestoreArgs, RestoreTargetArgs, ServerArgs,
    StatusArgs,
};
use crate::client::native::DEFAULT_SERVER_INSTALLATION_PATH;
use crate::client::{BackupRequest, DEFAULT_SERVER_PORT, DatabaseConnection, LogicalNames};
use crate::errors::{AppError, Result};
use crate::restore::{RestoreMode, RestoreOptions};

/// Picked up from the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "rds-backup.json";

/// Option defaults read from a JSON file. Anything given on the command line
/// or through the environment wins over these.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub server: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    pub bucket: Option<String>,
    pub download_directory: Option<PathBuf>,
    pub restore_server_directory: Option<PathBuf>,
    pub container: Option<String>,
    pub restore_password: Option<String>,
    pub port: Option<u16>,
    pub poll_interval: Option<u64>,
    pub timeout: Option<u64>,
}

impl FileConfig {
    /// Reads `path`, or [`DEFAULT_CONFIG_FILE`] if it exists. A missing
    /// default file is not an error; a missing explicit one is.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.is_file() {
                    return Ok(Self::default());
                }
                default
            }
        };
        let content = fs::read_to_string(&path).map_err(|e| {
            AppError::Config(format!("Failed to read config file at {}: {}", path.display(), e))
        })?;
        let config: FileConfig = serde_json::from_str(&content)?;
        debug!("Loaded option defaults from {}", path.display());
        Ok(config)
    }
}

#[derive(Debug, Clone)]
pub struct CreateConfig {
    pub backup: BackupRequest,
    pub download_directory: Option<PathBuf>,
    pub wait: bool,
    pub download: bool,
    /// Present when the backup is to be restored after download.
    pub restore: Option<RestoreOptions>,
    pub poll_interval: Duration,
    pub timeout: Option<Duration>,
    pub content_trust_enabled: bool,
}

impl CreateConfig {
    /// Whether the backup leaves S3 at all.
    pub fn needs_download(&self) -> bool {
        self.download || self.restore.is_some()
    }

    pub fn needs_completion(&self) -> bool {
        self.wait || self.needs_download()
    }
}

#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub bucket: String,
    pub filename: String,
    pub download_directory: Option<PathBuf>,
    pub restore: Option<RestoreOptions>,
    pub content_trust_enabled: bool,
}

#[derive(Debug, Clone)]
pub struct RestoreConfig {
    pub filename: String,
    pub download_directory: Option<PathBuf>,
    pub options: RestoreOptions,
    pub content_trust_enabled: bool,
}

#[derive(Debug, Clone)]
pub struct StatusConfig {
    pub connection: DatabaseConnection,
    pub content_trust_enabled: bool,
}

/// Collects every option problem so they can be reported together.
#[derive(Debug, Default)]
struct Validation {
    messages: Vec<String>,
}

impl Validation {
    fn require(&mut self, value: &Option<String>, message: &str) {
        if value.is_none() {
            self.messages.push(message.to_string());
        }
    }

    fn reject_if(&mut self, condition: bool, message: impl Into<String>) {
        if condition {
            self.messages.push(message.into());
        }
    }

    fn directory_exists(&mut self, directory: Option<&Path>, message: impl FnOnce(&Path) -> String) {
        if let Some(dir) = directory {
            if !dir.exists() {
                self.messages.push(message(dir));
            }
        }
    }

    fn finish(self) -> Result<()> {
        if self.messages.is_empty() {
            Ok(())
        } else {
            Err(AppError::InvalidInput(self.messages.join("\n")))
        }
    }
}

/// Command-line value, else file value. Empty strings count as unset.
fn pick(cli: &Option<String>, file: &Option<String>) -> Option<String> {
    cli.as_ref()
        .or(file.as_ref())
        .filter(|value| !value.is_empty())
        .cloned()
}

fn pick_path(cli: &Option<PathBuf>, file: &Option<PathBuf>) -> Option<PathBuf> {
    cli.as_ref()
        .or(file.as_ref())
        .filter(|value| !value.as_os_str().is_empty())
        .cloned()
}

fn server_values(args: &ServerArgs, file: &FileConfig) -> (Option<String>, Option<String>, Option<String>) {
    (
        pick(&args.server, &file.server),
        pick(&args.username, &file.username),
        pick(&args.password, &file.password),
    )
}

fn validate_server(
    validation: &mut Validation,
    server: &Option<String>,
    username: &Option<String>,
    password: &Option<String>,
    database: &Option<String>,
) {
    validation.require(server, "--server AWS RDS SQL server must be specified");
    validation.require(username, "--username AWS RDS SQL server login name must be specified");
    validation.require(password, "--password AWS RDS SQL server login password must be specified");
    validation.require(database, "--database Name of database must be specified");
}

fn validate_download_directory(validation: &mut Validation, directory: Option<&Path>) {
    validation.directory_exists(directory, |dir| {
        format!("the specified download-directory ({}) does not exist", dir.display())
    });
}

fn validate_logical_names(validation: &mut Validation, names: &LogicalNameArgs) {
    validation.require(&names.mdf, "--mdf Logical name of data must be specified");
    validation.require(&names.ldf, "--ldf Logical name of log must be specified");
}

/// Restore destination from the target flags. Validation messages for
/// conflicting or missing flags are added to `validation`.
fn restore_mode(
    validation: &mut Validation,
    args: &RestoreTargetArgs,
    file: &FileConfig,
) -> RestoreMode {
    if args.native {
        // A port from the defaults file is meant for container restores.
        validation.reject_if(
            args.port.is_some_and(|port| port != DEFAULT_SERVER_PORT),
            "--port Port cannot be used in restoring to local native SQL server",
        );
        let server_path = pick_path(&args.restore_server_directory, &file.restore_server_directory)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SERVER_INSTALLATION_PATH));
        validation.reject_if(
            !server_path.exists(),
            "the specified restore-server-directory does not exist",
        );
        RestoreMode::Native {
            server_path,
            rename: pick(&args.restore_database, &None),
            custom_data_path: pick_path(&args.restore_data_directory, &None),
        }
    } else {
        let container_name = pick(&args.container, &file.container);
        let password = pick(&args.restore_password, &file.restore_password);
        validation.require(&container_name, "--container Container name must be specified");
        validation.require(
            &password,
            "--restore-password Password of the restored SQL server must be specified",
        );
        validation.reject_if(
            pick(&args.restore_database, &None).is_some(),
            "--restore-database cannot be used in Docker container restore",
        );
        validation.reject_if(
            pick_path(&args.restore_data_directory, &None).is_some(),
            "--restore-data-directory cannot be used in Docker container restore",
        );
        RestoreMode::Container {
            container_name: container_name.unwrap_or_default(),
            port: args.port.or(file.port).unwrap_or(DEFAULT_SERVER_PORT),
            password: password.unwrap_or_default(),
        }
    }
}

fn logical_names(names: &LogicalNameArgs) -> LogicalNames {
    LogicalNames {
        data: names.mdf.clone().unwrap_or_default(),
        log: names.ldf.clone().unwrap_or_default(),
    }
}

pub fn create_config(
    args: &CreateArgs,
    file: &FileConfig,
    content_trust_enabled: bool,
) -> Result<CreateConfig> {
    let mut validation = Validation::default();
    let (server, username, password) = server_values(&args.server, file);
    let database = pick(&args.database, &file.database);
    let bucket = pick(&args.bucket, &file.bucket);
    let filename = pick(&args.filename, &None);
    let download_directory = pick_path(&args.download_directory, &file.download_directory);

    validate_server(&mut validation, &server, &username, &password, &database);
    validation.require(&bucket, "--bucket AWS S3 Bucket must be specified");
    validation.require(&filename, "--filename Filename must be specified");
    validate_download_directory(&mut validation, download_directory.as_deref());

    // Logical names are looked up from the source database before the backup starts.
    let restore = args.restore.then(|| RestoreOptions {
        database: database.clone().unwrap_or_default(),
        logical_names: LogicalNames::default(),
        mode: restore_mode(&mut validation, &args.target, file),
    });

    let poll_seconds = args.poll_interval.or(file.poll_interval);
    validation.reject_if(
        poll_seconds == Some(0),
        "--poll-interval must be at least one second",
    );
    let timeout = args.timeout.or(file.timeout).map(Duration::from_secs);

    validation.finish()?;

    Ok(CreateConfig {
        backup: BackupRequest {
            connection: DatabaseConnection::new(
                server.unwrap_or_default(),
                username.unwrap_or_default(),
                password.unwrap_or_default(),
                database.unwrap_or_default(),
            ),
            bucket: bucket.unwrap_or_default(),
            object_name: filename.unwrap_or_default(),
        },
        download_directory,
        wait: args.wait,
        download: args.download,
        restore,
        poll_interval: poll_seconds
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_POLL_INTERVAL),
        timeout,
        content_trust_enabled,
    })
}

pub fn download_config(
    args: &DownloadArgs,
    file: &FileConfig,
    content_trust_enabled: bool,
) -> Result<DownloadConfig> {
    let mut validation = Validation::default();
    let database = pick(&args.database, &file.database);
    let bucket = pick(&args.bucket, &file.bucket);
    let filename = pick(&args.filename, &None);
    let download_directory = pick_path(&args.download_directory, &file.download_directory);

    validation.require(&bucket, "--bucket AWS S3 Bucket must be specified");
    validation.require(&filename, "--filename Filename must be specified");
    validate_download_directory(&mut validation, download_directory.as_deref());

    let restore = if args.restore {
        validation.require(&database, "--database Name of database must be specified");
        validate_logical_names(&mut validation, &args.names);
        Some(RestoreOptions {
            database: database.unwrap_or_default(),
            logical_names: logical_names(&args.names),
            mode: restore_mode(&mut validation, &args.target, file),
        })
    } else {
        None
    };

    validation.finish()?;

    Ok(DownloadConfig {
        bucket: bucket.unwrap_or_default(),
        filename: filename.unwrap_or_default(),
        download_directory,
        restore,
        content_trust_enabled,
    })
}

pub fn restore_config(
    args: &RestoreArgs,
    file: &FileConfig,
    content_trust_enabled: bool,
) -> Result<RestoreConfig> {
    let mut validation = Validation::default();
    let database = pick(&args.database, &file.database);
    let filename = pick(&args.filename, &None);
    let download_directory = pick_path(&args.download_directory, &file.download_directory);

    validation.require(&filename, "--filename Filename must be specified");
    let mode = restore_mode(&mut validation, &args.target, file);
    validation.require(&database, "--database Name of database must be specified");
    validate_logical_names(&mut validation, &args.names);
    validate_download_directory(&mut validation, download_directory.as_deref());

    validation.finish()?;

    Ok(RestoreConfig {
        filename: filename.unwrap_or_default(),
        download_directory,
        options: RestoreOptions {
            database: database.unwrap_or_default(),
            logical_names: logical_names(&args.names),
            mode,
        },
        content_trust_enabled,
    })
}

pub fn status_config(
    args: &StatusArgs,
    file: &FileConfig,
    content_trust_enabled: bool,
) -> Result<StatusConfig> {
    let mut validation = Validation::default();
    let (server, username, password) = server_values(&args.server, file);
    let database = pick(&args.database, &file.database);
    validate_server(&mut validation, &server, &username, &password, &database);
    validation.finish()?;

    Ok(StatusConfig {
        connection: DatabaseConnection::new(
            server.unwrap_or_default(),
            username.unwrap_or_default(),
            password.unwrap_or_default(),
            database.unwrap_or_default(),
        ),
        content_trust_enabled,
    })
}

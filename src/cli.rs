// rds-backup/src/cli.rs
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[clap(author, version, about = "Backups of AWS RDS SQL Server databases", long_about = None)]
pub struct App {
    #[clap(flatten)]
    pub global_opts: GlobalOpts,

    #[clap(subcommand)]
    pub command: SubCommands,
}

#[derive(Subcommand, Debug)]
pub enum SubCommands {
    /// Creates a new backup
    Create(CreateArgs),
    /// Download a backup from AWS S3 with option of restore
    Download(DownloadArgs),
    /// Restores the specified backup in a docker container or local SQL server
    Restore(RestoreArgs),
    /// Show the status of the latest backup
    Status(StatusArgs),
    /// Show version
    Version,
}

#[derive(Args, Debug, Default)]
pub struct GlobalOpts {
    /// Verbose mode
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// JSON file with default option values (rds-backup.json when present)
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Args, Debug, Default, Clone)]
pub struct ServerArgs {
    /// Source SQL server
    #[clap(short, long, env = "RDS_BACKUP_SERVER")]
    pub server: Option<String>,

    /// Source SQL server login name
    #[clap(short, long, env = "RDS_BACKUP_USERNAME")]
    pub username: Option<String>,

    /// Source SQL server login password
    #[clap(short, long, env = "RDS_BACKUP_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(Args, Debug, Default, Clone)]
pub struct RestoreTargetArgs {
    /// Restore to local native SQL server
    #[clap(short, long)]
    pub native: bool,

    /// Name of restored database
    #[clap(long)]
    pub restore_database: Option<String>,

    /// Path to the directory where MDF and LDF files to be located
    #[clap(long)]
    pub restore_data_directory: Option<PathBuf>,

    /// Path to the directory of the native SQL server [default: SQL Server 2016 installation]
    #[clap(long)]
    pub restore_server_directory: Option<PathBuf>,

    /// Name of container to be created
    #[clap(short, long)]
    pub container: Option<String>,

    /// Password of the MSSQL server in the container to be created
    #[clap(long)]
    pub restore_password: Option<String>,

    /// Port of restored server container [default: 1433]
    #[clap(long)]
    pub port: Option<u16>,
}

#[derive(Args, Debug, Default, Clone)]
pub struct LogicalNameArgs {
    /// Logical name of data
    #[clap(short, long)]
    pub mdf: Option<String>,

    /// Logical name of log
    #[clap(short, long)]
    pub ldf: Option<String>,
}

#[derive(Args, Debug, Default, Clone)]
pub struct CreateArgs {
    #[clap(flatten)]
    pub server: ServerArgs,

    /// Name of database
    #[clap(short, long, env = "RDS_BACKUP_DATABASE")]
    pub database: Option<String>,

    /// File name of the backup
    #[clap(short, long)]
    pub filename: Option<String>,

    /// Bucket name
    #[clap(short, long, env = "RDS_BACKUP_BUCKET")]
    pub bucket: Option<String>,

    /// Path to the directory where backup from AWS S3 located
    #[clap(long)]
    pub download_directory: Option<PathBuf>,

    #[clap(flatten)]
    pub target: RestoreTargetArgs,

    /// Wait for backup to complete
    #[clap(short, long)]
    pub wait: bool,

    /// Create and download the backup
    #[clap(long)]
    pub download: bool,

    /// Restore the backup once downloaded
    #[clap(short, long)]
    pub restore: bool,

    /// Seconds between backup status checks [default: 5]
    #[clap(long)]
    pub poll_interval: Option<u64>,

    /// Give up waiting for the backup after this many seconds
    #[clap(long)]
    pub timeout: Option<u64>,
}

#[derive(Args, Debug, Default, Clone)]
pub struct DownloadArgs {
    /// Name of database
    #[clap(short, long, env = "RDS_BACKUP_DATABASE")]
    pub database: Option<String>,

    /// File name of the backup
    #[clap(short, long)]
    pub filename: Option<String>,

    /// Bucket name
    #[clap(short, long, env = "RDS_BACKUP_BUCKET")]
    pub bucket: Option<String>,

    /// Path to the directory where backup from AWS S3 located
    #[clap(long)]
    pub download_directory: Option<PathBuf>,

    #[clap(flatten)]
    pub names: LogicalNameArgs,

    #[clap(flatten)]
    pub target: RestoreTargetArgs,

    /// Restore the backup once downloaded
    #[clap(short, long)]
    pub restore: bool,
}

#[derive(Args, Debug, Default, Clone)]
pub struct RestoreArgs {
    /// Name of database
    #[clap(short, long, env = "RDS_BACKUP_DATABASE")]
    pub database: Option<String>,

    /// File name of the backup
    #[clap(short, long)]
    pub filename: Option<String>,

    /// Path to the directory where backup from AWS S3 located
    #[clap(long)]
    pub download_directory: Option<PathBuf>,

    #[clap(flatten)]
    pub names: LogicalNameArgs,

    #[clap(flatten)]
    pub target: RestoreTargetArgs,
}

#[derive(Args, Debug, Default, Clone)]
pub struct StatusArgs {
    #[clap(flatten)]
    pub server: ServerArgs,

    /// Name of database
    #[clap(short, long, env = "RDS_BACKUP_DATABASE")]
    pub database: Option<String>,
}

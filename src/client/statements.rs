// rds-backup/src/client/statements.rs
//! SQL text sent to `sqlcmd` and the argument lists that carry it.

use super::{BackupRequest, DatabaseConnection, TaskHandle};

/// Install path of `sqlcmd` inside the SQL Server image.
pub const CONTAINER_SQLCMD_PATH: &str = "/opt/mssql-tools/bin/sqlcmd";

const STATUS_TABLE_DECLARATION: &str = "DECLARE @s TABLE (
	task_id INT,
	task_type VARCHAR(20),
	database_name VARCHAR(20),
	complete INT,
	duration INT,
	lifecycle VARCHAR(20),
	task_info VARCHAR(MAX),
	last_updated DATETIME,
	created_at DATETIME,
	S3_object_arn VARCHAR(MAX),
	overwrite_S3_backup_file BIT,
	KMS_master_key_arn VARCHAR(100)
)";

const BACKUP_TABLE_DECLARATION: &str = "DECLARE @s TABLE (
	task_id INT,
	task_type VARCHAR(20),
	lifecycle VARCHAR(20),
	created_at DATETIME,
	last_updated DATETIME,
	database_name VARCHAR(20),
	S3_object_arn VARCHAR(MAX),
	overwrite_S3_backup_file BIT,
	KMS_master_key_arn VARCHAR(100),
	task_progress INT,
	task_info VARCHAR(MAX)
)";

pub const DATA_LOGICAL_NAME_QUERY: &str =
    "SELECT name FROM sys.master_files WHERE database_id = db_id() AND type = 0";
pub const LOG_LOGICAL_NAME_QUERY: &str =
    "SELECT name FROM sys.master_files WHERE database_id = db_id() AND type = 1";

/// Column of `rds_task_status` a status query selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskField {
    Lifecycle,
    Complete,
    TaskInfo,
}

impl TaskField {
    fn column(self) -> &'static str {
        match self {
            TaskField::Lifecycle => "lifecycle",
            TaskField::Complete => "complete",
            TaskField::TaskInfo => "task_info",
        }
    }
}

/// Builds the `rds_task_status` query for one field.
///
/// An empty or absent handle selects the most recent task with `TOP 1`.
pub fn task_status_statement(database: &str, field: TaskField, task: Option<&TaskHandle>) -> String {
    let query = match task.filter(|t| !t.is_empty()) {
        Some(task) => format!("SELECT {} FROM @s WHERE task_id = {}", field.column(), task),
        None => format!("SELECT TOP 1 {} FROM @s", field.column()),
    };

    format!(
        "SET NOCOUNT ON

	{STATUS_TABLE_DECLARATION}

	INSERT INTO @s
	exec msdb.dbo.rds_task_status @db_name='{database}'

	{query}

	SET NOCOUNT OFF"
    )
}

pub fn backup_statement(request: &BackupRequest) -> String {
    format!(
        "SET NOCOUNT ON

		{BACKUP_TABLE_DECLARATION}

		INSERT INTO @s
		exec msdb.dbo.rds_backup_database
			@source_db_name='{}',
			@s3_arn_to_backup_to='arn:aws:s3:::{}/{}',
			@overwrite_S3_backup_file=1;

		SELECT TOP 1 task_id FROM @s

		SET NOCOUNT OFF",
        request.connection.database, request.bucket, request.object_name
    )
}

/// `RESTORE DATABASE` relocating the data and log files to the given paths.
pub fn restore_statement(
    database: &str,
    backup_path: &str,
    data_name: &str,
    data_path: &str,
    log_name: &str,
    log_path: &str,
) -> String {
    format!(
        "RESTORE DATABASE {database} FROM DISK=N'{backup_path}' WITH FILE=1, NOUNLOAD, REPLACE, STATS=5, MOVE '{data_name}' TO '{data_path}', MOVE '{log_name}' TO '{log_path}'"
    )
}

/// `-S <server> -d <database> -U <user> -P <password> -Q <statement>`
pub fn sqlcmd_args(connection: &DatabaseConnection, statement: &str) -> Vec<String> {
    vec![
        "-S".to_string(),
        connection.server.clone(),
        "-d".to_string(),
        connection.database.clone(),
        "-U".to_string(),
        connection.username.clone(),
        "-P".to_string(),
        connection.password.clone(),
        "-Q".to_string(),
        statement.to_string(),
    ]
}

/// Same as [`sqlcmd_args`] but routed through `docker exec` into `container`.
pub fn container_sqlcmd_args(
    container: &str,
    connection: &DatabaseConnection,
    statement: &str,
) -> Vec<String> {
    let mut args = vec![
        "exec".to_string(),
        "-t".to_string(),
        container.to_string(),
        CONTAINER_SQLCMD_PATH.to_string(),
    ];
    args.extend(sqlcmd_args(connection, statement));
    args
}

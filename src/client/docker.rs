// rds-backup/src/client/docker.rs
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};

use super::command::CommandExecutor;
use super::statements::{self, TaskField};
use super::{
    BackupRequest, ClientKind, DEFAULT_SERVER_PORT, DatabaseConnection,
    LogicalNames, RestoreRequest, SqlClient, TaskHandle, get_sql_output, parse_task_id,
};
use crate::errors::{AppError, Result};

pub const DOCKER: &str = "docker";
pub const SQL_SERVER_IMAGE: &str = "microsoft/mssql-server-linux";

/// Name of the helper container used only to get at `sqlcmd`.
pub const SQLCMD_CONTAINER_NAME: &str = "mssql-sqlcmd";

/// Time SQL Server needs after `docker run` before it accepts a restore.
pub const SERVER_SETTLE_TIME: Duration = Duration::from_secs(90);

const CONTAINER_BACKUP_DIRECTORY: &str = "/var/backups";
const CONTAINER_DATA_DIRECTORY: &str = "/var/opt/mssql/data";

const CONTENT_TRUST_EXIT_CODE: i32 = 125;

/// `sqlcmd` run through `docker exec` in a SQL Server container.
pub struct DockerClient {
    executor: Arc<dyn CommandExecutor>,
    content_trust_enabled: bool,
    /// Set by the environment check, read by every query afterwards.
    container_name: Option<String>,
}

impl DockerClient {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            executor,
            content_trust_enabled: false,
            container_name: None,
        }
    }

    /// Whether `DOCKER_CONTENT_TRUST` is switched on for this process.
    pub fn with_content_trust(mut self, enabled: bool) -> Self {
        self.content_trust_enabled = enabled;
        self
    }

    pub fn container_name(&self) -> Option<&str> {
        self.container_name.as_deref()
    }

    async fn docker(&self, args: &[&str]) -> Result<String> {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        self.docker_owned(&args).await
    }

    /// Exit status 125 is any daemon-side failure; it only means a refused
    /// unsigned image while content trust is on.
    async fn docker_owned(&self, args: &[String]) -> Result<String> {
        match self.executor.execute(DOCKER, args).await {
            Err(AppError::CommandFailed {
                code: Some(CONTENT_TRUST_EXIT_CODE),
                ..
            }) if self.content_trust_enabled => Err(AppError::ContentTrustEnabled),
            other => other,
        }
    }

    async fn query(&self, connection: &DatabaseConnection, statement: &str) -> Result<String> {
        let container = self
            .container_name
            .as_deref()
            .ok_or(AppError::EnvironmentUnavailable)?;
        self.docker_owned(&statements::container_sqlcmd_args(
            container, connection, statement,
        ))
        .await
    }

    async fn task_field(
        &self,
        connection: &DatabaseConnection,
        field: TaskField,
        task: Option<&TaskHandle>,
    ) -> Result<String> {
        let statement = statements::task_status_statement(&connection.database, field, task);
        let output = self.query(connection, &statement).await?;
        get_sql_output(&output)
    }

    /// Name of a running SQL Server container, if there is one.
    async fn running_server_container(&self) -> Option<String> {
        let ancestor = format!("ancestor={}", SQL_SERVER_IMAGE);
        let output = self
            .docker(&["ps", "-f", ancestor.as_str(), "-f", "status=running", "--format", "{{.Names}}"])
            .await
            .ok()?;
        first_line(&output)
    }

    async fn helper_container_exists(&self) -> bool {
        let name_filter = format!("name={}", SQLCMD_CONTAINER_NAME);
        match self
            .docker(&["ps", "-a", "-f", name_filter.as_str(), "--format", "{{.Names}}"])
            .await
        {
            Ok(output) => first_line(&output).is_some(),
            Err(_) => false,
        }
    }

    async fn create_helper_container(&self) -> Result<String> {
        self.docker(&[
            "run",
            "--name",
            SQLCMD_CONTAINER_NAME,
            "-e",
            "ACCEPT_EULA=Y",
            "-d",
            SQL_SERVER_IMAGE,
        ])
        .await?;
        Ok(SQLCMD_CONTAINER_NAME.to_string())
    }

    /// Starts a new SQL Server container with the backup's directory mounted
    /// and restores the backup into it.
    pub async fn restore(&self, target: &ContainerRestore) -> Result<()> {
        let request = &target.request;
        if !tokio::fs::try_exists(&request.backup_path).await? {
            return Err(AppError::BackupNotFound(request.backup_path.clone()));
        }
        let filename = request.backup_filename()?;
        // A relative bind-mount source would be taken as a volume name.
        let directory = std::path::absolute(&request.backup_path)?
            .parent()
            .map(|dir| dir.to_string_lossy().into_owned())
            .unwrap_or_default();

        info!(
            "Starting to restore from file {} onto a SQL Server in Docker container...",
            request.backup_path.display()
        );

        let port_mapping = format!("{}:{}", target.port, DEFAULT_SERVER_PORT);
        let volume = format!("{}/:{}/", directory, CONTAINER_BACKUP_DIRECTORY);
        let sa_password = format!("SA_PASSWORD={}", target.password);
        self.docker(&[
            "run",
            "--name",
            target.container_name.as_str(),
            "-p",
            port_mapping.as_str(),
            "-v",
            volume.as_str(),
            "-e",
            sa_password.as_str(),
            "-e",
            "ACCEPT_EULA=Y",
            "-d",
            SQL_SERVER_IMAGE,
        ])
        .await?;

        info!(
            "MSSQL container {} is created. Waiting for SQL server to complete initialisation...",
            target.container_name
        );
        tokio::time::sleep(SERVER_SETTLE_TIME).await;

        info!("Restoring...");
        let database = &request.database;
        let statement = statements::restore_statement(
            database,
            &format!("{}/{}", CONTAINER_BACKUP_DIRECTORY, filename),
            &request.logical_names.data,
            &format!("{}/{}.mdf", CONTAINER_DATA_DIRECTORY, database),
            &request.logical_names.log,
            &format!("{}/{}.ldf", CONTAINER_DATA_DIRECTORY, database),
        );
        self.docker(&[
            "exec",
            "-t",
            target.container_name.as_str(),
            statements::CONTAINER_SQLCMD_PATH,
            "-S",
            ".",
            "-U",
            "sa",
            "-P",
            target.password.as_str(),
            "-Q",
            statement.as_str(),
        ])
        .await?;

        info!("Restore has been completed (as database {}).", database);
        Ok(())
    }
}

fn first_line(output: &str) -> Option<String> {
    output
        .split('\n')
        .next()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl SqlClient for DockerClient {
    fn kind(&self) -> ClientKind {
        ClientKind::Docker
    }

    async fn is_environment_satisfied(&mut self) -> bool {
        if let Err(e) = self.docker(&["help"]).await {
            debug!("docker is not available: {}", e);
            return false;
        }
        if self.content_trust_enabled {
            warn!(
                "Docker Content Trust is not disabled yet. Please run 'export DOCKER_CONTENT_TRUST=0'"
            );
            return false;
        }

        let name = match self.running_server_container().await {
            Some(name) => name,
            None => {
                if self.helper_container_exists().await {
                    if let Err(e) = self.docker(&["rm", SQLCMD_CONTAINER_NAME]).await {
                        debug!("Failed to remove {}: {}", SQLCMD_CONTAINER_NAME, e);
                    }
                }
                match self.create_helper_container().await {
                    Ok(name) => name,
                    Err(e) => {
                        debug!("Failed to create {}: {}", SQLCMD_CONTAINER_NAME, e);
                        return false;
                    }
                }
            }
        };

        debug!("Running sqlcmd in container {}", name);
        self.container_name = Some(name);
        true
    }

    async fn get_status(
        &self,
        connection: &DatabaseConnection,
        task: Option<&TaskHandle>,
    ) -> Result<String> {
        self.task_field(connection, TaskField::Lifecycle, task).await
    }

    async fn get_completion_percentage(
        &self,
        connection: &DatabaseConnection,
        task: Option<&TaskHandle>,
    ) -> Result<String> {
        self.task_field(connection, TaskField::Complete, task).await
    }

    async fn get_task_message(
        &self,
        connection: &DatabaseConnection,
        task: Option<&TaskHandle>,
    ) -> Result<String> {
        self.task_field(connection, TaskField::TaskInfo, task).await
    }

    async fn start_backup(&self, request: &BackupRequest) -> Result<TaskHandle> {
        let output = self
            .query(&request.connection, &statements::backup_statement(request))
            .await?;
        parse_task_id(&output)
    }

    async fn get_logical_names(&self, connection: &DatabaseConnection) -> Result<LogicalNames> {
        let data = get_sql_output(
            &self
                .query(connection, statements::DATA_LOGICAL_NAME_QUERY)
                .await?,
        )?;
        let log = get_sql_output(
            &self
                .query(connection, statements::LOG_LOGICAL_NAME_QUERY)
                .await?,
        )?;
        Ok(LogicalNames { data, log })
    }
}

/// Restore into a freshly created SQL Server container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRestore {
    pub request: RestoreRequest,
    pub container_name: String,
    /// Host port mapped to the container's SQL Server port.
    pub port: u16,
    /// `sa` password of the new server.
    pub password: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::command::testing::{command_lines, recording_executor};
    use std::path::PathBuf;

    fn failure(code: i32) -> AppError {
        AppError::CommandFailed {
            program: DOCKER.to_string(),
            code: Some(code),
            stderr: String::new(),
        }
    }

    #[tokio::test]
    async fn test_environment_check_uses_running_server_container() {
        let (executor, invocations) =
            recording_executor(vec![Ok(String::new()), Ok("rds-restore\n".to_string())]);
        let mut client = DockerClient::new(executor);

        assert!(client.is_environment_satisfied().await);
        assert_eq!(client.container_name(), Some("rds-restore"));
        assert_eq!(
            command_lines(&invocations),
            vec![
                "docker help",
                "docker ps -f ancestor=microsoft/mssql-server-linux -f status=running --format {{.Names}}",
            ]
        );
    }

    #[tokio::test]
    async fn test_environment_check_replaces_dormant_helper_container() {
        let (executor, invocations) = recording_executor(vec![
            Ok(String::new()),
            Ok("\n".to_string()),
            Ok("mssql-sqlcmd\n".to_string()),
            Ok(String::new()),
            Ok("3f2a\n".to_string()),
        ]);
        let mut client = DockerClient::new(executor);

        assert!(client.is_environment_satisfied().await);
        assert_eq!(client.container_name(), Some(SQLCMD_CONTAINER_NAME));
        assert_eq!(
            command_lines(&invocations)[2..],
            [
                "docker ps -a -f name=mssql-sqlcmd --format {{.Names}}",
                "docker rm mssql-sqlcmd",
                "docker run --name mssql-sqlcmd -e ACCEPT_EULA=Y -d microsoft/mssql-server-linux",
            ]
        );
    }

    #[tokio::test]
    async fn test_environment_check_creates_helper_without_removal() {
        let (executor, invocations) = recording_executor(vec![
            Ok(String::new()),
            Ok(String::new()),
            Ok(String::new()),
            Ok("3f2a\n".to_string()),
        ]);
        let mut client = DockerClient::new(executor);

        assert!(client.is_environment_satisfied().await);
        let lines = command_lines(&invocations);
        assert_eq!(lines.len(), 4);
        assert!(lines.iter().all(|line| !line.starts_with("docker rm")));
    }

    #[tokio::test]
    async fn test_environment_check_fails_when_helper_cannot_start() {
        let (executor, _) = recording_executor(vec![
            Ok(String::new()),
            Ok(String::new()),
            Ok(String::new()),
            Err(failure(1)),
        ]);
        let mut client = DockerClient::new(executor);

        assert!(!client.is_environment_satisfied().await);
        assert_eq!(client.container_name(), None);
    }

    #[tokio::test]
    async fn test_environment_check_refuses_content_trust() {
        let (executor, invocations) = recording_executor(vec![]);
        let mut client = DockerClient::new(executor).with_content_trust(true);

        assert!(!client.is_environment_satisfied().await);
        assert_eq!(command_lines(&invocations), vec!["docker help"]);
    }

    #[tokio::test]
    async fn test_environment_check_fails_without_docker() {
        let (executor, invocations) = recording_executor(vec![Err(AppError::CommandSpawn {
            program: DOCKER.to_string(),
            detail: "docker executable not found in PATH".to_string(),
        })]);
        let mut client = DockerClient::new(executor);

        assert!(!client.is_environment_satisfied().await);
        assert_eq!(invocations.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_queries_exec_into_cached_container() -> anyhow::Result<()> {
        let (executor, invocations) = recording_executor(vec![
            Ok(String::new()),
            Ok("rds-restore\n".to_string()),
            Ok("lifecycle\n---------\nSUCCESS\n".to_string()),
        ]);
        let mut client = DockerClient::new(executor);
        assert!(client.is_environment_satisfied().await);

        let connection = DatabaseConnection::new("myserver.com", "me", "password", "dbname");
        let status = client
            .get_status(&connection, Some(&TaskHandle::from("5")))
            .await?;

        assert_eq!(status, "SUCCESS");
        let invocations = invocations.lock().unwrap();
        let (program, args) = &invocations[2];
        assert_eq!(program, DOCKER);
        assert_eq!(
            &args[..12],
            &[
                "exec",
                "-t",
                "rds-restore",
                statements::CONTAINER_SQLCMD_PATH,
                "-S",
                "myserver.com",
                "-d",
                "dbname",
                "-U",
                "me",
                "-P",
                "password",
            ]
        );
        assert_eq!(args[12], "-Q");
        assert!(args[13].contains("WHERE task_id = 5"));
        Ok(())
    }

    #[tokio::test]
    async fn test_query_before_environment_check_is_unavailable() {
        let (executor, invocations) = recording_executor(vec![]);
        let client = DockerClient::new(executor);
        let connection = DatabaseConnection::new("myserver.com", "me", "password", "dbname");

        let result = client.get_status(&connection, None).await;

        assert!(matches!(result, Err(AppError::EnvironmentUnavailable)));
        assert!(invocations.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_exit_125_is_content_trust_when_enabled() {
        let (executor, _) = recording_executor(vec![Err(failure(125))]);
        let client = DockerClient::new(executor).with_content_trust(true);

        let result = client.docker(&["run", "--name", "x", "-d", SQL_SERVER_IMAGE]).await;
        assert!(matches!(result, Err(AppError::ContentTrustEnabled)));
    }

    #[tokio::test]
    async fn test_restore_name_conflict_keeps_docker_message() -> anyhow::Result<()> {
        let downloads = tempfile::tempdir()?;
        let backup_path = downloads.path().join("sales.bak");
        std::fs::write(&backup_path, b"backup")?;
        let conflict = "Conflict. The container name \"/sales-restore\" is already in use";
        let (executor, invocations) = recording_executor(vec![Err(AppError::CommandFailed {
            program: DOCKER.to_string(),
            code: Some(125),
            stderr: conflict.to_string(),
        })]);

        let result = DockerClient::new(executor)
            .restore(&container_restore(backup_path))
            .await;

        match result {
            Err(AppError::CommandFailed { code, stderr, .. }) => {
                assert_eq!(code, Some(125));
                assert_eq!(stderr, conflict);
            }
            other => panic!("expected CommandFailed, got {:?}", other),
        }
        // Nothing is executed in a container that was never created.
        assert_eq!(invocations.lock().unwrap().len(), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_mounts_absolute_directory() -> anyhow::Result<()> {
        let downloads = tempfile::Builder::new().prefix("restore-rel").tempdir_in(".")?;
        let relative_dir = PathBuf::from(downloads.path().file_name().unwrap_or_default());
        assert!(relative_dir.is_relative());
        std::fs::write(relative_dir.join("sales.bak"), b"backup")?;

        let (executor, invocations) = recording_executor(vec![]);
        DockerClient::new(executor)
            .restore(&container_restore(relative_dir.join("sales.bak")))
            .await?;

        let expected = format!(
            "-v {}/:/var/backups/",
            std::env::current_dir()?.join(&relative_dir).display()
        );
        assert!(command_lines(&invocations)[0].contains(&expected));
        Ok(())
    }

    #[tokio::test]
    async fn test_other_exit_codes_pass_through() {
        let (executor, _) = recording_executor(vec![Err(failure(1))]);
        let client = DockerClient::new(executor);

        let result = client.docker(&["ps"]).await;
        assert!(matches!(result, Err(AppError::CommandFailed { code: Some(1), .. })));
    }

    fn container_restore(backup_path: PathBuf) -> ContainerRestore {
        ContainerRestore {
            request: RestoreRequest {
                backup_path,
                database: "sales".to_string(),
                logical_names: LogicalNames {
                    data: "sales_data".to_string(),
                    log: "sales_log".to_string(),
                },
            },
            container_name: "sales-restore".to_string(),
            port: 1533,
            password: "Str0ng!Pass".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_creates_container_then_restores() -> anyhow::Result<()> {
        let downloads = tempfile::tempdir()?;
        let backup_path = downloads.path().join("sales.bak");
        std::fs::write(&backup_path, b"backup")?;

        let (executor, invocations) = recording_executor(vec![]);
        let client = DockerClient::new(executor);
        let started = tokio::time::Instant::now();
        client.restore(&container_restore(backup_path)).await?;

        assert!(started.elapsed() >= SERVER_SETTLE_TIME);
        let lines = command_lines(&invocations);
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            format!(
                "docker run --name sales-restore -p 1533:1433 -v {}/:/var/backups/ -e SA_PASSWORD=Str0ng!Pass -e ACCEPT_EULA=Y -d microsoft/mssql-server-linux",
                downloads.path().display()
            )
        );
        assert_eq!(
            lines[1],
            "docker exec -t sales-restore /opt/mssql-tools/bin/sqlcmd -S . -U sa -P Str0ng!Pass -Q \
             RESTORE DATABASE sales FROM DISK=N'/var/backups/sales.bak' WITH FILE=1, NOUNLOAD, REPLACE, STATS=5, \
             MOVE 'sales_data' TO '/var/opt/mssql/data/sales.mdf', MOVE 'sales_log' TO '/var/opt/mssql/data/sales.ldf'"
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_restore_missing_backup_runs_nothing() {
        let (executor, invocations) = recording_executor(vec![]);
        let client = DockerClient::new(executor);

        let result = client
            .restore(&container_restore(PathBuf::from("/nonexistent/sales.bak")))
            .await;

        assert!(matches!(result, Err(AppError::BackupNotFound(_))));
        assert!(invocations.lock().unwrap().is_empty());
    }
}

//! Migration runner backed by an external command.

use super::{MigrateOptions, MigrationRunner};
use crate::context::TenantConnection;
use crate::error::DatabaseError;
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

/// Runs `program [args..] migrate|seed ...` and reports its exit status.
///
/// The target is passed both as arguments (`--database <name>`) and as the
/// `TENANCY_CONNECTION` / `TENANCY_DATABASE` environment variables.
#[derive(Debug, Clone)]
pub struct CommandMigrationRunner {
    program: String,
    args: Vec<String>,
}

impl CommandMigrationRunner {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Leading arguments placed before the subcommand.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    async fn execute(
        &self,
        connection: &TenantConnection,
        subcommand: &[String],
    ) -> Result<i32, DatabaseError> {
        debug!(
            program = %self.program,
            args = ?subcommand,
            database = %connection.database,
            "Running migration command"
        );

        let output = Command::new(&self.program)
            .args(&self.args)
            .args(subcommand)
            .env("TENANCY_CONNECTION", &connection.name)
            .env("TENANCY_DATABASE", &connection.database)
            .output()
            .await
            .map_err(|e| DatabaseError::Runner(format!("{}: {}", self.program, e)))?;

        // Killed by a signal: no exit code.
        let code = output.status.code().unwrap_or(-1);
        if code != 0 {
            warn!(
                program = %self.program,
                exit_code = code,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "Migration command failed"
            );
        }
        Ok(code)
    }
}

#[async_trait]
impl MigrationRunner for CommandMigrationRunner {
    async fn migrate(
        &self,
        connection: &TenantConnection,
        options: &MigrateOptions,
    ) -> Result<i32, DatabaseError> {
        let mut args = vec![
            "migrate".to_string(),
            "--database".to_string(),
            connection.database.clone(),
        ];
        if let Some(path) = &options.path {
            args.push("--path".to_string());
            args.push(path.clone());
        }
        if options.force {
            args.push("--force".to_string());
        }
        if options.seed {
            args.push("--seed".to_string());
        }

        self.execute(connection, &args).await
    }

    async fn seed(&self, connection: &TenantConnection, seeder: &str) -> Result<i32, DatabaseError> {
        let args = [
            "seed".to_string(),
            "--database".to_string(),
            connection.database.clone(),
            "--class".to_string(),
            seeder.to_string(),
        ];

        self.execute(connection, &args).await
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn connection() -> TenantConnection {
        TenantConnection {
            name: "tenant".to_string(),
            database: "tenant_t-1".to_string(),
        }
    }

    fn shell(script: &str) -> CommandMigrationRunner {
        CommandMigrationRunner::new("sh").with_args(["-c", script, "runner"])
    }

    #[tokio::test]
    async fn test_exit_code_is_reported() {
        let runner = shell(r#"[ "$TENANCY_DATABASE" = "tenant_t-1" ] || exit 9; exit 0"#);
        let code = runner
            .migrate(&connection(), &MigrateOptions::default())
            .await
            .unwrap();
        assert_eq!(code, 0);

        let failing = shell("exit 3");
        assert_eq!(failing.seed(&connection(), "TenantSeeder").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_arguments_are_passed() {
        // $1.. are the arguments after the script name.
        let runner = shell(r#"[ "$1" = migrate ] && [ "$5" = "db/tenant" ] && [ "$6" = --force ]"#);
        let options = MigrateOptions {
            path: Some("db/tenant".to_string()),
            force: true,
            seed: false,
        };
        assert_eq!(runner.migrate(&connection(), &options).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_missing_program_is_an_error() {
        let runner = CommandMigrationRunner::new("/nonexistent/tenantry-migrate");
        let err = runner
            .migrate(&connection(), &MigrateOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Runner(_)));
    }
}

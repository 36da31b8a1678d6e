//! Database per tenant
//!
//! [`MultiDatabaseManager`] switches a [`TenancyContext`] between the central
//! connection and a tenant's own database, and provisions those databases
//! through an injected [`DatabaseDriver`] and [`MigrationRunner`].
//!
//! ```rust,ignore
//! let manager = MultiDatabaseManager::new(config, driver, runner);
//!
//! let mut ctx = manager.context();
//! {
//!     let scope = manager.enter(&mut ctx, &tenant);
//!     assert_eq!(scope.connection_name(), "tenant");
//! }
//! assert!(!ctx.is_initialized());
//! ```

mod command;
mod memory;

pub use command::CommandMigrationRunner;
pub use memory::{InMemoryDatabaseDriver, RecordingMigrationRunner, RunnerCall};

use crate::context::{TenancyContext, TenancyScope, TenantConnection};
use crate::error::{DatabaseError, Result};
use crate::tenant::Tenant;
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tenantry_config::TenancyConfig;
use tracing::{debug, info, warn};

/// Creates and drops physical databases.
///
/// `Ok(false)` reports an expected refusal; `Err` is reserved for I/O
/// failures.
#[async_trait]
pub trait DatabaseDriver: Send + Sync {
    async fn database_exists(&self, name: &str) -> std::result::Result<bool, DatabaseError>;

    async fn create_database(&self, name: &str) -> std::result::Result<bool, DatabaseError>;

    async fn drop_database(&self, name: &str) -> std::result::Result<bool, DatabaseError>;
}

/// Runs migrations and seeders against a connection, returning an exit
/// code (0 on success).
#[async_trait]
pub trait MigrationRunner: Send + Sync {
    async fn migrate(
        &self,
        connection: &TenantConnection,
        options: &MigrateOptions,
    ) -> std::result::Result<i32, DatabaseError>;

    async fn seed(
        &self,
        connection: &TenantConnection,
        seeder: &str,
    ) -> std::result::Result<i32, DatabaseError>;
}

/// Options passed through to the migration runner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrateOptions {
    /// Migration directory, relative to the runner's working directory
    pub path: Option<String>,

    /// Run without confirmation prompts
    pub force: bool,

    /// Run the default seeder afterwards
    pub seed: bool,
}

impl MigrateOptions {
    /// Options for automatic provisioning runs.
    pub fn from_config(config: &TenancyConfig) -> Self {
        Self {
            path: config.provisioning.migration_path.clone(),
            force: true,
            seed: false,
        }
    }
}

/// Connection switcher and database provisioner.
pub struct MultiDatabaseManager {
    config: Arc<TenancyConfig>,
    driver: Arc<dyn DatabaseDriver>,
    runner: Arc<dyn MigrationRunner>,
}

impl MultiDatabaseManager {
    pub fn new(
        config: Arc<TenancyConfig>,
        driver: Arc<dyn DatabaseDriver>,
        runner: Arc<dyn MigrationRunner>,
    ) -> Self {
        Self {
            config,
            driver,
            runner,
        }
    }

    pub fn config(&self) -> &Arc<TenancyConfig> {
        &self.config
    }

    /// A fresh, uninitialized context on the central connection.
    pub fn context(&self) -> TenancyContext {
        TenancyContext::new(&self.config.central_connection)
    }

    /// Physical database name for `tenant`.
    pub fn database_name(&self, tenant: &Tenant) -> String {
        match &tenant.database {
            Some(name) => name.clone(),
            None => format!(
                "{}{}{}",
                self.config.database.prefix, tenant.id, self.config.database.suffix
            ),
        }
    }

    /// Connection for `tenant`. Single-database mode shares the central one.
    pub fn connection_for(&self, tenant: &Tenant) -> TenantConnection {
        if self.config.is_multi_database() {
            TenantConnection {
                name: self.config.database.tenant_connection.clone(),
                database: self.database_name(tenant),
            }
        } else {
            TenantConnection {
                name: self.config.central_connection.clone(),
                database: self.config.central_connection.clone(),
            }
        }
    }

    /// Activate `tenant` in `ctx`. Returns `false` if it already was.
    pub fn initialize(&self, ctx: &mut TenancyContext, tenant: &Tenant) -> bool {
        ctx.initialize(tenant.clone(), self.connection_for(tenant))
    }

    /// Return `ctx` to the central connection.
    pub fn end(&self, ctx: &mut TenancyContext) -> Option<Tenant> {
        ctx.end()
    }

    /// Activate `tenant` until the returned guard is dropped.
    pub fn enter<'a>(&self, ctx: &'a mut TenancyContext, tenant: &Tenant) -> TenancyScope<'a> {
        TenancyScope::enter(ctx, tenant.clone(), self.connection_for(tenant))
    }

    /// Run `f` inside a fresh context scoped to `tenant`.
    ///
    /// The context never outlives the call, so nothing leaks into the next
    /// job run on the same task.
    pub async fn run<F, T>(&self, tenant: &Tenant, f: F) -> T
    where
        F: for<'c> FnOnce(&'c TenancyContext) -> BoxFuture<'c, T>,
    {
        let mut context = self.context();
        let scope = self.enter(&mut context, tenant);
        f(&*scope).await
    }

    pub async fn database_exists(&self, tenant: &Tenant) -> Result<bool> {
        Ok(self.driver.database_exists(&self.database_name(tenant)).await?)
    }

    /// Create the tenant's database unless it already exists.
    pub async fn create_database(&self, tenant: &Tenant) -> Result<bool> {
        let name = self.database_name(tenant);

        if self.driver.database_exists(&name).await? {
            debug!(tenant_id = %tenant.id, database = %name, "Database already exists");
            return Ok(true);
        }

        let created = self.driver.create_database(&name).await?;
        if created {
            info!(tenant_id = %tenant.id, database = %name, "Created tenant database");
        } else {
            warn!(tenant_id = %tenant.id, database = %name, "Driver refused to create database");
        }
        Ok(created)
    }

    /// Drop the tenant's database if it exists.
    pub async fn delete_database(&self, tenant: &Tenant) -> Result<bool> {
        let name = self.database_name(tenant);

        if !self.driver.database_exists(&name).await? {
            debug!(tenant_id = %tenant.id, database = %name, "Database already absent");
            return Ok(true);
        }

        let dropped = self.driver.drop_database(&name).await?;
        if dropped {
            info!(tenant_id = %tenant.id, database = %name, "Deleted tenant database");
        } else {
            warn!(tenant_id = %tenant.id, database = %name, "Driver refused to drop database");
        }
        Ok(dropped)
    }

    /// Run migrations on the tenant's connection and return the exit code.
    pub async fn migrate_tenant(&self, tenant: &Tenant, options: &MigrateOptions) -> Result<i32> {
        let runner = self.runner.clone();
        let options = options.clone();

        let code = self
            .run(tenant, move |ctx| {
                Box::pin(async move {
                    let connection = active_connection(ctx)?;
                    runner.migrate(connection, &options).await
                })
            })
            .await?;

        debug!(tenant_id = %tenant.id, exit_code = code, "Migrations finished");
        Ok(code)
    }

    /// Run `seeder` on the tenant's connection and return the exit code.
    pub async fn seed_tenant(&self, tenant: &Tenant, seeder: &str) -> Result<i32> {
        let runner = self.runner.clone();
        let seeder = seeder.to_string();

        let code = self
            .run(tenant, move |ctx| {
                Box::pin(async move {
                    let connection = active_connection(ctx)?;
                    runner.seed(connection, &seeder).await
                })
            })
            .await?;

        debug!(tenant_id = %tenant.id, exit_code = code, "Seeder finished");
        Ok(code)
    }
}

fn active_connection(ctx: &TenancyContext) -> std::result::Result<&TenantConnection, DatabaseError> {
    ctx.connection()
        .ok_or_else(|| DatabaseError::Connection("no tenant connection active".to_string()))
}

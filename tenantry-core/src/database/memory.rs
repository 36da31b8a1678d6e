//! In-memory driver and runner (for testing)

use super::{DatabaseDriver, MigrateOptions, MigrationRunner};
use crate::context::TenantConnection;
use crate::error::DatabaseError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};

/// Driver that keeps database names in a set.
pub struct InMemoryDatabaseDriver {
    databases: Mutex<HashSet<String>>,
    refused: Mutex<HashSet<String>>,
    available: AtomicBool,
    creates: AtomicUsize,
}

impl InMemoryDatabaseDriver {
    pub fn new() -> Self {
        Self {
            databases: Mutex::new(HashSet::new()),
            refused: Mutex::new(HashSet::new()),
            available: AtomicBool::new(true),
            creates: AtomicUsize::new(0),
        }
    }

    /// Answer `Ok(false)` to any create or drop of `name`.
    pub fn refuse(&self, name: impl Into<String>) {
        self.refused.lock().insert(name.into());
    }

    /// While unavailable every call fails with a connection error.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn databases(&self) -> Vec<String> {
        let mut names: Vec<_> = self.databases.lock().iter().cloned().collect();
        names.sort();
        names
    }

    /// Number of `create_database` calls that reached the driver.
    pub fn create_calls(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), DatabaseError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DatabaseError::Connection("database server unavailable".to_string()))
        }
    }
}

impl Default for InMemoryDatabaseDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseDriver for InMemoryDatabaseDriver {
    async fn database_exists(&self, name: &str) -> Result<bool, DatabaseError> {
        self.check()?;
        Ok(self.databases.lock().contains(name))
    }

    async fn create_database(&self, name: &str) -> Result<bool, DatabaseError> {
        self.check()?;
        self.creates.fetch_add(1, Ordering::SeqCst);
        if self.refused.lock().contains(name) {
            return Ok(false);
        }
        Ok(self.databases.lock().insert(name.to_string()))
    }

    async fn drop_database(&self, name: &str) -> Result<bool, DatabaseError> {
        self.check()?;
        if self.refused.lock().contains(name) {
            return Ok(false);
        }
        Ok(self.databases.lock().remove(name))
    }
}

/// A call seen by [`RecordingMigrationRunner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunnerCall {
    Migrate {
        database: String,
        options: MigrateOptions,
    },
    Seed {
        database: String,
        seeder: String,
    },
}

/// Runner that records its calls and returns preset exit codes.
#[derive(Default)]
pub struct RecordingMigrationRunner {
    calls: Mutex<Vec<RunnerCall>>,
    migrate_exit_code: AtomicI32,
    seed_exit_code: AtomicI32,
}

impl RecordingMigrationRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_migrate_exit_code(&self, code: i32) {
        self.migrate_exit_code.store(code, Ordering::SeqCst);
    }

    pub fn set_seed_exit_code(&self, code: i32) {
        self.seed_exit_code.store(code, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<RunnerCall> {
        self.calls.lock().clone()
    }

    pub fn migrations(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, RunnerCall::Migrate { .. }))
            .count()
    }
}

#[async_trait]
impl MigrationRunner for RecordingMigrationRunner {
    async fn migrate(
        &self,
        connection: &TenantConnection,
        options: &MigrateOptions,
    ) -> Result<i32, DatabaseError> {
        self.calls.lock().push(RunnerCall::Migrate {
            database: connection.database.clone(),
            options: options.clone(),
        });
        Ok(self.migrate_exit_code.load(Ordering::SeqCst))
    }

    async fn seed(&self, connection: &TenantConnection, seeder: &str) -> Result<i32, DatabaseError> {
        self.calls.lock().push(RunnerCall::Seed {
            database: connection.database.clone(),
            seeder: seeder.to_string(),
        });
        Ok(self.seed_exit_code.load(Ordering::SeqCst))
    }
}

//! Tenant lifecycle events
//!
//! Every provisioning transition, successful or not, is published on the
//! event bus as a [`TenancyEvent`]. Listeners filter by name:
//!
//! ```rust,ignore
//! bus.on_named(names::DATABASE_MIGRATED, |event: TenancyEvent| async move {
//!     println!("{} is ready", event.tenant.slug);
//!     Ok(())
//! });
//! ```

use crate::tenant::Tenant;
use serde::{Deserialize, Serialize};
use std::any::Any;
use tenantry_events::{Event, EventMetadata};

/// Event names.
pub mod names {
    pub const TENANT_CREATED: &str = "tenancy.tenant_created";
    pub const DATABASE_CREATED: &str = "tenancy.database_created";
    pub const DATABASE_CREATION_FAILED: &str = "tenancy.database_creation_failed";
    pub const DATABASE_MIGRATED: &str = "tenancy.database_migrated";
    pub const MIGRATION_FAILED: &str = "tenancy.migration_failed";
    pub const DATABASE_SEEDED: &str = "tenancy.database_seeded";
    pub const SEEDING_FAILED: &str = "tenancy.seeding_failed";
    pub const DATABASE_DELETED: &str = "tenancy.database_deleted";
    pub const DATABASE_DELETION_FAILED: &str = "tenancy.database_deletion_failed";
}

/// What happened. Failure variants carry the causing error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TenancyEventKind {
    TenantCreated,
    DatabaseCreated,
    DatabaseCreationFailed { error: String },
    DatabaseMigrated,
    MigrationFailed { error: String },
    DatabaseSeeded,
    SeedingFailed { error: String },
    DatabaseDeleted,
    DatabaseDeletionFailed { error: String },
}

impl TenancyEventKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::TenantCreated => names::TENANT_CREATED,
            Self::DatabaseCreated => names::DATABASE_CREATED,
            Self::DatabaseCreationFailed { .. } => names::DATABASE_CREATION_FAILED,
            Self::DatabaseMigrated => names::DATABASE_MIGRATED,
            Self::MigrationFailed { .. } => names::MIGRATION_FAILED,
            Self::DatabaseSeeded => names::DATABASE_SEEDED,
            Self::SeedingFailed { .. } => names::SEEDING_FAILED,
            Self::DatabaseDeleted => names::DATABASE_DELETED,
            Self::DatabaseDeletionFailed { .. } => names::DATABASE_DELETION_FAILED,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::DatabaseCreationFailed { error }
            | Self::MigrationFailed { error }
            | Self::SeedingFailed { error }
            | Self::DatabaseDeletionFailed { error } => Some(error),
            _ => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error().is_some()
    }
}

/// A lifecycle event for one tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenancyEvent {
    pub metadata: EventMetadata,
    pub tenant: Tenant,
    pub kind: TenancyEventKind,
}

impl TenancyEvent {
    pub fn new(tenant: Tenant, kind: TenancyEventKind) -> Self {
        Self {
            metadata: EventMetadata::new(kind.name()),
            tenant,
            kind,
        }
    }

    pub fn tenant_created(tenant: Tenant) -> Self {
        Self::new(tenant, TenancyEventKind::TenantCreated)
    }

    /// Event linked to `cause` by correlation and causation id.
    pub fn caused_by(tenant: Tenant, kind: TenancyEventKind, cause: &EventMetadata) -> Self {
        Self {
            metadata: EventMetadata::caused_by(kind.name(), cause),
            tenant,
            kind,
        }
    }
}

impl Event for TenancyEvent {
    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

//! Provisioning lifecycle
//!
//! ```text
//! Requested -> DatabaseCreated -> Migrated -> Seeded
//!     \______________\_______________\__________-> Failed(step)
//! (any) -> Deleted
//! ```
//!
//! [`plan`] is the single place deciding which step follows an event.

use crate::events::TenancyEventKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use tenantry_config::TenancyConfig;

/// A unit of provisioning work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisioningStep {
    CreateDatabase,
    Migrate,
    Seed,
    Delete,
}

impl ProvisioningStep {
    pub const ALL: [ProvisioningStep; 4] = [
        ProvisioningStep::CreateDatabase,
        ProvisioningStep::Migrate,
        ProvisioningStep::Seed,
        ProvisioningStep::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateDatabase => "create_database",
            Self::Migrate => "migrate",
            Self::Seed => "seed",
            Self::Delete => "delete",
        }
    }

    /// Queue job type running this step.
    pub fn job_type(&self) -> &'static str {
        match self {
            Self::CreateDatabase => "tenancy.create_database",
            Self::Migrate => "tenancy.migrate_database",
            Self::Seed => "tenancy.seed_database",
            Self::Delete => "tenancy.delete_database",
        }
    }

    pub fn from_job_type(job_type: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.job_type() == job_type)
    }

    pub fn success(&self) -> TenancyEventKind {
        match self {
            Self::CreateDatabase => TenancyEventKind::DatabaseCreated,
            Self::Migrate => TenancyEventKind::DatabaseMigrated,
            Self::Seed => TenancyEventKind::DatabaseSeeded,
            Self::Delete => TenancyEventKind::DatabaseDeleted,
        }
    }

    pub fn failure(&self, error: impl Into<String>) -> TenancyEventKind {
        let error = error.into();
        match self {
            Self::CreateDatabase => TenancyEventKind::DatabaseCreationFailed { error },
            Self::Migrate => TenancyEventKind::MigrationFailed { error },
            Self::Seed => TenancyEventKind::SeedingFailed { error },
            Self::Delete => TenancyEventKind::DatabaseDeletionFailed { error },
        }
    }

    /// Whether an inline failure is also returned to the caller after its
    /// failure event.
    pub fn raises_on_failure(&self) -> bool {
        matches!(self, Self::Migrate | Self::Seed)
    }
}

impl fmt::Display for ProvisioningStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last known provisioning state of a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProvisioningState {
    Requested,
    DatabaseCreated,
    Migrated,
    Seeded,
    Failed(ProvisioningStep),
    Deleted,
}

impl ProvisioningState {
    /// State after observing `kind`.
    ///
    /// `Deleted` absorbs everything: a late job for a deleted tenant does not
    /// bring it back.
    pub fn apply(self, kind: &TenancyEventKind) -> Self {
        if self == Self::Deleted {
            return self;
        }

        match kind {
            TenancyEventKind::TenantCreated => Self::Requested,
            TenancyEventKind::DatabaseCreated => Self::DatabaseCreated,
            TenancyEventKind::DatabaseMigrated => Self::Migrated,
            TenancyEventKind::DatabaseSeeded => Self::Seeded,
            TenancyEventKind::DatabaseDeleted => Self::Deleted,
            TenancyEventKind::DatabaseCreationFailed { .. } => {
                Self::Failed(ProvisioningStep::CreateDatabase)
            }
            TenancyEventKind::MigrationFailed { .. } => Self::Failed(ProvisioningStep::Migrate),
            TenancyEventKind::SeedingFailed { .. } => Self::Failed(ProvisioningStep::Seed),
            TenancyEventKind::DatabaseDeletionFailed { .. } => {
                Self::Failed(ProvisioningStep::Delete)
            }
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Seeded | Self::Failed(_) | Self::Deleted)
    }
}

/// Step to run after `kind`, if any.
///
/// Guards:
/// - tenant created: `auto_create_database` in multi-database mode
/// - database created: `auto_migrate`
/// - migrated: `auto_seed` with a seeder configured
///
/// Deletion is never planned; it only runs on request.
pub fn plan(config: &TenancyConfig, kind: &TenancyEventKind) -> Option<ProvisioningStep> {
    let provisioning = &config.provisioning;

    match kind {
        TenancyEventKind::TenantCreated
            if provisioning.auto_create_database && config.is_multi_database() =>
        {
            Some(ProvisioningStep::CreateDatabase)
        }
        TenancyEventKind::DatabaseCreated if provisioning.auto_migrate => {
            Some(ProvisioningStep::Migrate)
        }
        TenancyEventKind::DatabaseMigrated
            if provisioning.auto_seed && provisioning.seeder.is_some() =>
        {
            Some(ProvisioningStep::Seed)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenantry_config::TenancyMode;

    #[test]
    fn test_job_types_round_trip() {
        for step in ProvisioningStep::ALL {
            assert_eq!(ProvisioningStep::from_job_type(step.job_type()), Some(step));
        }
        assert_eq!(ProvisioningStep::from_job_type("tenancy.unknown"), None);
    }

    #[test]
    fn test_forward_lifecycle() {
        let state = ProvisioningState::Requested
            .apply(&TenancyEventKind::DatabaseCreated)
            .apply(&TenancyEventKind::DatabaseMigrated);
        assert_eq!(state, ProvisioningState::Migrated);
        assert!(!state.is_terminal());

        let state = state.apply(&ProvisioningStep::Seed.failure("boom"));
        assert_eq!(state, ProvisioningState::Failed(ProvisioningStep::Seed));
        assert!(state.is_terminal());
    }

    #[test]
    fn test_deleted_absorbs_late_events() {
        let state = ProvisioningState::Migrated
            .apply(&TenancyEventKind::DatabaseDeleted)
            .apply(&TenancyEventKind::DatabaseSeeded);
        assert_eq!(state, ProvisioningState::Deleted);
    }

    #[test]
    fn test_plan_with_defaults() {
        let config = TenancyConfig::default();

        assert_eq!(
            plan(&config, &TenancyEventKind::TenantCreated),
            Some(ProvisioningStep::CreateDatabase)
        );
        assert_eq!(
            plan(&config, &TenancyEventKind::DatabaseCreated),
            Some(ProvisioningStep::Migrate)
        );
        // auto_seed is off by default
        assert_eq!(plan(&config, &TenancyEventKind::DatabaseMigrated), None);
        assert_eq!(plan(&config, &TenancyEventKind::DatabaseDeleted), None);
        assert_eq!(plan(&config, &ProvisioningStep::Migrate.failure("x")), None);
    }

    #[test]
    fn test_plan_guards() {
        let mut config = TenancyConfig {
            mode: TenancyMode::Single,
            ..TenancyConfig::default()
        };
        assert_eq!(plan(&config, &TenancyEventKind::TenantCreated), None);

        config.provisioning.auto_migrate = false;
        assert_eq!(plan(&config, &TenancyEventKind::DatabaseCreated), None);

        config.provisioning.auto_seed = true;
        assert_eq!(plan(&config, &TenancyEventKind::DatabaseMigrated), None);
        config.provisioning.seeder = Some("TenantSeeder".to_string());
        assert_eq!(
            plan(&config, &TenancyEventKind::DatabaseMigrated),
            Some(ProvisioningStep::Seed)
        );
    }
}

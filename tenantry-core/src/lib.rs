//! Multi-database tenancy
//!
//! Tenant resolution from request hosts, per-request connection switching,
//! and a database provisioning lifecycle driven by events.
//!
//! # Features
//!
//! - **Domain resolution** - subdomain, slug and custom-domain lookup with
//!   reserved and central hosts, cached with a TTL
//! - **Connection switching** - an explicit [`TenancyContext`] per request or
//!   job, with a scope guard that always restores the central connection
//! - **Provisioning** - create, migrate, seed and delete, each step gated by
//!   configuration and run inline or on a queue
//! - **Lifecycle events** - every transition is published on the event bus
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use tenantry_core::*;
//!
//! let config = Arc::new(TenancyConfig::from_env()?);
//! let store: Arc<dyn TenantStore> = Arc::new(MyTenantStore::new(pool));
//!
//! let databases = Arc::new(MultiDatabaseManager::new(config.clone(), driver, runner));
//! let resolver = Arc::new(DomainResolver::new(config.clone(), store.clone()).with_cache(cache));
//! let pipeline = ProvisioningPipeline::new(databases.clone(), EventBus::new());
//!
//! let tenants = TenantManager::new(store, resolver.clone(), pipeline);
//! tenants.create(CreateTenantRequest::new("acme")).await?;
//!
//! let gate = TenancyGate::new(resolver, databases);
//! ```

pub mod context;
pub mod database;
pub mod error;
pub mod events;
pub mod gate;
pub mod management;
pub mod provisioning;
pub mod resolver;
pub mod store;
pub mod tenant;

pub use context::{TenancyContext, TenancyScope, TenantConnection};
pub use database::{
    CommandMigrationRunner, DatabaseDriver, InMemoryDatabaseDriver, MigrateOptions,
    MigrationRunner, MultiDatabaseManager, RecordingMigrationRunner, RunnerCall,
};
pub use error::{DatabaseError, Result, TenancyError};
pub use events::{TenancyEvent, TenancyEventKind, names};
pub use gate::{GateError, TenancyGate};
pub use management::{CreateTenantRequest, TenantManager};
pub use provisioning::{
    ProvisioningJob, ProvisioningPipeline, ProvisioningState, ProvisioningStep, plan,
};
pub use resolver::{DomainResolver, Resolution, normalize_host};
pub use store::{InMemoryTenantStore, TenantStore};
pub use tenant::{Domain, Tenant};

pub use tenantry_config::{TenancyConfig, TenancyMode};

//! Tenantry - multi-database tenancy for Rust services
//!
//! Resolves tenants from request hosts, scopes database connections per
//! request, and drives each tenant's database through create, migrate and
//! seed with caching, idempotent steps and failure events.
//!
//! The workspace crates are re-exported here:
//!
//! - [`config`] - `TenancyConfig`, file and environment loading
//! - [`cache`] - cache store and typed `remember`
//! - [`events`] - in-process event bus
//! - [`queue`] - job queue and retrying worker
//! - [`tenancy`] - resolution, context switching, provisioning
//!
//! ```rust,ignore
//! use tenantry::prelude::*;
//!
//! tenantry::logging::init();
//! let config = Arc::new(TenancyConfig::from_env()?);
//! ```

pub mod logging;

pub use tenantry_cache as cache;
pub use tenantry_config as config;
pub use tenantry_core as tenancy;
pub use tenantry_events as events;
pub use tenantry_queue as queue;

/// Prelude module for convenient imports
pub mod prelude {
    pub use std::sync::Arc;

    pub use tenantry_cache::{CacheManager, CacheStore, InMemoryCache};
    pub use tenantry_config::{TenancyConfig, TenancyMode, Validate};
    pub use tenantry_core::{
        CreateTenantRequest, DatabaseDriver, Domain, DomainResolver, GateError, MigrateOptions,
        MigrationRunner, MultiDatabaseManager, ProvisioningPipeline, ProvisioningState,
        ProvisioningStep, Resolution, TenancyContext, TenancyError, TenancyEvent,
        TenancyEventKind, TenancyGate, TenancyScope, Tenant, TenantConnection, TenantManager,
        TenantStore, names,
    };
    pub use tenantry_events::{Event, EventBus, EventBusConfig};
    pub use tenantry_queue::{Queue, QueueConfig, Worker, WorkerConfig};
}

//! Tenancy errors
//!
//! Expected outcomes (reserved hosts, unknown tenants, a database that could
//! not be created) are values, not errors. What ends up here is the fatal
//! class: storage, cache, queue or database infrastructure failing.

use tenantry_cache::CacheError;
use tenantry_events::EventBusError;
use tenantry_queue::QueueError;

/// Result type for tenancy operations.
pub type Result<T> = std::result::Result<T, TenancyError>;

/// Tenancy errors
#[derive(Debug, thiserror::Error)]
pub enum TenancyError {
    #[error("Tenant not found: {0}")]
    NotFound(String),

    #[error("Invalid tenant data: {0}")]
    Invalid(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Event dispatch failed: {0}")]
    Events(#[from] EventBusError),

    /// A migrate or seed step failed; raised after its failure event was emitted.
    #[error("{step} failed for tenant {tenant}: {error}")]
    StepFailed {
        step: &'static str,
        tenant: String,
        error: String,
    },
}

/// Errors raised by database drivers and migration runners.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Runner failed to start: {0}")]
    Runner(String),
}

//! Tenant persistence
//!
//! The central database is an external collaborator; [`TenantStore`] is the
//! narrow interface the rest of the crate queries it through.

use crate::error::{Result, TenancyError};
use crate::tenant::{Domain, Tenant};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tenantry_config::ModelBindings;

/// Tenant store trait (implement with your database)
#[async_trait]
pub trait TenantStore: Send + Sync {
    /// Find tenant by ID
    async fn find_by_id(&self, id: &str) -> Result<Option<Tenant>>;

    /// Find tenant by slug
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Tenant>>;

    /// Find the domain record for an exact, lower-cased host
    async fn find_domain(&self, host: &str) -> Result<Option<Domain>>;

    /// All domain records owned by a tenant
    async fn domains_for(&self, tenant_id: &str) -> Result<Vec<Domain>>;

    async fn insert_tenant(&self, tenant: &Tenant) -> Result<()>;

    async fn insert_domain(&self, domain: &Domain) -> Result<()>;

    /// Delete a tenant together with its domain records.
    async fn delete_tenant(&self, id: &str) -> Result<Option<Tenant>>;
}

/// In-memory tenant store (for testing)
///
/// Counts every lookup so callers can assert how often the store was hit.
#[derive(Default)]
pub struct InMemoryTenantStore {
    bindings: ModelBindings,
    tenants: RwLock<HashMap<String, Tenant>>,
    domains: RwLock<HashMap<String, Domain>>,
    lookups: AtomicUsize,
}

impl InMemoryTenantStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the configured table names in error messages.
    pub fn with_bindings(bindings: ModelBindings) -> Self {
        Self {
            bindings,
            ..Self::default()
        }
    }

    /// Number of `find_*` calls served so far.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn tenant_count(&self) -> usize {
        self.tenants.read().len()
    }

    fn count(&self) {
        self.lookups.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl TenantStore for InMemoryTenantStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<Tenant>> {
        self.count();
        Ok(self.tenants.read().get(id).cloned())
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Tenant>> {
        self.count();
        Ok(self
            .tenants
            .read()
            .values()
            .find(|t| t.slug == slug)
            .cloned())
    }

    async fn find_domain(&self, host: &str) -> Result<Option<Domain>> {
        self.count();
        Ok(self.domains.read().get(host).cloned())
    }

    async fn domains_for(&self, tenant_id: &str) -> Result<Vec<Domain>> {
        self.count();
        let mut domains: Vec<_> = self
            .domains
            .read()
            .values()
            .filter(|d| d.tenant_id == tenant_id)
            .cloned()
            .collect();
        domains.sort_by(|a, b| a.domain.cmp(&b.domain));
        Ok(domains)
    }

    async fn insert_tenant(&self, tenant: &Tenant) -> Result<()> {
        let mut tenants = self.tenants.write();
        if tenants.contains_key(&tenant.id) || tenants.values().any(|t| t.slug == tenant.slug) {
            return Err(TenancyError::Storage(format!(
                "duplicate key in {}: {}",
                self.bindings.tenant_table, tenant.slug
            )));
        }
        tenants.insert(tenant.id.clone(), tenant.clone());
        Ok(())
    }

    async fn insert_domain(&self, domain: &Domain) -> Result<()> {
        if !self.tenants.read().contains_key(&domain.tenant_id) {
            return Err(TenancyError::Storage(format!(
                "{}.tenant_id references missing tenant {}",
                self.bindings.domain_table, domain.tenant_id
            )));
        }

        let mut domains = self.domains.write();
        if domains.contains_key(&domain.domain) {
            return Err(TenancyError::Storage(format!(
                "duplicate key in {}: {}",
                self.bindings.domain_table, domain.domain
            )));
        }
        domains.insert(domain.domain.clone(), domain.clone());
        Ok(())
    }

    async fn delete_tenant(&self, id: &str) -> Result<Option<Tenant>> {
        let removed = self.tenants.write().remove(id);
        if removed.is_some() {
            self.domains.write().retain(|_, d| d.tenant_id != id);
        }
        Ok(removed)
    }
}

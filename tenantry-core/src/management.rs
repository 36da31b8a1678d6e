//! Tenant management
//!
//! Creating and deleting tenants, with the provisioning and cache
//! bookkeeping that goes with it.

use crate::error::{Result, TenancyError};
use crate::events::TenancyEvent;
use crate::provisioning::ProvisioningPipeline;
use crate::resolver::{DomainResolver, normalize_host};
use crate::store::TenantStore;
use crate::tenant::{Domain, Tenant};
use std::collections::HashMap;
use std::sync::Arc;
use tenantry_config::{ConfigValidator, TenancyConfig};
use tracing::info;

/// Request to create a new tenant
#[derive(Debug, Clone)]
pub struct CreateTenantRequest {
    /// Unique slug/identifier (URL-safe)
    pub slug: String,
    /// Display name
    pub display_name: Option<String>,
    /// Custom domain (optional)
    pub domain: Option<String>,
    /// Explicit database name
    pub database: Option<String>,
    /// Initial metadata
    pub metadata: HashMap<String, String>,
}

impl CreateTenantRequest {
    /// Create a new tenant request
    pub fn new(slug: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            display_name: None,
            domain: None,
            database: None,
            metadata: HashMap::new(),
        }
    }

    /// Set display name
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Set custom domain
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Add metadata
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Tenant lifecycle manager
pub struct TenantManager {
    config: Arc<TenancyConfig>,
    store: Arc<dyn TenantStore>,
    resolver: Arc<DomainResolver>,
    pipeline: ProvisioningPipeline,
}

impl TenantManager {
    pub fn new(
        store: Arc<dyn TenantStore>,
        resolver: Arc<DomainResolver>,
        pipeline: ProvisioningPipeline,
    ) -> Self {
        Self {
            config: pipeline.config().clone(),
            store,
            resolver,
            pipeline,
        }
    }

    pub fn pipeline(&self) -> &ProvisioningPipeline {
        &self.pipeline
    }

    /// Persist a new tenant and start provisioning it.
    ///
    /// The tenant is stored before provisioning starts; an inline migrate or
    /// seed failure is returned but does not remove it.
    pub async fn create(&self, request: CreateTenantRequest) -> Result<Tenant> {
        let slug = request.slug.trim().to_ascii_lowercase();
        ConfigValidator::is_label(&slug, "slug").map_err(|e| TenancyError::Invalid(e.to_string()))?;

        if self.config.is_reserved(&slug) {
            return Err(TenancyError::Invalid(format!("Tenant slug '{}' is reserved", slug)));
        }
        if self.store.find_by_slug(&slug).await?.is_some() {
            return Err(TenancyError::Invalid(format!(
                "Tenant slug '{}' already exists",
                slug
            )));
        }

        let domain = match &request.domain {
            Some(host) => {
                let host = normalize_host(host);
                ConfigValidator::is_host(&host, "domain")
                    .map_err(|e| TenancyError::Invalid(e.to_string()))?;
                if self.config.is_central_domain(&host) || self.store.find_domain(&host).await?.is_some() {
                    return Err(TenancyError::Invalid(format!("Domain '{}' is not available", host)));
                }
                Some(host)
            }
            None => None,
        };

        let id = uuid::Uuid::new_v4().to_string();
        let mut tenant = Tenant::new(&id, &slug);
        tenant.name = request.display_name;
        tenant.database = request.database;
        tenant.metadata = request.metadata;

        self.store.insert_tenant(&tenant).await?;
        if let Some(host) = &domain {
            self.store.insert_domain(&Domain::new(host, &id)).await?;
            self.resolver.forget(host).await?;
        }
        // A lookup cached before the tenant existed would hide it.
        self.resolver.forget(&self.subdomain_host(&slug)).await?;

        info!(tenant_id = %id, slug = %slug, "Created tenant");

        self.pipeline
            .dispatch(TenancyEvent::tenant_created(tenant.clone()))
            .await?;

        Ok(tenant)
    }

    /// Attach another custom domain to a tenant.
    pub async fn add_domain(&self, tenant_id: &str, host: &str) -> Result<Domain> {
        let tenant = self
            .store
            .find_by_id(tenant_id)
            .await?
            .ok_or_else(|| TenancyError::NotFound(tenant_id.to_string()))?;

        let host = normalize_host(host);
        ConfigValidator::is_host(&host, "domain").map_err(|e| TenancyError::Invalid(e.to_string()))?;
        if self.config.is_central_domain(&host) {
            return Err(TenancyError::Invalid(format!("Domain '{}' is not available", host)));
        }

        let domain = Domain::new(&host, &tenant.id);
        self.store.insert_domain(&domain).await?;
        self.resolver.forget(&host).await?;
        Ok(domain)
    }

    /// Delete a tenant, its database and its domains.
    ///
    /// The database step runs (or is queued) first, while the tenant is
    /// still in the store.
    pub async fn delete(&self, tenant_id: &str) -> Result<Tenant> {
        let tenant = self
            .store
            .find_by_id(tenant_id)
            .await?
            .ok_or_else(|| TenancyError::NotFound(tenant_id.to_string()))?;

        self.pipeline.delete(&tenant).await?;

        let domains = self.store.domains_for(&tenant.id).await?;
        self.store.delete_tenant(&tenant.id).await?;

        for domain in &domains {
            self.resolver.forget(&domain.domain).await?;
        }
        self.resolver.forget(&self.subdomain_host(&tenant.slug)).await?;

        info!(tenant_id = %tenant.id, slug = %tenant.slug, "Deleted tenant");
        Ok(tenant)
    }

    fn subdomain_host(&self, slug: &str) -> String {
        format!("{}.{}", slug, self.config.base_domain)
    }
}

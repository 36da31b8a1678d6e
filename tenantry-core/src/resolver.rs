//! Domain resolution
//!
//! Maps an inbound host to a [`Resolution`]. Central hosts never carry a
//! tenant, reserved subdomains never resolve even when a tenant with that
//! slug exists, and everything else is looked up by exact domain first and
//! by slug second.

use crate::error::Result;
use crate::store::TenantStore;
use crate::tenant::Tenant;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tenantry_cache::{CacheManager, CacheStore};
use tenantry_config::TenancyConfig;
use tracing::{debug, trace, warn};

/// Outcome of resolving a host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Tenant(Tenant),
    /// Central host, or the bare base domain
    NoTenant,
    /// Subdomain on the reserved list
    Reserved(String),
    /// Subdomain (or custom host) with no active tenant behind it
    NotFound(String),
}

impl Resolution {
    pub fn tenant(&self) -> Option<&Tenant> {
        match self {
            Resolution::Tenant(tenant) => Some(tenant),
            _ => None,
        }
    }
}

/// Cached lookup result. Wrapped so a negative result is still a cache hit.
#[derive(Debug, Serialize, Deserialize)]
struct CachedLookup {
    tenant: Option<Tenant>,
}

/// Where a normalized host sits relative to the configured domains.
#[derive(Debug, PartialEq, Eq)]
enum HostKind<'a> {
    Central,
    Subdomain(&'a str),
    Custom,
}

/// Host-based tenant resolver with an optional lookup cache.
pub struct DomainResolver {
    config: Arc<TenancyConfig>,
    store: Arc<dyn TenantStore>,
    cache: Option<CacheManager>,
    base_domain: String,
}

impl DomainResolver {
    /// Create a resolver without a cache.
    pub fn new(config: Arc<TenancyConfig>, store: Arc<dyn TenantStore>) -> Self {
        let base_domain = normalize_host(&config.base_domain);
        Self {
            config,
            store,
            cache: None,
            base_domain,
        }
    }

    /// Cache lookups in `cache`, unless caching is disabled in the config.
    pub fn with_cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        if self.config.cache.enabled {
            self.cache = Some(CacheManager::new(cache).namespace(&self.config.cache.prefix));
        }
        self
    }

    pub fn is_cached(&self) -> bool {
        self.cache.is_some()
    }

    /// Resolve a raw host (as found in a `Host` header).
    pub async fn resolve(&self, host: &str) -> Result<Resolution> {
        let host = normalize_host(host);

        let resolution = match self.classify(&host) {
            HostKind::Central => Resolution::NoTenant,
            HostKind::Subdomain(sub) if self.config.is_reserved(sub) => {
                Resolution::Reserved(sub.to_string())
            }
            HostKind::Subdomain(sub) => {
                // Multi-level subdomains can only match a domain record.
                let slug = (!sub.contains('.')).then_some(sub);
                match self.lookup(&host, slug).await? {
                    Some(tenant) if tenant.active => Resolution::Tenant(tenant),
                    _ => Resolution::NotFound(sub.to_string()),
                }
            }
            HostKind::Custom => match self.lookup(&host, None).await? {
                Some(tenant) if tenant.active => Resolution::Tenant(tenant),
                _ => Resolution::NotFound(host.clone()),
            },
        };

        trace!(host = %host, resolution = ?resolution, "Resolved host");
        Ok(resolution)
    }

    /// Drop the cached lookup for `host`.
    pub async fn forget(&self, host: &str) -> Result<()> {
        if let Some(cache) = &self.cache {
            let host = normalize_host(host);
            debug!(host = %host, "Forgetting cached tenant lookup");
            cache.forget(&host).await?;
        }
        Ok(())
    }

    fn classify<'a>(&self, host: &'a str) -> HostKind<'a> {
        if host.is_empty() || self.config.is_central_domain(host) || host == self.base_domain {
            return HostKind::Central;
        }

        match host
            .strip_suffix(self.base_domain.as_str())
            .and_then(|rest| rest.strip_suffix('.'))
        {
            Some(sub) => {
                let sub = sub.trim_matches('.');
                if sub.is_empty() {
                    HostKind::Central
                } else {
                    HostKind::Subdomain(sub)
                }
            }
            None => HostKind::Custom,
        }
    }

    async fn lookup(&self, host: &str, slug: Option<&str>) -> Result<Option<Tenant>> {
        match &self.cache {
            Some(cache) => {
                let cached: CachedLookup = cache
                    .remember(host, self.config.cache_ttl(), || async {
                        Ok::<_, crate::TenancyError>(CachedLookup {
                            tenant: self.query(host, slug).await?,
                        })
                    })
                    .await?;
                Ok(cached.tenant)
            }
            None => self.query(host, slug).await,
        }
    }

    async fn query(&self, host: &str, slug: Option<&str>) -> Result<Option<Tenant>> {
        if let Some(domain) = self.store.find_domain(host).await? {
            match self.store.find_by_id(&domain.tenant_id).await? {
                Some(tenant) => return Ok(Some(tenant)),
                None => warn!(
                    host = %host,
                    tenant_id = %domain.tenant_id,
                    "Domain record points at a missing tenant"
                ),
            }
        }

        match slug {
            Some(slug) => self.store.find_by_slug(slug).await,
            None => Ok(None),
        }
    }
}

/// Lower-case, trim, and strip a `:port` suffix and a trailing dot.
pub fn normalize_host(host: &str) -> String {
    let host = host.trim();
    let host = match host.strip_prefix('[') {
        // IPv6 literal, port follows the closing bracket
        Some(rest) => rest.split(']').next().unwrap_or(rest),
        None => host.split(':').next().unwrap_or(host),
    };
    host.trim_end_matches('.').to_ascii_lowercase()
}

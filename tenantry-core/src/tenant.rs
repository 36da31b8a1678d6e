//! Tenant and domain records
//!
//! Both live in the central database. A tenant owns any number of
//! [`Domain`] records; each domain maps exactly one host to one tenant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tenant information
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tenant {
    /// Unique tenant identifier
    pub id: String,

    /// URL-safe slug, also the default subdomain
    pub slug: String,

    /// Display name
    pub name: Option<String>,

    /// Explicit database name, overriding the configured naming scheme
    pub database: Option<String>,

    /// Whether tenant is active
    pub active: bool,

    /// Additional metadata
    pub metadata: HashMap<String, String>,

    pub created_at: DateTime<Utc>,
}

impl Tenant {
    /// Create a new tenant
    ///
    /// # Examples
    ///
    /// ```
    /// use tenantry_core::Tenant;
    ///
    /// let tenant = Tenant::new("tenant-123", "acme");
    /// assert!(tenant.active);
    /// ```
    pub fn new(id: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            slug: slug.into(),
            name: None,
            database: None,
            active: true,
            metadata: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    /// Set display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set database name
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set active status
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Add metadata
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Display name, falling back to the slug.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.slug)
    }
}

/// A fully-qualified host owned by a tenant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Domain {
    pub domain: String,
    pub tenant_id: String,
}

impl Domain {
    /// The host is stored lower-cased.
    pub fn new(domain: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            domain: domain.into().to_ascii_lowercase(),
            tenant_id: tenant_id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenant_builder() {
        let tenant = Tenant::new("t-1", "acme")
            .with_name("Acme Corp")
            .with_database("acme_db")
            .with_metadata("plan", "pro");

        assert_eq!(tenant.display_name(), "Acme Corp");
        assert_eq!(tenant.database.as_deref(), Some("acme_db"));
        assert_eq!(tenant.metadata.get("plan"), Some(&"pro".to_string()));

        let inactive = Tenant::new("t-2", "globex").with_active(false);
        assert!(!inactive.active);
        assert_eq!(inactive.display_name(), "globex");
    }

    #[test]
    fn test_domain_is_lowercased() {
        let domain = Domain::new("Shop.Acme.COM", "t-1");
        assert_eq!(domain.domain, "shop.acme.com");
    }
}

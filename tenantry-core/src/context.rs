//! Per-request tenancy context
//!
//! A [`TenancyContext`] is an explicit value owned by one request or job.
//! It holds at most one active tenant connection; when none is active,
//! queries go to the central connection.
//!
//! [`TenancyScope`] activates a tenant for as long as it is alive and
//! restores the previous state when dropped, on every exit path.

use crate::tenant::Tenant;
use serde::{Deserialize, Serialize};
use std::ops::Deref;
use tracing::debug;

/// Connection a tenant's queries are routed through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantConnection {
    /// Connection name
    pub name: String,

    /// Physical database behind it
    pub database: String,
}

#[derive(Debug, Clone)]
struct Active {
    tenant: Tenant,
    connection: TenantConnection,
}

/// Tenancy state of a single request or job.
#[derive(Debug, Clone)]
pub struct TenancyContext {
    central_connection: String,
    active: Option<Active>,
}

impl TenancyContext {
    /// Create an uninitialized context.
    pub fn new(central_connection: impl Into<String>) -> Self {
        Self {
            central_connection: central_connection.into(),
            active: None,
        }
    }

    /// Activate `tenant` on `connection`.
    ///
    /// Returns `false` when that tenant is already active on that connection,
    /// in which case nothing changes.
    pub fn initialize(&mut self, tenant: Tenant, connection: TenantConnection) -> bool {
        if let Some(active) = &self.active
            && active.tenant.id == tenant.id
            && active.connection == connection
        {
            return false;
        }

        debug!(
            tenant_id = %tenant.id,
            connection = %connection.name,
            database = %connection.database,
            previous = self.active.as_ref().map(|a| a.tenant.id.as_str()),
            "Tenancy initialized"
        );
        self.active = Some(Active { tenant, connection });
        true
    }

    /// Deactivate the current tenant, returning it. No-op when uninitialized.
    pub fn end(&mut self) -> Option<Tenant> {
        let previous = self.active.take().map(|active| active.tenant);
        if let Some(tenant) = &previous {
            debug!(tenant_id = %tenant.id, "Tenancy ended");
        }
        previous
    }

    pub fn is_initialized(&self) -> bool {
        self.active.is_some()
    }

    pub fn tenant(&self) -> Option<&Tenant> {
        self.active.as_ref().map(|active| &active.tenant)
    }

    pub fn connection(&self) -> Option<&TenantConnection> {
        self.active.as_ref().map(|active| &active.connection)
    }

    /// Name of the connection queries should use right now.
    pub fn connection_name(&self) -> &str {
        self.connection()
            .map_or(self.central_connection.as_str(), |c| c.name.as_str())
    }

    pub fn central_connection(&self) -> &str {
        &self.central_connection
    }

    fn take(&mut self) -> Option<Active> {
        self.active.take()
    }

    fn restore(&mut self, active: Option<Active>) {
        self.active = active;
    }
}

/// Guard that keeps a tenant active until dropped.
///
/// Whatever was active before the scope is restored afterwards, so scopes
/// nest.
pub struct TenancyScope<'a> {
    context: &'a mut TenancyContext,
    previous: Option<Active>,
}

impl<'a> TenancyScope<'a> {
    pub fn enter(
        context: &'a mut TenancyContext,
        tenant: Tenant,
        connection: TenantConnection,
    ) -> Self {
        let previous = context.take();
        context.initialize(tenant, connection);
        Self { context, previous }
    }
}

impl Deref for TenancyScope<'_> {
    type Target = TenancyContext;

    fn deref(&self) -> &TenancyContext {
        self.context
    }
}

impl Drop for TenancyScope<'_> {
    fn drop(&mut self) {
        self.context.end();
        self.context.restore(self.previous.take());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection(db: &str) -> TenantConnection {
        TenantConnection {
            name: "tenant".to_string(),
            database: db.to_string(),
        }
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let mut ctx = TenancyContext::new("central");
        let acme = Tenant::new("t-1", "acme");

        assert!(ctx.initialize(acme.clone(), connection("tenant_t-1")));
        assert!(!ctx.initialize(acme, connection("tenant_t-1")));
        assert_eq!(ctx.connection(), Some(&connection("tenant_t-1")));
        assert_eq!(ctx.connection_name(), "tenant");
    }

    #[test]
    fn test_switch_and_end() {
        let mut ctx = TenancyContext::new("central");
        assert_eq!(ctx.end(), None);
        assert_eq!(ctx.connection_name(), "central");

        ctx.initialize(Tenant::new("t-1", "acme"), connection("tenant_t-1"));
        assert!(ctx.initialize(Tenant::new("t-2", "globex"), connection("tenant_t-2")));
        assert_eq!(ctx.tenant().map(|t| t.slug.as_str()), Some("globex"));

        let ended = ctx.end();
        assert_eq!(ended.map(|t| t.id), Some("t-2".to_string()));
        assert!(!ctx.is_initialized());
        assert_eq!(ctx.connection_name(), "central");
    }

    #[test]
    fn test_scope_restores_previous_state() {
        let mut ctx = TenancyContext::new("central");
        ctx.initialize(Tenant::new("t-1", "acme"), connection("tenant_t-1"));

        {
            let scope = TenancyScope::enter(
                &mut ctx,
                Tenant::new("t-2", "globex"),
                connection("tenant_t-2"),
            );
            assert_eq!(scope.tenant().map(|t| t.id.as_str()), Some("t-2"));
        }

        assert_eq!(ctx.tenant().map(|t| t.id.as_str()), Some("t-1"));

        ctx.end();
        {
            let _scope =
                TenancyScope::enter(&mut ctx, Tenant::new("t-3", "initech"), connection("x"));
        }
        assert!(!ctx.is_initialized());
    }

    #[test]
    fn test_scope_released_on_panic() {
        let mut ctx = TenancyContext::new("central");

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _scope =
                TenancyScope::enter(&mut ctx, Tenant::new("t-1", "acme"), connection("x"));
            panic!("request handler blew up");
        }));

        assert!(result.is_err());
        assert!(!ctx.is_initialized());
    }
}

//! Request gate
//!
//! The framework-facing end of tenancy: resolve the request host, run the
//! handler with the tenant's connection active, and always return the
//! context to the central connection afterwards.
//!
//! ```rust,ignore
//! let gate = TenancyGate::new(resolver, manager);
//! let mut ctx = manager.context();
//!
//! let body = gate
//!     .handle(&mut ctx, request.host(), |ctx| {
//!         Box::pin(async move { render(ctx.tenant()).await })
//!     })
//!     .await
//!     .unwrap_or_else(|e| error_page(e.status_code()));
//! ```

use crate::context::TenancyContext;
use crate::database::MultiDatabaseManager;
use crate::error::TenancyError;
use crate::resolver::{DomainResolver, Resolution, normalize_host};
use futures::future::BoxFuture;
use std::sync::Arc;
use tracing::{debug, error};

/// Why a request did not reach its handler.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// Reserved subdomain, sent to the central site
    #[error("Redirect to {location}")]
    Redirect { location: String },

    #[error("No tenant for {host}")]
    NotFound { host: String },

    #[error(transparent)]
    Infrastructure(#[from] TenancyError),
}

impl GateError {
    /// HTTP status for this outcome.
    pub fn status_code(&self) -> u16 {
        match self {
            GateError::Redirect { .. } => 302,
            GateError::NotFound { .. } => 404,
            GateError::Infrastructure(_) => 500,
        }
    }
}

/// Tenancy middleware.
pub struct TenancyGate {
    resolver: Arc<DomainResolver>,
    manager: Arc<MultiDatabaseManager>,
    tenant_only: bool,
}

impl TenancyGate {
    pub fn new(resolver: Arc<DomainResolver>, manager: Arc<MultiDatabaseManager>) -> Self {
        Self {
            resolver,
            manager,
            tenant_only: false,
        }
    }

    /// Reject central hosts with 404 instead of serving them without a
    /// tenant.
    pub fn tenant_only(mut self, tenant_only: bool) -> Self {
        self.tenant_only = tenant_only;
        self
    }

    /// Resolve `host` and run `next` in the matching context.
    pub async fn handle<F, T>(
        &self,
        ctx: &mut TenancyContext,
        host: &str,
        next: F,
    ) -> Result<T, GateError>
    where
        F: for<'c> FnOnce(&'c TenancyContext) -> BoxFuture<'c, T>,
    {
        // Whatever a previous request left behind is dropped here.
        self.manager.end(ctx);

        let resolution = self.resolver.resolve(host).await.inspect_err(|e| {
            error!(host = %host, error = %e, "Tenant resolution failed");
        })?;

        match resolution {
            Resolution::Tenant(tenant) => {
                let scope = self.manager.enter(ctx, &tenant);
                Ok(next(&*scope).await)
            }
            Resolution::NoTenant if !self.tenant_only => Ok(next(&*ctx).await),
            Resolution::NoTenant => {
                debug!(host = %host, "Central host on a tenant-only route");
                Err(GateError::NotFound {
                    host: normalize_host(host),
                })
            }
            Resolution::Reserved(subdomain) => {
                debug!(subdomain = %subdomain, "Reserved subdomain, redirecting");
                Err(GateError::Redirect {
                    location: self.central_location(),
                })
            }
            Resolution::NotFound(host) => Err(GateError::NotFound { host }),
        }
    }

    fn central_location(&self) -> String {
        let config = self.manager.config();
        let host = config
            .central_domains
            .first()
            .unwrap_or(&config.base_domain);
        format!("https://{host}/")
    }
}

//! Cache layer for tenant lookups.
//!
//! [`CacheStore`] is the backend seam; [`InMemoryCache`] is the bundled
//! process-local backend and [`CacheManager`] adds typed access, key
//! namespacing and `remember`.
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tenantry_cache::{CacheError, CacheManager, InMemoryCache};
//!
//! # async fn example() -> Result<(), CacheError> {
//! let cache = CacheManager::new(Arc::new(InMemoryCache::new())).namespace("tenancy:domain:");
//!
//! let id: String = cache
//!     .remember("acme.example.com", Duration::from_secs(3600), || async {
//!         Ok::<_, CacheError>("tenant-1".to_string())
//!     })
//!     .await?;
//! assert_eq!(id, "tenant-1");
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod manager;
pub mod memory;
pub mod traits;

pub use error::{CacheError, CacheResult};
pub use manager::CacheManager;
pub use memory::{DEFAULT_MAX_ENTRIES, InMemoryCache};
pub use traits::CacheStore;

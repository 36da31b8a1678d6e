//! In-process event bus.
//!
//! Events are plain types implementing [`Event`]. Listeners subscribe per
//! event type, optionally narrowed to a single event name, and `publish`
//! returns once every matching listener has run.
//!
//! ```rust,ignore
//! use tenantry_events::*;
//!
//! let bus = EventBus::new();
//!
//! bus.on_named("tenancy.database_created", |event: TenancyEvent| async move {
//!     tracing::info!(tenant = %event.tenant.id, "database ready");
//!     Ok(())
//! });
//!
//! bus.publish(event).await?;
//! ```
//!
//! Listeners run concurrently and failures are only logged unless the bus
//! is configured otherwise:
//!
//! ```rust,ignore
//! let bus = EventBus::with_config(EventBusConfig::sequential().fail_fast());
//! ```

pub mod bus;
pub mod event;

pub use bus::{EventBus, EventBusConfig, EventBusError};
pub use event::{Event, EventMetadata, FnListener, Listener, ListenerError};

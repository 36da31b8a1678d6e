//! Tenant database provisioning
//!
//! Creating a tenant publishes `TenantCreated`; from there the pipeline
//! creates the database, migrates it and seeds it, each step gated by its
//! own configuration switch and run either inline or on a queue.
//!
//! ```rust,ignore
//! let pipeline = ProvisioningPipeline::new(manager, bus);
//!
//! // queued steps need a worker
//! let mut worker = Worker::new(pipeline.queue().clone());
//! pipeline.register_jobs(&mut worker)?;
//! worker.start().await?;
//!
//! pipeline.dispatch(TenancyEvent::tenant_created(tenant)).await?;
//! ```

mod jobs;
mod pipeline;
mod state;

pub use jobs::ProvisioningJob;
pub use pipeline::ProvisioningPipeline;
pub use state::{ProvisioningState, ProvisioningStep, plan};

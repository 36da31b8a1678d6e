//! Queued provisioning steps
//!
//! A queued step is a [`Job`] whose type names the step and whose payload is
//! a [`ProvisioningJob`]. Attempts that fail are retried with backoff by the
//! worker; once retries run out the step's failure event is published, once.

use super::pipeline::ProvisioningPipeline;
use super::state::ProvisioningStep;
use crate::database::MigrateOptions;
use crate::error::{Result, TenancyError};
use crate::events::{TenancyEvent, TenancyEventKind};
use crate::tenant::Tenant;
use serde::{Deserialize, Serialize};
use tenantry_config::TenancyConfig;
use tenantry_events::EventMetadata;
use tenantry_queue::{Job, QueueError, QueueResult, Worker};
use tracing::{error, warn};

/// Payload of a queued provisioning step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisioningJob {
    pub tenant: Tenant,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<MigrateOptions>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seeder: Option<String>,

    /// Event that triggered the step, for correlation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<EventMetadata>,
}

impl ProvisioningJob {
    pub fn new(tenant: Tenant) -> Self {
        Self {
            tenant,
            options: None,
            seeder: None,
            cause: None,
        }
    }

    pub fn with_options(mut self, options: MigrateOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Job for `step`, planned in reaction to `event`.
    pub(crate) fn planned(step: ProvisioningStep, event: &TenancyEvent, config: &TenancyConfig) -> Self {
        let mut job = Self::new(event.tenant.clone());
        job.cause = Some(event.metadata.clone());
        match step {
            ProvisioningStep::Migrate => job.options = Some(MigrateOptions::from_config(config)),
            ProvisioningStep::Seed => job.seeder = config.provisioning.seeder.clone(),
            ProvisioningStep::CreateDatabase | ProvisioningStep::Delete => {}
        }
        job
    }

    /// Outcome event, linked to the cause when there is one.
    pub fn outcome(&self, kind: TenancyEventKind) -> TenancyEvent {
        match &self.cause {
            Some(cause) => TenancyEvent::caused_by(self.tenant.clone(), kind, cause),
            None => TenancyEvent::new(self.tenant.clone(), kind),
        }
    }
}

impl ProvisioningPipeline {
    /// Register a handler and a failed callback for every step on `worker`.
    ///
    /// The worker must be stopped.
    pub fn register_jobs(&self, worker: &mut Worker) -> QueueResult<()> {
        for step in ProvisioningStep::ALL {
            let pipeline = self.clone();
            worker.register_handler(step.job_type(), move |job| {
                let pipeline = pipeline.clone();
                async move {
                    pipeline
                        .run_job(step, &job)
                        .await
                        .map_err(|e| QueueError::ExecutionFailed(e.to_string()))
                }
            })?;

            let pipeline = self.clone();
            worker.on_failed(step.job_type(), move |job, error| {
                let pipeline = pipeline.clone();
                async move { pipeline.job_exhausted(step, &job, error).await }
            })?;
        }
        Ok(())
    }

    /// One attempt. A failed step is an error so the worker retries it; a
    /// successful one continues the lifecycle.
    ///
    /// Once the step succeeded the job succeeds. Errors while publishing the
    /// outcome or queueing the next step are logged, never retried as this
    /// step.
    async fn run_job(&self, step: ProvisioningStep, job: &Job) -> Result<()> {
        let payload: ProvisioningJob = job.payload()?;

        if self.skips_deleted(step, &payload.tenant) {
            return Ok(());
        }

        let kind = self.perform(step, &payload).await;
        if let Some(error) = kind.error() {
            warn!(
                job_id = %job.id,
                step = %step,
                tenant_id = %payload.tenant.id,
                attempt = job.attempts,
                max_attempts = job.max_attempts,
                "Provisioning job attempt failed"
            );
            return Err(TenancyError::StepFailed {
                step: step.as_str(),
                tenant: payload.tenant.id.clone(),
                error: error.to_string(),
            });
        }

        if let Err(e) = self.dispatch(payload.outcome(kind)).await {
            error!(
                job_id = %job.id,
                step = %step,
                tenant_id = %payload.tenant.id,
                error = %e,
                "Provisioning step succeeded but the lifecycle could not continue"
            );
        }
        Ok(())
    }

    async fn job_exhausted(&self, step: ProvisioningStep, job: &Job, error: String) {
        let payload: ProvisioningJob = match job.payload() {
            Ok(payload) => payload,
            Err(e) => {
                error!(job_id = %job.id, error = %e, "Unreadable provisioning job payload");
                return;
            }
        };

        error!(
            job_id = %job.id,
            step = %step,
            tenant_id = %payload.tenant.id,
            attempts = job.attempts,
            error = %error,
            "Provisioning job gave up"
        );

        if let Err(e) = self.emit(&payload.outcome(step.failure(error))).await {
            error!(job_id = %job.id, error = %e, "Failed to publish provisioning failure");
        }
    }
}

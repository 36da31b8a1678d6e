//! Provisioning pipeline

use super::jobs::ProvisioningJob;
use super::state::{ProvisioningState, ProvisioningStep, plan};
use crate::database::{MigrateOptions, MultiDatabaseManager};
use crate::error::{Result, TenancyError};
use crate::events::{TenancyEvent, TenancyEventKind};
use crate::tenant::Tenant;
use dashmap::DashMap;
use std::sync::Arc;
use tenantry_config::TenancyConfig;
use tenantry_events::EventBus;
use tenantry_queue::{Job, Queue, QueueError};
use tracing::{debug, error, info};

/// Drives tenants through create, migrate and seed.
///
/// Each event is published on the bus, recorded as the tenant's state, then
/// handed to [`plan`]. A planned step runs inline, or as a queued job when
/// `provisioning.queue` is set, and its outcome event goes through the same
/// loop.
#[derive(Clone)]
pub struct ProvisioningPipeline {
    config: Arc<TenancyConfig>,
    manager: Arc<MultiDatabaseManager>,
    events: EventBus,
    queue: Queue,
    states: Arc<DashMap<String, ProvisioningState>>,
}

impl ProvisioningPipeline {
    /// Queued steps go to a queue named `provisioning.queue_name`.
    pub fn new(manager: Arc<MultiDatabaseManager>, events: EventBus) -> Self {
        let config = manager.config().clone();
        let queue = Queue::new(&config.provisioning.queue_name);
        Self {
            config,
            manager,
            events,
            queue,
            states: Arc::new(DashMap::new()),
        }
    }

    /// Use an existing queue for queued steps.
    pub fn with_queue(mut self, queue: Queue) -> Self {
        self.queue = queue;
        self
    }

    pub fn config(&self) -> &Arc<TenancyConfig> {
        &self.config
    }

    pub fn manager(&self) -> &Arc<MultiDatabaseManager> {
        &self.manager
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    /// Last recorded state of a tenant.
    pub fn state(&self, tenant_id: &str) -> Option<ProvisioningState> {
        self.states.get(tenant_id).map(|state| *state)
    }

    /// Publish `event` and run whatever it triggers.
    ///
    /// Inline migrate and seed failures are returned after their failure
    /// event was published; every other step failure is only an event.
    /// Nothing is planned for a deleted tenant.
    pub async fn dispatch(&self, event: TenancyEvent) -> Result<()> {
        let mut event = event;
        loop {
            if self.emit(&event).await? == ProvisioningState::Deleted {
                return Ok(());
            }

            let Some(step) = plan(&self.config, &event.kind) else {
                return Ok(());
            };
            let job = ProvisioningJob::planned(step, &event, &self.config);

            match self.execute(step, job).await? {
                Some(next) => event = next,
                None => return Ok(()),
            }
        }
    }

    /// Create the tenant's database now (or queue it).
    pub async fn create_database(&self, tenant: &Tenant) -> Result<()> {
        if !self.config.is_multi_database() {
            debug!(tenant_id = %tenant.id, "Single-database mode, nothing to create");
            return Ok(());
        }
        self.trigger(ProvisioningStep::CreateDatabase, ProvisioningJob::new(tenant.clone()))
            .await
    }

    /// Migrate the tenant's database, with the configured defaults if no
    /// options are given.
    pub async fn migrate(&self, tenant: &Tenant, options: Option<MigrateOptions>) -> Result<()> {
        let options = options.unwrap_or_else(|| MigrateOptions::from_config(&self.config));
        let job = ProvisioningJob::new(tenant.clone()).with_options(options);
        self.trigger(ProvisioningStep::Migrate, job).await
    }

    /// Seed the tenant's database with `seeder`, or the configured one.
    pub async fn seed(&self, tenant: &Tenant, seeder: Option<&str>) -> Result<()> {
        let mut job = ProvisioningJob::new(tenant.clone());
        job.seeder = seeder
            .map(String::from)
            .or_else(|| self.config.provisioning.seeder.clone());
        self.trigger(ProvisioningStep::Seed, job).await
    }

    /// Delete the tenant's database. Not blocked by forward steps in flight.
    pub async fn delete(&self, tenant: &Tenant) -> Result<()> {
        if !self.config.is_multi_database() {
            debug!(tenant_id = %tenant.id, "Single-database mode, nothing to delete");
            return Ok(());
        }
        self.trigger(ProvisioningStep::Delete, ProvisioningJob::new(tenant.clone()))
            .await
    }

    async fn trigger(&self, step: ProvisioningStep, job: ProvisioningJob) -> Result<()> {
        match self.execute(step, job).await? {
            Some(outcome) => self.dispatch(outcome).await,
            None => Ok(()),
        }
    }

    /// Run `step` inline and return its outcome event, or queue it.
    async fn execute(
        &self,
        step: ProvisioningStep,
        job: ProvisioningJob,
    ) -> Result<Option<TenancyEvent>> {
        if self.skips_deleted(step, &job.tenant) {
            return Ok(None);
        }
        if self.config.provisioning.queue {
            self.enqueue(step, &job).await?;
            return Ok(None);
        }

        let kind = self.perform(step, &job).await;
        let outcome = job.outcome(kind);

        if step.raises_on_failure()
            && let Some(error) = outcome.kind.error()
        {
            let err = TenancyError::StepFailed {
                step: step.as_str(),
                tenant: job.tenant.id.clone(),
                error: error.to_string(),
            };
            self.emit(&outcome).await?;
            return Err(err);
        }

        Ok(Some(outcome))
    }

    async fn enqueue(&self, step: ProvisioningStep, job: &ProvisioningJob) -> Result<()> {
        let data =
            serde_json::to_value(job).map_err(|e| QueueError::Serialization(e.to_string()))?;
        let queued = Job::new(self.queue.name(), step.job_type(), data)
            .with_max_attempts(self.config.provisioning.max_attempts)
            .with_metadata("tenant_id", job.tenant.id.as_str());

        let id = self.queue.enqueue_job(queued).await?;
        info!(
            job_id = %id,
            step = %step,
            tenant_id = %job.tenant.id,
            queue = self.queue.name(),
            "Queued provisioning step"
        );
        Ok(())
    }

    /// Run one step against the manager. Every failure becomes the step's
    /// failure event.
    pub(crate) async fn perform(
        &self,
        step: ProvisioningStep,
        job: &ProvisioningJob,
    ) -> TenancyEventKind {
        let tenant = &job.tenant;
        debug!(step = %step, tenant_id = %tenant.id, "Running provisioning step");

        let result = match step {
            ProvisioningStep::CreateDatabase => {
                self.manager.create_database(tenant).await.map(|created| {
                    (!created).then(|| "database could not be created".to_string())
                })
            }
            ProvisioningStep::Migrate => self.migrate_now(job).await,
            ProvisioningStep::Seed => match &job.seeder {
                Some(seeder) => self
                    .manager
                    .seed_tenant(tenant, seeder)
                    .await
                    .map(|code| exit_failure("seeder", code)),
                None => Ok(Some("no seeder configured".to_string())),
            },
            ProvisioningStep::Delete => self.manager.delete_database(tenant).await.map(|dropped| {
                (!dropped).then(|| "database could not be dropped".to_string())
            }),
        };

        match result {
            Ok(None) => step.success(),
            Ok(Some(reason)) => {
                error!(step = %step, tenant_id = %tenant.id, error = %reason, "Provisioning step failed");
                step.failure(reason)
            }
            Err(e) => {
                error!(step = %step, tenant_id = %tenant.id, error = %e, "Provisioning step failed");
                step.failure(e.to_string())
            }
        }
    }

    /// Migrations only run against a database that exists.
    async fn migrate_now(&self, job: &ProvisioningJob) -> Result<Option<String>> {
        let tenant = &job.tenant;

        if self.config.is_multi_database() && !self.manager.database_exists(tenant).await? {
            return Ok(Some(format!(
                "database {} does not exist",
                self.manager.database_name(tenant)
            )));
        }

        let options = job
            .options
            .clone()
            .unwrap_or_else(|| MigrateOptions::from_config(&self.config));
        let code = self.manager.migrate_tenant(tenant, &options).await?;
        Ok(exit_failure("migrations", code))
    }

    /// Forward steps never run for a tenant recorded as deleted.
    pub(crate) fn skips_deleted(&self, step: ProvisioningStep, tenant: &Tenant) -> bool {
        let skip = step != ProvisioningStep::Delete
            && self.state(&tenant.id) == Some(ProvisioningState::Deleted);
        if skip {
            info!(step = %step, tenant_id = %tenant.id, "Tenant deleted, skipping provisioning step");
        }
        skip
    }

    /// Record and publish one event, returning the tenant's new state.
    pub(crate) async fn emit(&self, event: &TenancyEvent) -> Result<ProvisioningState> {
        let state = {
            let mut entry = self
                .states
                .entry(event.tenant.id.clone())
                .or_insert(ProvisioningState::Requested);
            let next = entry.apply(&event.kind);
            *entry = next;
            next
        };

        debug!(
            event = event.kind.name(),
            tenant_id = %event.tenant.id,
            state = ?state,
            "Provisioning event"
        );
        self.events.publish(event.clone()).await?;
        Ok(state)
    }
}

fn exit_failure(what: &str, code: i32) -> Option<String> {
    (code != 0).then(|| format!("{what} exited with code {code}"))
}

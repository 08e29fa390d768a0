//! Job Orchestrator: picks the single mutating action for a clean pass.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use t3kton_contractor::{Contractor, Locator, ObjectKind, StructureUpdate};
use t3kton_types::{ConfigValues, Structure, TargetState};

use crate::error::cancellable;
use crate::events::emit;
use crate::{Directive, Event, EventSink, ReconcileError, ReconcileResult};

pub struct JobOrchestrator {
    contractor: Contractor,
    events: Arc<dyn EventSink>,
    job_poll_interval: Duration,
}

impl JobOrchestrator {
    pub fn new(contractor: Contractor, events: Arc<dyn EventSink>, job_poll_interval: Duration) -> Self {
        Self {
            contractor,
            events,
            job_poll_interval,
        }
    }

    /// Decides what to do with a Structure whose status is up to date.
    ///
    /// Rules are checked in order and the first match wins:
    ///
    /// 1. a job is in flight: poll again later
    /// 2. config values differ: push them
    /// 3. state and blueprint match: done
    /// 4. blueprint differs while planned: push the blueprint
    /// 5. otherwise start a create or destroy job
    #[instrument(skip_all, fields(structure = %structure.name(), id = structure.spec.id))]
    pub async fn decide(
        &self,
        structure: &Structure,
        cancel: &CancellationToken,
    ) -> ReconcileResult<Directive> {
        let spec = &structure.spec;
        let status = &structure.status;

        if status.job.is_some() {
            return Ok(Directive::RequeueAfter(self.job_poll_interval));
        }

        if !ConfigValues::equivalent(spec.config_values.as_ref(), status.config_values.as_ref()) {
            let values = spec
                .config_values
                .as_ref()
                .map(ConfigValues::to_json_map)
                .unwrap_or_default();
            self.push(spec.id, StructureUpdate::config_values(values), "update config values", cancel)
                .await?;
            return Ok(Directive::RequeueNow);
        }

        if spec.state == status.state && spec.blueprint == status.blueprint {
            emit(self.events.as_ref(), structure, Event::ReconcileComplete).await;
            info!("Reconciled Structure");
            return Ok(Directive::Stop);
        }

        if status.blueprint != spec.blueprint && status.state == TargetState::Planned.as_str() {
            let locator = Locator::of(ObjectKind::StructureBlueprint, &spec.blueprint);
            self.push(spec.id, StructureUpdate::blueprint(locator.to_string()), "update blueprint", cancel)
                .await?;
            return Ok(Directive::RequeueNow);
        }

        let target = spec
            .target_state()
            .map_err(|_| ReconcileError::InvalidTargetState(spec.state.clone()))?;
        let script = match target {
            TargetState::Built => "create",
            TargetState::Planned => "destroy",
        };

        info!(script, "job start");
        let contractor = &self.contractor;
        let job_id = cancellable(cancel, async {
            let started = match target {
                TargetState::Built => contractor.start_create_job(spec.id).await,
                TargetState::Planned => contractor.start_destroy_job(spec.id).await,
            };
            started.map_err(|e| ReconcileError::mutation(format!("start {script} job"), e))
        })
        .await?;

        emit(
            self.events.as_ref(),
            structure,
            Event::JobCreated {
                script: script.to_string(),
                job_id,
            },
        )
        .await;
        Ok(Directive::RequeueNow)
    }

    async fn push(
        &self,
        id: i64,
        update: StructureUpdate,
        action: &str,
        cancel: &CancellationToken,
    ) -> ReconcileResult<()> {
        info!(action, "Pushing structure update");
        let contractor = &self.contractor;
        cancellable(cancel, async {
            contractor
                .update_structure(id, &update)
                .await
                .map_err(|e| ReconcileError::mutation(action, e))
        })
        .await
    }
}

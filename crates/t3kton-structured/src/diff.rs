//! Diff Engine: decides whether a fresh snapshot must be persisted.

use std::sync::Arc;
use tracing::{debug, info, instrument};

use t3kton_types::{ConfigValues, Structure, StructureStatus};

use crate::events::emit;
use crate::{Directive, Event, EventSink, ReconcileError, ReconcileResult, StructureStore};

/// Per-field change set between the persisted status and a fresh snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusChanges {
    pub state: bool,
    pub blueprint: bool,
    pub hostname: bool,
    pub config_values: bool,
    pub job: bool,
    pub foundation: bool,
    pub foundation_blueprint: bool,
}

impl StatusChanges {
    pub fn between(previous: &StructureStatus, fresh: &StructureStatus) -> Self {
        Self {
            state: previous.state != fresh.state,
            blueprint: previous.blueprint != fresh.blueprint,
            hostname: previous.hostname != fresh.hostname,
            config_values: !ConfigValues::equivalent(
                previous.config_values.as_ref(),
                fresh.config_values.as_ref(),
            ),
            job: previous.job != fresh.job,
            foundation: previous.foundation != fresh.foundation,
            foundation_blueprint: previous.foundation_blueprint != fresh.foundation_blueprint,
        }
    }

    pub fn any(&self) -> bool {
        !self.fields().is_empty()
    }

    /// Names of the changed fields, in status order.
    pub fn fields(&self) -> Vec<&'static str> {
        [
            (self.state, "state"),
            (self.blueprint, "blueprint"),
            (self.hostname, "hostname"),
            (self.foundation, "foundation"),
            (self.foundation_blueprint, "foundationBluePrint"),
            (self.config_values, "configValues"),
            (self.job, "job"),
        ]
        .into_iter()
        .filter_map(|(changed, name)| changed.then_some(name))
        .collect()
    }
}

/// Whether the pass continues past the diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffOutcome {
    /// Persisted status already matches Contractor.
    Clean,
    /// The pass ends here with this directive.
    Done(Directive),
}

pub struct DiffEngine {
    store: Arc<dyn StructureStore>,
    events: Arc<dyn EventSink>,
}

impl DiffEngine {
    pub fn new(store: Arc<dyn StructureStore>, events: Arc<dyn EventSink>) -> Self {
        Self { store, events }
    }

    /// Compares `fresh` with `structure.status`, persisting when needed.
    #[instrument(skip_all, fields(structure = %structure.name()))]
    pub async fn apply(
        &self,
        structure: &Structure,
        fresh: StructureStatus,
    ) -> ReconcileResult<DiffOutcome> {
        if structure.status.job.is_some() && fresh.job.is_none() {
            info!("Job finished");
            let mut updated = structure.clone();
            updated.status.job = None;
            return self.persist(updated, Event::JobFinished).await;
        }

        let changes = StatusChanges::between(&structure.status, &fresh);
        if !changes.any() {
            debug!("No status changes");
            return Ok(DiffOutcome::Clean);
        }

        info!(changed = ?changes.fields(), "Status Changed");
        let mut updated = structure.clone();
        updated.status = fresh;
        self.persist(updated, Event::StatusChanged).await
    }

    async fn persist(&self, updated: Structure, event: Event) -> ReconcileResult<DiffOutcome> {
        match self.store.update_status(&updated).await {
            Ok(stored) => {
                emit(self.events.as_ref(), &stored, event).await;
                Ok(DiffOutcome::Done(Directive::RequeueNow))
            }
            Err(e) if e.is_conflict() => {
                info!(error = %e, "Structure Changed on us, will try again");
                Ok(DiffOutcome::Done(Directive::RequeueNow))
            }
            Err(e) => Err(ReconcileError::StatusPersist(e)),
        }
    }
}

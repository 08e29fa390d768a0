//! Reconcile harness over an in-memory Contractor.

use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use t3kton_contractor::{Contractor, MemoryTransport};
use t3kton_structured::{
    Directive, MemoryStructureStore, ReconcileResult, ReconcileSettings, Reconciler,
    RecordingEventSink,
};
use t3kton_types::{Structure, StructureSpec, StructureStatus};

use crate::fixtures::{self, RemoteStructureFixture, FOUNDATION_ID, STRUCTURE_ID};

/// First job ID handed out by the in-memory Contractor
pub const FIRST_JOB_ID: i64 = 37;

/// Everything a reconcile pass touches, held in memory
pub struct TestEnv {
    pub name: String,
    pub transport: Arc<MemoryTransport>,
    pub store: Arc<MemoryStructureStore>,
    pub events: Arc<RecordingEventSink>,
    pub reconciler: Reconciler,
    cancel: CancellationToken,
}

impl TestEnv {
    /// Structure `web01` declared with `spec`, backed by `remote`
    pub fn new(spec: StructureSpec, remote: RemoteStructureFixture) -> Self {
        let transport = Arc::new(MemoryTransport::new().with_next_job_id(FIRST_JOB_ID));
        transport.insert(fixtures::structure_uri(STRUCTURE_ID), remote.to_json());
        transport.insert(
            fixtures::foundation_uri(FOUNDATION_ID),
            fixtures::foundation(FOUNDATION_ID, "vm-base"),
        );

        let store = Arc::new(MemoryStructureStore::new());
        store.insert(fixtures::structure("web01", spec));

        let events = Arc::new(RecordingEventSink::new());
        let reconciler = Reconciler::new(
            Contractor::new(transport.clone()),
            store.clone(),
            events.clone(),
            ReconcileSettings::default(),
        );

        Self {
            name: "web01".to_string(),
            transport,
            store,
            events,
            reconciler,
            cancel: CancellationToken::new(),
        }
    }

    /// Replaces the persisted status, keeping the stored version
    pub fn with_status(self, status: StructureStatus) -> Self {
        let mut structure = self.stored();
        structure.status = status;
        self.store.insert(structure);
        self
    }

    /// Runs one reconcile pass
    pub async fn pass(&self) -> ReconcileResult<Directive> {
        let result = self.reconciler.reconcile(&self.name, &self.cancel).await;
        debug!(structure = %self.name, ?result, "Test pass finished");
        result
    }

    /// Runs one pass after clearing recorded calls and events
    pub async fn fresh_pass(&self) -> ReconcileResult<Directive> {
        self.transport.clear_calls();
        self.events.clear();
        self.pass().await
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn stored(&self) -> Structure {
        self.store
            .snapshot(&self.name)
            .unwrap_or_else(|| panic!("structure '{}' missing from store", self.name))
    }

    /// Overwrites one field of the remote structure
    pub fn set_remote(&self, field: &str, value: Value) {
        self.transport
            .set_field(&fixtures::structure_uri(STRUCTURE_ID), field, value);
    }

    /// Puts a running job on the remote structure
    pub fn start_remote_job(&self, id: i64, script: &str, status: &str) {
        let uri = fixtures::job_uri(id);
        self.transport.insert(uri.clone(), fixtures::job(script, status));
        self.transport
            .set_current_job(fixtures::structure_uri(STRUCTURE_ID), uri);
    }

    /// Completes the remote job, optionally moving the structure to `state`
    pub fn finish_remote_job(&self, state: Option<&str>) -> Option<String> {
        self.transport
            .finish_job(&fixtures::structure_uri(STRUCTURE_ID), state)
    }
}

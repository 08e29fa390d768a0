//! Reconcile Driver: one level-triggered pass per call.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use t3kton_contractor::Contractor;

use crate::error::cancellable;
use crate::{
    DiffEngine, DiffOutcome, Directive, EventSink, JobOrchestrator, ReconcileError,
    ReconcileResult, StatusSynchronizer, StructureStore,
};

/// Default delay between polls of an in-flight job.
pub const DEFAULT_JOB_POLL_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileSettings {
    pub job_poll_interval: Duration,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            job_poll_interval: DEFAULT_JOB_POLL_INTERVAL,
        }
    }
}

/// Reconciles Structures held in a [`StructureStore`] against Contractor.
///
/// The host must not run two passes for the same Structure at once.
pub struct Reconciler {
    contractor: Contractor,
    store: Arc<dyn StructureStore>,
    synchronizer: StatusSynchronizer,
    diff: DiffEngine,
    orchestrator: JobOrchestrator,
}

impl Reconciler {
    pub fn new(
        contractor: Contractor,
        store: Arc<dyn StructureStore>,
        events: Arc<dyn EventSink>,
        settings: ReconcileSettings,
    ) -> Self {
        Self {
            synchronizer: StatusSynchronizer::new(contractor.clone()),
            diff: DiffEngine::new(store.clone(), events.clone()),
            orchestrator: JobOrchestrator::new(contractor.clone(), events, settings.job_poll_interval),
            contractor,
            store,
        }
    }

    pub fn contractor(&self) -> &Contractor {
        &self.contractor
    }

    /// Runs one pass for the Structure called `name`.
    ///
    /// A Structure that no longer exists ends with [`Directive::Stop`].
    #[instrument(skip(self, cancel))]
    pub async fn reconcile(&self, name: &str, cancel: &CancellationToken) -> ReconcileResult<Directive> {
        info!("Reconciling Structure");

        let Some(structure) = self
            .store
            .get(name)
            .await
            .map_err(|source| ReconcileError::StoreRead {
                name: name.to_string(),
                source,
            })?
        else {
            debug!("Structure not found, nothing to do");
            return Ok(Directive::Stop);
        };

        if structure.spec.id == 0 {
            info!("ID must be specified");
            return Err(ReconcileError::IdNotSpecified);
        }
        if !structure.spec.is_fully_defined() {
            info!("Structure is not fully defined");
            return Err(ReconcileError::NotFullyDefined);
        }

        let contractor = &self.contractor;
        cancellable(cancel, async {
            contractor
                .refresh_session()
                .await
                .map_err(|e| ReconcileError::fetch("Contractor session", e))
        })
        .await?;

        let fresh = self.synchronizer.fetch(structure.spec.id, cancel).await?;

        if let DiffOutcome::Done(directive) = self.diff.apply(&structure, fresh).await? {
            return Ok(directive);
        }

        self.orchestrator.decide(&structure, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Event, MemoryStructureStore, RecordingEventSink};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use async_trait::async_trait;
    use serde_json::Value;
    use t3kton_contractor::{CinpTransport, CinpVerb, ContractorResult, MemoryTransport};
    use t3kton_types::{Structure, StructureSpec};
    use tokio_test::{assert_pending, assert_ready_err, task};

    const FOUNDATION: &str = "/api/v1/Building/Foundation:test:";

    /// Never answers reads of one URI.
    struct StalledTransport {
        inner: Arc<MemoryTransport>,
        stalled: &'static str,
    }

    #[async_trait]
    impl CinpTransport for StalledTransport {
        async fn get(&self, uri: &str) -> ContractorResult<Value> {
            if uri == self.stalled {
                std::future::pending::<()>().await;
            }
            self.inner.get(uri).await
        }

        async fn update(&self, uri: &str, values: Value) -> ContractorResult<Value> {
            self.inner.update(uri, values).await
        }

        async fn call(&self, uri: &str, method: &str, params: Value) -> ContractorResult<Value> {
            self.inner.call(uri, method, params).await
        }
    }

    struct Fixture {
        transport: Arc<MemoryTransport>,
        store: Arc<MemoryStructureStore>,
        events: Arc<RecordingEventSink>,
        reconciler: Reconciler,
    }

    fn fixture(spec: StructureSpec) -> Fixture {
        let transport = Arc::new(MemoryTransport::new());
        transport.insert(
            "/api/v1/Building/Structure:42:",
            json!({
                "state": "built",
                "hostname": "web01",
                "blueprint": "/api/v1/BluePrint/StructureBluePrint:base:",
                "foundation": "/api/v1/Building/Foundation:test:",
                "config_values": {}
            }),
        );
        transport.insert(
            FOUNDATION,
            json!({"locator": "test", "blueprint": "/api/v1/BluePrint/FoundationBluePrint:vm:"}),
        );

        let store = Arc::new(MemoryStructureStore::new());
        store.insert(Structure::new("web01", spec));
        let events = Arc::new(RecordingEventSink::new());
        let reconciler = Reconciler::new(
            Contractor::new(transport.clone()),
            store.clone(),
            events.clone(),
            ReconcileSettings::default(),
        );
        Fixture {
            transport,
            store,
            events,
            reconciler,
        }
    }

    fn spec() -> StructureSpec {
        StructureSpec {
            id: 42,
            state: "built".to_string(),
            blueprint: "base".to_string(),
            config_values: None,
        }
    }

    #[tokio::test]
    async fn test_missing_structure_stops() {
        let f = fixture(spec());
        let directive = f.reconciler.reconcile("ghost", &CancellationToken::new()).await.unwrap();
        assert_eq!(directive, Directive::Stop);
        assert!(f.transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_id_required() {
        let f = fixture(StructureSpec { id: 0, ..spec() });
        let err = f.reconciler.reconcile("web01", &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, ReconcileError::IdNotSpecified));
        assert!(f.transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_not_fully_defined() {
        let f = fixture(StructureSpec {
            blueprint: String::new(),
            ..spec()
        });
        let err = f.reconciler.reconcile("web01", &CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "structure is not fully defined");
        assert!(f.transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_state_required() {
        let f = fixture(StructureSpec {
            state: String::new(),
            ..spec()
        });
        let err = f.reconciler.reconcile("web01", &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, ReconcileError::NotFullyDefined));
        assert!(!err.is_retryable());
        assert_eq!(f.transport.session_refreshes(), 0);
    }

    #[tokio::test]
    async fn test_converges_in_two_passes() {
        let f = fixture(spec());
        let cancel = CancellationToken::new();

        assert_eq!(f.reconciler.reconcile("web01", &cancel).await.unwrap(), Directive::RequeueNow);
        assert_eq!(f.reconciler.reconcile("web01", &cancel).await.unwrap(), Directive::Stop);

        assert_eq!(f.events.events(), vec![Event::StatusChanged, Event::ReconcileComplete]);
        assert_eq!(f.store.status_writes(), 1);
        assert_eq!(f.transport.session_refreshes(), 2);
        assert!(f.transport.mutations().is_empty());
        assert_eq!(f.transport.count(CinpVerb::Call, "/api/v1/Building/Structure:42:(getJob)"), 2);
    }

    #[tokio::test]
    async fn test_cancelled_pass_is_retryable() {
        let f = fixture(spec());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = f.reconciler.reconcile("web01", &cancel).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Cancelled));
        assert!(err.is_retryable());
        assert_eq!(f.store.status_writes(), 0);
    }

    #[test]
    fn test_cancel_aborts_in_flight_read() {
        let f = fixture(spec());
        let reconciler = Reconciler::new(
            Contractor::new(Arc::new(StalledTransport {
                inner: f.transport.clone(),
                stalled: FOUNDATION,
            })),
            f.store.clone(),
            f.events.clone(),
            ReconcileSettings::default(),
        );
        let cancel = CancellationToken::new();

        let mut pass = task::spawn(reconciler.reconcile("web01", &cancel));
        assert_pending!(pass.poll());
        assert_eq!(f.transport.count(CinpVerb::Get, FOUNDATION), 0);

        cancel.cancel();
        assert!(pass.is_woken());
        let err = assert_ready_err!(pass.poll());
        assert!(matches!(err, ReconcileError::Cancelled));
        assert!(err.is_retryable());
        assert_eq!(f.store.status_writes(), 0);
        assert!(f.events.events().is_empty());
    }
}

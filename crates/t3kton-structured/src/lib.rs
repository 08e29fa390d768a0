//! Structure reconcile controller.
//!
//! Drives one declared [`Structure`](t3kton_types::Structure) toward the
//! state Contractor reports, one level-triggered pass at a time.
//!
//! # Pass
//!
//! | Step | Component | Effect |
//! |------|-----------|--------|
//! | 1 | [`StatusSynchronizer`] | Reads structure, foundation and job from Contractor |
//! | 2 | [`DiffEngine`] | Persists the snapshot when it differs; detects finished jobs |
//! | 3 | [`JobOrchestrator`] | Pushes config values or blueprint, or starts a job |
//!
//! Each pass performs at most one mutating call and returns a [`Directive`]
//! telling the host when to run the next one.
//!
//! # Example
//!
//! ```ignore
//! use t3kton_structured::{Reconciler, ReconcileSettings};
//!
//! let reconciler = Reconciler::new(contractor, store, events, ReconcileSettings::default());
//! let directive = reconciler.reconcile("web01", &cancel).await?;
//! ```

pub mod admission;
mod config_file;
pub mod daemon;
mod diff;
mod directive;
mod error;
mod events;
mod orchestrator;
mod reconciler;
mod store;
mod sync;

pub use admission::AdmissionError;
pub use config_file::{
    ConfigError, ContractorSection, ReconcileSection, StoreSection, StructuredConfig,
    DEFAULT_CONFIG_PATH,
};
pub use diff::{DiffEngine, DiffOutcome, StatusChanges};
pub use directive::Directive;
pub use error::{ReconcileError, ReconcileResult};
pub use events::{Event, EventError, EventSink, LogEventSink, RecordingEventSink};
pub use orchestrator::JobOrchestrator;
pub use reconciler::{ReconcileSettings, Reconciler, DEFAULT_JOB_POLL_INTERVAL};
pub use store::{FileStructureStore, MemoryStructureStore, StoreError, StructureStore};
pub use sync::{parse_job_progress, StatusSynchronizer};

//! Reconcile notifications.
//!
//! Delivery is best effort: the reconciler logs a failed publish and moves on.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::fmt;
use thiserror::Error;
use tracing::{info, warn};

use t3kton_types::Structure;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    StatusChanged,
    JobFinished,
    JobCreated { script: String, job_id: i64 },
    ReconcileComplete,
}

impl Event {
    pub fn reason(&self) -> &'static str {
        match self {
            Event::StatusChanged => "StatusChanged",
            Event::JobFinished => "JobFinished",
            Event::JobCreated { .. } => "JobCreated",
            Event::ReconcileComplete => "ReconcileComplete",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Event::StatusChanged => "status changed".to_string(),
            Event::JobFinished => "job finished".to_string(),
            Event::JobCreated { script, job_id } => {
                format!("job '{script}' created, ID:{job_id}")
            }
            Event::ReconcileComplete => "reconcile complete".to_string(),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.reason(), self.message())
    }
}

#[derive(Debug, Error)]
#[error("Event delivery failed: {0}")]
pub struct EventError(pub String);

/// Receives notifications about one Structure.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, structure: &Structure, event: &Event) -> Result<(), EventError>;
}

/// Publishes `event`, logging instead of failing when the sink rejects it.
pub(crate) async fn emit(sink: &dyn EventSink, structure: &Structure, event: Event) {
    if let Err(e) = sink.publish(structure, &event).await {
        warn!(
            structure = %structure.name(),
            reason = event.reason(),
            error = %e,
            "failed to record event, ignoring"
        );
    }
}

/// Writes every event to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEventSink;

#[async_trait]
impl EventSink for LogEventSink {
    async fn publish(&self, structure: &Structure, event: &Event) -> Result<(), EventError> {
        info!(
            structure = %structure.name(),
            reason = event.reason(),
            message = %event.message(),
            "Event"
        );
        Ok(())
    }
}

/// Keeps every event in memory; optionally rejects them all.
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<Event>>,
    failing: Mutex<bool>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent publishes fail after recording.
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn count(&self, reason: &str) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| e.reason() == reason)
            .count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

#[async_trait]
impl EventSink for RecordingEventSink {
    async fn publish(&self, _structure: &Structure, event: &Event) -> Result<(), EventError> {
        self.events.lock().push(event.clone());
        if *self.failing.lock() {
            return Err(EventError("sink unavailable".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use t3kton_types::StructureSpec;

    #[test]
    fn test_event_text() {
        let event = Event::JobCreated {
            script: "create".to_string(),
            job_id: 37,
        };
        assert_eq!(event.reason(), "JobCreated");
        assert_eq!(event.message(), "job 'create' created, ID:37");
        assert_eq!(Event::ReconcileComplete.to_string(), "ReconcileComplete: reconcile complete");
    }

    #[tokio::test]
    async fn test_recording_sink() {
        let sink = RecordingEventSink::new();
        let structure = Structure::new("web01", StructureSpec::default());

        sink.publish(&structure, &Event::StatusChanged).await.unwrap();
        sink.set_failing(true);
        assert!(sink.publish(&structure, &Event::JobFinished).await.is_err());

        assert_eq!(sink.events(), vec![Event::StatusChanged, Event::JobFinished]);
        assert_eq!(sink.count("JobFinished"), 1);
    }
}

//! Verification helpers for remote traffic and emitted events

use thiserror::Error;

use t3kton_contractor::{CinpVerb, MemoryTransport};
use t3kton_structured::{Event, RecordingEventSink};

use crate::fixtures::{structure_uri, STRUCTURE_ID};

/// Verification error types
#[derive(Error, Debug)]
pub enum VerificationError {
    #[error("Expected {expected} {what}, found {actual}")]
    CountMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },

    #[error("Expected events {expected:?}, got {actual:?}")]
    EventMismatch {
        expected: Vec<Event>,
        actual: Vec<Event>,
    },
}

/// Result type for verification operations
pub type VerifyResult<T> = Result<T, VerificationError>;

fn expect_count(what: &str, expected: usize, actual: usize) -> VerifyResult<()> {
    if expected != actual {
        return Err(VerificationError::CountMismatch {
            what: what.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

/// Remote call verifier
pub struct CallVerifier<'a> {
    transport: &'a MemoryTransport,
}

impl<'a> CallVerifier<'a> {
    pub fn new(transport: &'a MemoryTransport) -> Self {
        Self { transport }
    }

    fn method_calls(&self, method: &str) -> usize {
        let uri = format!("{}({method})", structure_uri(STRUCTURE_ID));
        self.transport.count(CinpVerb::Call, &uri)
    }

    /// Verify the number of create and destroy job starts
    pub fn assert_job_starts(&self, create: usize, destroy: usize) -> VerifyResult<()> {
        expect_count("create-job calls", create, self.method_calls("doCreate"))?;
        expect_count("destroy-job calls", destroy, self.method_calls("doDestroy"))
    }

    /// Verify the number of partial updates sent to the structure
    pub fn assert_updates(&self, expected: usize) -> VerifyResult<()> {
        let actual = self
            .transport
            .count(CinpVerb::Update, &structure_uri(STRUCTURE_ID));
        expect_count("structure updates", expected, actual)
    }

    /// Verify nothing but reads and job lookups reached Contractor
    pub fn assert_read_only(&self) -> VerifyResult<()> {
        self.assert_job_starts(0, 0)?;
        self.assert_updates(0)
    }
}

/// Verify the exact sequence of emitted events
pub fn assert_events(sink: &RecordingEventSink, expected: &[Event]) -> VerifyResult<()> {
    let actual = sink.events();
    if actual != expected {
        return Err(VerificationError::EventMismatch {
            expected: expected.to_vec(),
            actual,
        });
    }
    Ok(())
}

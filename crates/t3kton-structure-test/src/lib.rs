//! Integration test infrastructure for the Structure reconcile controller
//!
//! Provides:
//! - Contractor object fixtures (structures, foundations, jobs)
//! - A harness wiring the reconciler to an in-memory Contractor, store and
//!   event sink
//! - Verification helpers for remote traffic and emitted events

pub mod fixtures;
mod harness;
mod verification;

pub use harness::TestEnv;
pub use verification::*;

//! Transport seam between the typed client and the wire protocol.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

use crate::ContractorResult;

/// CInP request verbs used by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CinpVerb {
    Get,
    Update,
    Call,
}

impl CinpVerb {
    pub fn as_str(&self) -> &'static str {
        match self {
            CinpVerb::Get => "GET",
            CinpVerb::Update => "UPDATE",
            CinpVerb::Call => "CALL",
        }
    }
}

impl fmt::Display for CinpVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw CInP operations.
///
/// Implementations must be safe to share between tasks; the reconciler and
/// admission checks hold the same transport.
#[async_trait]
pub trait CinpTransport: Send + Sync {
    /// Fetches the object at `uri` as a JSON object.
    async fn get(&self, uri: &str) -> ContractorResult<Value>;

    /// Applies a partial update and returns the resulting object.
    async fn update(&self, uri: &str, values: Value) -> ContractorResult<Value>;

    /// Invokes `method` on the object (or class) at `uri`.
    async fn call(&self, uri: &str, method: &str, params: Value) -> ContractorResult<Value>;

    /// Makes sure the session is usable, logging in again when it expired.
    async fn refresh_session(&self) -> ContractorResult<()> {
        Ok(())
    }

    /// Ends the session, if any.
    async fn close(&self) -> ContractorResult<()> {
        Ok(())
    }
}

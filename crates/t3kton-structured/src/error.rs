//! Error types for reconcile passes.
//!
//! Every variant except [`StoreError::Conflict`](crate::StoreError::Conflict),
//! which the diff engine absorbs, surfaces to the host so it can apply its
//! own backoff.

use std::future::Future;

use t3kton_contractor::ContractorError;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::StoreError;

/// Result type alias for reconcile operations.
pub type ReconcileResult<T> = Result<T, ReconcileError>;

#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Spec carries no Contractor structure ID.
    #[error("ID Not Specified")]
    IdNotSpecified,

    /// Desired state or blueprint is empty.
    #[error("structure is not fully defined")]
    NotFullyDefined,

    #[error("Failed to fetch {what} from Contractor: {source}")]
    RemoteFetch {
        what: String,
        #[source]
        source: ContractorError,
    },

    #[error("Failed to {action}: {source}")]
    RemoteMutation {
        action: String,
        #[source]
        source: ContractorError,
    },

    #[error("invalid target state '{0}'")]
    InvalidTargetState(String),

    #[error("Failed to read structure '{name}': {source}")]
    StoreRead {
        name: String,
        #[source]
        source: StoreError,
    },

    /// Non-conflict failure writing status.
    #[error("update status failed: {0}")]
    StatusPersist(#[source] StoreError),

    #[error("Reconcile pass cancelled")]
    Cancelled,
}

impl ReconcileError {
    pub fn fetch(what: impl Into<String>, source: ContractorError) -> Self {
        Self::RemoteFetch {
            what: what.into(),
            source,
        }
    }

    pub fn mutation(action: impl Into<String>, source: ContractorError) -> Self {
        Self::RemoteMutation {
            action: action.into(),
            source,
        }
    }

    /// Returns true if the same pass may succeed without any change to the
    /// declared Structure.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RemoteFetch { source, .. } | Self::RemoteMutation { source, .. } => {
                source.is_retryable()
            }
            Self::StoreRead { .. } | Self::StatusPersist(_) | Self::Cancelled => true,
            Self::IdNotSpecified | Self::NotFullyDefined | Self::InvalidTargetState(_) => false,
        }
    }
}

/// Runs `fut` unless `cancel` fires first, in which case the future is
/// dropped and [`ReconcileError::Cancelled`] is returned.
pub(crate) async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> ReconcileResult<T>
where
    F: Future<Output = ReconcileResult<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ReconcileError::Cancelled),
        result = fut => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_error_display() {
        assert_eq!(ReconcileError::IdNotSpecified.to_string(), "ID Not Specified");
        assert_eq!(
            ReconcileError::NotFullyDefined.to_string(),
            "structure is not fully defined"
        );
        assert_eq!(
            ReconcileError::InvalidTargetState("ready".into()).to_string(),
            "invalid target state 'ready'"
        );

        let err = ReconcileError::fetch("structure 42", ContractorError::transport("refused"));
        assert_eq!(
            err.to_string(),
            "Failed to fetch structure 42 from Contractor: Transport error: refused"
        );
    }

    #[test]
    fn test_is_retryable() {
        assert!(ReconcileError::Cancelled.is_retryable());
        assert!(ReconcileError::fetch("job", ContractorError::transport("x")).is_retryable());
        assert!(!ReconcileError::fetch("job", ContractorError::not_found("/x")).is_retryable());
        assert!(!ReconcileError::NotFullyDefined.is_retryable());
        assert!(!ReconcileError::InvalidTargetState("x".into()).is_retryable());
        assert!(ReconcileError::StatusPersist(StoreError::backend("disk full")).is_retryable());
    }

    #[tokio::test]
    async fn test_cancellable_passes_result_through() {
        let cancel = CancellationToken::new();
        let value = cancellable(&cancel, async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_cancellable_aborts_pending_call() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result: ReconcileResult<()> = cancellable(&cancel, async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(ReconcileError::Cancelled)));
    }
}

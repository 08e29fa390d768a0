//! Typed Contractor operations.

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

use crate::{
    CinpTransport, ContractorError, ContractorResult, Locator, ObjectKind, RemoteFoundation,
    RemoteJob, RemoteStructure, StructureUpdate,
};

/// Handle to a Contractor instance.
///
/// Cheap to clone; all clones share one transport and therefore one session.
#[derive(Clone)]
pub struct Contractor {
    transport: Arc<dyn CinpTransport>,
}

impl Contractor {
    pub fn new(transport: Arc<dyn CinpTransport>) -> Self {
        Self { transport }
    }

    pub async fn refresh_session(&self) -> ContractorResult<()> {
        self.transport.refresh_session().await
    }

    pub async fn close(&self) -> ContractorResult<()> {
        self.transport.close().await
    }

    pub async fn get_by_locator(&self, locator: &Locator) -> ContractorResult<Value> {
        self.transport.get(&locator.to_string()).await
    }

    pub async fn get_by_id(&self, kind: ObjectKind, id: impl std::fmt::Display) -> ContractorResult<Value> {
        self.get_by_locator(&Locator::of(kind, id)).await
    }

    /// Sends a partial update; only the fields present in `partial` change.
    pub async fn update(&self, locator: &Locator, partial: Value) -> ContractorResult<Value> {
        debug!(locator = %locator, "Updating Contractor object");
        self.transport.update(&locator.to_string(), partial).await
    }

    async fn fetch<T: DeserializeOwned>(&self, locator: &Locator) -> ContractorResult<T> {
        let uri = locator.to_string();
        let value = self.transport.get(&uri).await?;
        serde_json::from_value(value).map_err(|e| ContractorError::decode(uri, e.to_string()))
    }

    pub async fn structure(&self, id: i64) -> ContractorResult<RemoteStructure> {
        self.fetch(&Locator::of(ObjectKind::Structure, id)).await
    }

    pub async fn foundation(&self, locator: &Locator) -> ContractorResult<RemoteFoundation> {
        self.fetch(locator).await
    }

    pub async fn structure_job(&self, locator: &Locator) -> ContractorResult<RemoteJob> {
        self.fetch(locator).await
    }

    pub async fn update_structure(&self, id: i64, update: &StructureUpdate) -> ContractorResult<()> {
        let partial =
            serde_json::to_value(update).map_err(|e| ContractorError::transport(e.to_string()))?;
        self.update(&Locator::of(ObjectKind::Structure, id), partial)
            .await
            .map(|_| ())
    }

    /// Returns false when no structure blueprint named `name` exists.
    pub async fn structure_blueprint_exists(&self, name: &str) -> ContractorResult<bool> {
        match self.get_by_id(ObjectKind::StructureBlueprint, name).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Starts the build job of structure `id` and returns the job ID.
    pub async fn start_create_job(&self, id: i64) -> ContractorResult<i64> {
        self.start_job(id, "doCreate").await
    }

    /// Starts the teardown job of structure `id` and returns the job ID.
    pub async fn start_destroy_job(&self, id: i64) -> ContractorResult<i64> {
        self.start_job(id, "doDestroy").await
    }

    async fn start_job(&self, id: i64, method: &str) -> ContractorResult<i64> {
        let locator = Locator::of(ObjectKind::Structure, id);
        let result = self
            .transport
            .call(&locator.to_string(), method, json!({}))
            .await?;
        let uri = locator.method(method);
        result
            .as_i64()
            .ok_or_else(|| ContractorError::decode(uri, format!("expected job id, got {result}")))
    }

    /// Locator of the in-flight job of structure `id`, if any.
    pub async fn get_current_job(&self, id: i64) -> ContractorResult<Option<Locator>> {
        let locator = Locator::of(ObjectKind::Structure, id);
        let uri = locator.method("getJob");
        match self.transport.call(&locator.to_string(), "getJob", json!({})).await? {
            Value::Null => Ok(None),
            Value::String(job) if job.is_empty() => Ok(None),
            Value::String(job) => {
                let locator: Locator = job.parse()?;
                if !locator.is_kind(ObjectKind::StructureJob) {
                    return Err(ContractorError::decode(
                        uri,
                        format!("'{locator}' is not a structure job"),
                    ));
                }
                Ok(Some(locator))
            }
            other => Err(ContractorError::decode(
                uri,
                format!("expected job locator, got {other}"),
            )),
        }
    }
}

impl std::fmt::Debug for Contractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Contractor").finish_non_exhaustive()
    }
}

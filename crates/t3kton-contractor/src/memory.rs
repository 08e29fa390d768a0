//! In-process Contractor.
//!
//! Holds objects keyed by locator URI and implements the handful of methods
//! the controller invokes. Every request is recorded so tests can assert on
//! the exact remote traffic, and failures can be injected per URI.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::{CinpTransport, CinpVerb, ContractorError, ContractorResult, Locator, ObjectKind};

/// CALL methods that only read state.
const READ_ONLY_METHODS: &[&str] = &["getJob"];

/// One request seen by [`MemoryTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub verb: CinpVerb,
    pub uri: String,
    pub body: Value,
}

impl RecordedCall {
    /// True for GETs and for CALLs of a read-only method such as `getJob`.
    pub fn is_read_only(&self) -> bool {
        match self.verb {
            CinpVerb::Get => true,
            CinpVerb::Update => false,
            CinpVerb::Call => READ_ONLY_METHODS
                .iter()
                .any(|method| self.uri.ends_with(&format!("({method})"))),
        }
    }
}

#[derive(Debug)]
struct MemoryState {
    objects: BTreeMap<String, Value>,
    /// Structure URI -> in-flight job URI.
    current_jobs: HashMap<String, String>,
    next_job_id: i64,
    calls: Vec<RecordedCall>,
    failures: HashMap<(CinpVerb, String), String>,
    session_refreshes: usize,
}

impl Default for MemoryState {
    fn default() -> Self {
        Self {
            objects: BTreeMap::new(),
            current_jobs: HashMap::new(),
            next_job_id: 1,
            calls: Vec::new(),
            failures: HashMap::new(),
            session_refreshes: 0,
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryTransport {
    state: Mutex<MemoryState>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the ID handed to the next created job.
    pub fn with_next_job_id(self, id: i64) -> Self {
        self.state.lock().next_job_id = id;
        self
    }

    pub fn insert(&self, uri: impl Into<String>, object: Value) {
        self.state.lock().objects.insert(uri.into(), object);
    }

    pub fn remove(&self, uri: &str) -> Option<Value> {
        self.state.lock().objects.remove(uri)
    }

    pub fn object(&self, uri: &str) -> Option<Value> {
        self.state.lock().objects.get(uri).cloned()
    }

    /// Overwrites one field of a stored object, simulating Contractor-side
    /// progress.
    pub fn set_field(&self, uri: &str, field: &str, value: Value) {
        let mut state = self.state.lock();
        if let Some(Value::Object(map)) = state.objects.get_mut(uri) {
            map.insert(field.to_string(), value);
        }
    }

    /// Marks `job_uri` as the in-flight job of `structure_uri`.
    pub fn set_current_job(&self, structure_uri: impl Into<String>, job_uri: impl Into<String>) {
        self.state
            .lock()
            .current_jobs
            .insert(structure_uri.into(), job_uri.into());
    }

    /// Completes the in-flight job of `structure_uri`, optionally moving
    /// the structure to `new_state`. Returns the job URI that was finished.
    pub fn finish_job(&self, structure_uri: &str, new_state: Option<&str>) -> Option<String> {
        let mut state = self.state.lock();
        let job_uri = state.current_jobs.remove(structure_uri)?;
        state.objects.remove(&job_uri);
        if let (Some(new_state), Some(Value::Object(map))) =
            (new_state, state.objects.get_mut(structure_uri))
        {
            map.insert("state".to_string(), Value::from(new_state));
        }
        Some(job_uri)
    }

    /// Makes every `verb` request against `uri` fail with a transport error.
    pub fn fail(&self, verb: CinpVerb, uri: impl Into<String>, message: impl Into<String>) {
        self.state
            .lock()
            .failures
            .insert((verb, uri.into()), message.into());
    }

    pub fn clear_failures(&self) {
        self.state.lock().failures.clear();
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().calls.clone()
    }

    /// Recorded requests that change remote state.
    pub fn mutations(&self) -> Vec<RecordedCall> {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| !call.is_read_only())
            .cloned()
            .collect()
    }

    pub fn count(&self, verb: CinpVerb, uri: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| call.verb == verb && call.uri == uri)
            .count()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn session_refreshes(&self) -> usize {
        self.state.lock().session_refreshes
    }

    fn record(&self, verb: CinpVerb, uri: &str, body: &Value) -> ContractorResult<()> {
        let mut state = self.state.lock();
        state.calls.push(RecordedCall {
            verb,
            uri: uri.to_string(),
            body: body.clone(),
        });
        match state.failures.get(&(verb, uri.to_string())) {
            Some(message) => Err(ContractorError::transport(message.clone())),
            None => Ok(()),
        }
    }

    fn start_job(state: &mut MemoryState, structure_uri: &str, script: &str) -> i64 {
        let id = state.next_job_id;
        state.next_job_id += 1;

        let job_uri = Locator::of(ObjectKind::StructureJob, id).to_string();
        let now = Utc::now().to_rfc3339();
        state.objects.insert(
            job_uri.clone(),
            json!({
                "state": "queued",
                "script_name": script,
                "message": "",
                "can_start": "true",
                "created": now,
                "updated": now,
                "status": "[]",
            }),
        );
        state
            .current_jobs
            .insert(structure_uri.to_string(), job_uri);
        id
    }
}

#[async_trait]
impl CinpTransport for MemoryTransport {
    async fn get(&self, uri: &str) -> ContractorResult<Value> {
        self.record(CinpVerb::Get, uri, &Value::Null)?;
        self.object(uri)
            .ok_or_else(|| ContractorError::not_found(uri))
    }

    async fn update(&self, uri: &str, values: Value) -> ContractorResult<Value> {
        self.record(CinpVerb::Update, uri, &values)?;

        let Value::Object(partial) = values else {
            return Err(ContractorError::Status {
                verb: CinpVerb::Update.to_string(),
                uri: uri.to_string(),
                status: 400,
                message: "update body must be an object".to_string(),
            });
        };

        let mut state = self.state.lock();
        let Some(Value::Object(object)) = state.objects.get_mut(uri) else {
            return Err(ContractorError::not_found(uri));
        };
        for (field, value) in partial {
            object.insert(field, value);
        }
        debug!(uri, "memory transport applied update");
        Ok(Value::Object(object.clone()))
    }

    async fn call(&self, target: &str, method: &str, params: Value) -> ContractorResult<Value> {
        let uri = format!("{target}({method})");
        self.record(CinpVerb::Call, &uri, &params)?;

        let mut state = self.state.lock();
        if !state.objects.contains_key(target) {
            return Err(ContractorError::not_found(target));
        }

        match method {
            "doCreate" => Ok(Value::from(Self::start_job(&mut state, target, "create"))),
            "doDestroy" => Ok(Value::from(Self::start_job(&mut state, target, "destroy"))),
            "getJob" => Ok(state
                .current_jobs
                .get(target)
                .map(|job| Value::from(job.as_str()))
                .unwrap_or(Value::Null)),
            other => Err(ContractorError::Status {
                verb: CinpVerb::Call.to_string(),
                uri,
                status: 400,
                message: format!("unknown method '{other}'"),
            }),
        }
    }

    async fn refresh_session(&self) -> ContractorResult<()> {
        self.state.lock().session_refreshes += 1;
        Ok(())
    }
}

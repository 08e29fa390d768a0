//! Contractor object fixtures
//!
//! Builders for the JSON objects an in-memory Contractor serves.

use serde_json::{json, Map, Value};

use t3kton_contractor::{Locator, ObjectKind};
use t3kton_types::{JobStatus, Structure, StructureSpec, StructureStatus};

/// Structure ID used throughout the tests
pub const STRUCTURE_ID: i64 = 42;

/// Foundation ID used throughout the tests
pub const FOUNDATION_ID: &str = "test";

/// Default blueprint name
pub const BLUEPRINT: &str = "base";

pub fn structure_uri(id: i64) -> String {
    Locator::of(ObjectKind::Structure, id).to_string()
}

pub fn foundation_uri(id: &str) -> String {
    Locator::of(ObjectKind::Foundation, id).to_string()
}

pub fn blueprint_uri(name: &str) -> String {
    Locator::of(ObjectKind::StructureBlueprint, name).to_string()
}

pub fn job_uri(id: i64) -> String {
    Locator::of(ObjectKind::StructureJob, id).to_string()
}

/// A remote structure as Contractor reports it
#[derive(Debug, Clone)]
pub struct RemoteStructureFixture {
    pub state: String,
    pub hostname: String,
    pub blueprint: String,
    pub foundation: String,
    pub config_values: Map<String, Value>,
}

impl RemoteStructureFixture {
    pub fn new(state: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            hostname: "web01".to_string(),
            blueprint: BLUEPRINT.to_string(),
            foundation: FOUNDATION_ID.to_string(),
            config_values: Map::new(),
        }
    }

    pub fn with_blueprint(mut self, blueprint: impl Into<String>) -> Self {
        self.blueprint = blueprint.into();
        self
    }

    pub fn with_config_value(mut self, name: impl Into<String>, value: Value) -> Self {
        self.config_values.insert(name.into(), value);
        self
    }

    pub fn to_json(&self) -> Value {
        json!({
            "state": self.state,
            "hostname": self.hostname,
            "blueprint": blueprint_uri(&self.blueprint),
            "foundation": foundation_uri(&self.foundation),
            "config_values": self.config_values,
        })
    }
}

pub fn foundation(id: &str, blueprint: &str) -> Value {
    json!({
        "locator": id,
        "blueprint": Locator::of(ObjectKind::FoundationBlueprint, blueprint).to_string(),
        "state": "built",
    })
}

/// A running job with the given status blob
pub fn job(script: &str, status: &str) -> Value {
    json!({
        "state": "running",
        "script_name": script,
        "message": "",
        "can_start": "true",
        "created": "2024-03-01T10:00:00+00:00",
        "updated": "2024-03-01T10:05:00+00:00",
        "status": status,
    })
}

/// Declared spec for the default structure
pub fn spec(state: &str, blueprint: &str) -> StructureSpec {
    StructureSpec {
        id: STRUCTURE_ID,
        state: state.to_string(),
        blueprint: blueprint.to_string(),
        config_values: None,
    }
}

pub fn structure(name: &str, spec: StructureSpec) -> Structure {
    Structure::new(name, spec)
}

/// Status the synchronizer produces for a default [`RemoteStructureFixture`]
pub fn observed_status(state: &str, blueprint: &str) -> StructureStatus {
    StructureStatus {
        state: state.to_string(),
        blueprint: blueprint.to_string(),
        hostname: "web01".to_string(),
        foundation: FOUNDATION_ID.to_string(),
        foundation_blueprint: "vm-base".to_string(),
        config_values: None,
        job: None,
    }
}

/// Job status the synchronizer produces for [`job`]
pub fn observed_job(script: &str, progress: &str, max_time_remaining: &str) -> JobStatus {
    JobStatus {
        state: "running".to_string(),
        script: script.to_string(),
        message: String::new(),
        can_start: "true".to_string(),
        created: "2024-03-01T10:00:00Z".to_string(),
        last_updated: "2024-03-01T10:05:00Z".to_string(),
        progress: progress.to_string(),
        max_time_remaining: max_time_remaining.to_string(),
    }
}

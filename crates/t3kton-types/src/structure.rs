//! Structure resource: desired spec and observed status.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{ConfigValues, ParseError};

/// Lifecycle state a Structure can be driven to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetState {
    /// Allocated but not built; blueprint may still change.
    Planned,
    /// Built on its foundation.
    Built,
}

impl TargetState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetState::Planned => "planned",
            TargetState::Built => "built",
        }
    }
}

impl fmt::Display for TargetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetState {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "planned" => Ok(TargetState::Planned),
            "built" => Ok(TargetState::Built),
            other => Err(ParseError::InvalidTargetState(other.to_string())),
        }
    }
}

/// Identity and concurrency metadata of a stored Structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,

    /// Bumped by the store on every write; writes carrying a stale
    /// version are rejected.
    #[serde(default, rename = "resourceVersion")]
    pub resource_version: u64,
}

impl ObjectMeta {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Desired state, written only by the external actor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructureSpec {
    /// Contractor structure ID. Zero means not set.
    #[serde(default)]
    pub id: i64,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub state: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub blueprint: String,

    #[serde(
        default,
        rename = "configValues",
        skip_serializing_if = "Option::is_none"
    )]
    pub config_values: Option<ConfigValues>,
}

impl StructureSpec {
    /// True once both the target state and blueprint are set.
    pub fn is_fully_defined(&self) -> bool {
        !self.state.is_empty() && !self.blueprint.is_empty()
    }

    pub fn target_state(&self) -> Result<TargetState, ParseError> {
        self.state.parse()
    }
}

/// Observed state of an in-flight Contractor job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub state: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub script: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,

    #[serde(default, rename = "canstart", skip_serializing_if = "String::is_empty")]
    pub can_start: String,

    /// RFC 3339 timestamp.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub created: String,

    /// RFC 3339 timestamp.
    #[serde(default, rename = "lastupdated", skip_serializing_if = "String::is_empty")]
    pub last_updated: String,

    /// Percentage as a decimal string, e.g. `"42.5"`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub progress: String,

    /// `mm:ss`, or empty when unknown.
    #[serde(
        default,
        rename = "maxTimeRemaining",
        skip_serializing_if = "String::is_empty"
    )]
    pub max_time_remaining: String,
}

/// Observed state, recomputed from Contractor on every pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructureStatus {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub state: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub blueprint: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hostname: String,

    /// Foundation locator.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub foundation: String,

    #[serde(
        default,
        rename = "foundationBluePrint",
        skip_serializing_if = "String::is_empty"
    )]
    pub foundation_blueprint: String,

    #[serde(
        default,
        rename = "configValues",
        skip_serializing_if = "Option::is_none"
    )]
    pub config_values: Option<ConfigValues>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job: Option<JobStatus>,
}

/// A declared Structure with its last persisted status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    pub metadata: ObjectMeta,

    #[serde(default)]
    pub spec: StructureSpec,

    #[serde(default)]
    pub status: StructureStatus,
}

impl Structure {
    pub fn new(name: impl Into<String>, spec: StructureSpec) -> Self {
        Self {
            metadata: ObjectMeta::named(name),
            spec,
            status: StructureStatus::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConfigValue;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_target_state_parse() {
        assert_eq!("planned".parse::<TargetState>().unwrap(), TargetState::Planned);
        assert_eq!("built".parse::<TargetState>().unwrap(), TargetState::Built);
        assert_eq!(
            "Built".parse::<TargetState>(),
            Err(ParseError::InvalidTargetState("Built".to_string()))
        );
        assert_eq!(TargetState::Built.to_string(), "built");
    }

    #[test]
    fn test_fully_defined() {
        let mut spec = StructureSpec {
            id: 42,
            ..Default::default()
        };
        assert!(!spec.is_fully_defined());
        spec.state = "built".to_string();
        assert!(!spec.is_fully_defined());
        spec.blueprint = "base".to_string();
        assert!(spec.is_fully_defined());
    }

    #[test]
    fn test_manifest_yaml() {
        let manifest = r#"
metadata:
  name: web01
spec:
  id: 42
  state: built
  blueprint: base-linux
  configValues:
    mtu: 9000
    ">packages": [nginx]
status:
  state: planned
  foundationBluePrint: vm-base
  job:
    script: create
    canstart: "true"
    maxTimeRemaining: "01:30"
"#;
        let structure: Structure = serde_yaml::from_str(manifest).unwrap();
        assert_eq!(structure.name(), "web01");
        assert_eq!(structure.metadata.resource_version, 0);
        assert_eq!(structure.spec.target_state().unwrap(), TargetState::Built);

        let values = structure.spec.config_values.as_ref().unwrap();
        assert_eq!(values.get("mtu"), Some(&ConfigValue::Number(9000.0)));
        assert_eq!(structure.status.foundation_blueprint, "vm-base");

        let job = structure.status.job.as_ref().unwrap();
        assert_eq!(job.can_start, "true");
        assert_eq!(job.max_time_remaining, "01:30");
    }

    #[test]
    fn test_empty_status_serializes_compactly() {
        let structure = Structure::new(
            "web01",
            StructureSpec {
                id: 7,
                ..Default::default()
            },
        );
        let encoded = serde_json::to_value(&structure).unwrap();
        assert_eq!(
            encoded,
            serde_json::json!({
                "metadata": {"name": "web01", "resourceVersion": 0},
                "spec": {"id": 7},
                "status": {}
            })
        );
    }
}

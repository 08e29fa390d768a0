//! Typed views of the Contractor objects the controller reads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Contractor returns `null` for unset fields; treat it as the default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RemoteStructure {
    #[serde(default, deserialize_with = "null_as_default")]
    pub state: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub hostname: String,

    /// Blueprint locator.
    #[serde(default, deserialize_with = "null_as_default")]
    pub blueprint: String,

    /// Foundation locator.
    #[serde(default, deserialize_with = "null_as_default")]
    pub foundation: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub config_values: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RemoteFoundation {
    #[serde(default, deserialize_with = "null_as_default")]
    pub locator: String,

    /// Foundation blueprint locator.
    #[serde(default, deserialize_with = "null_as_default")]
    pub blueprint: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub state: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RemoteJob {
    #[serde(default, deserialize_with = "null_as_default")]
    pub state: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub script_name: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,

    /// Contractor reports this as a string (`"true"`, `"false"` or a reason).
    #[serde(default, deserialize_with = "null_as_default")]
    pub can_start: String,

    #[serde(default)]
    pub created: Option<DateTime<Utc>>,

    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,

    /// Free-form runner status blob.
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
}

/// Partial update sent to a Contractor structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StructureUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_values: Option<Map<String, Value>>,

    /// Blueprint locator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blueprint: Option<String>,
}

impl StructureUpdate {
    pub fn config_values(values: Map<String, Value>) -> Self {
        Self {
            config_values: Some(values),
            ..Self::default()
        }
    }

    pub fn blueprint(locator: impl Into<String>) -> Self {
        Self {
            blueprint: Some(locator.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.config_values.is_none() && self.blueprint.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_structure_nulls() {
        let remote: RemoteStructure = serde_json::from_value(json!({
            "state": "planned",
            "hostname": null,
            "blueprint": "/api/v1/BluePrint/StructureBluePrint:base:",
            "foundation": "/api/v1/Building/Foundation:test:",
            "config_values": null,
            "site": "/api/v1/Site/Site:main:"
        }))
        .unwrap();

        assert_eq!(remote.state, "planned");
        assert_eq!(remote.hostname, "");
        assert!(remote.config_values.is_empty());
    }

    #[test]
    fn test_job_timestamps() {
        let job: RemoteJob = serde_json::from_value(json!({
            "state": "queued",
            "script_name": "create",
            "can_start": "true",
            "created": "2024-03-01T10:15:00.250000+00:00",
            "updated": "2024-03-01T12:15:00+02:00",
            "status": "[[12.5, {}]]"
        }))
        .unwrap();

        assert_eq!(job.script_name, "create");
        assert_eq!(
            job.updated,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 10, 15, 0).unwrap())
        );
        assert!(job.created.is_some());
        assert_eq!(job.message, "");
    }

    #[test]
    fn test_update_serializes_only_set_fields() {
        let update = StructureUpdate::blueprint("/api/v1/BluePrint/StructureBluePrint:base:");
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            json!({"blueprint": "/api/v1/BluePrint/StructureBluePrint:base:"})
        );
        assert!(StructureUpdate::default().is_empty());
    }
}

//! Named mapping of configuration values.

use serde::{Deserialize, Serialize};
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;

use crate::ConfigValue;

/// Configuration values keyed by name.
///
/// Serialized as a plain JSON/YAML mapping of name to bare value literal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigValues(BTreeMap<String, ConfigValue>);

impl ConfigValues {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builds the mapping from an untyped JSON object as returned by the
    /// provisioning system.
    pub fn from_json_map(values: &serde_json::Map<String, serde_json::Value>) -> Self {
        values
            .iter()
            .map(|(k, v)| (k.clone(), ConfigValue::from_json(v)))
            .collect()
    }

    /// Converts to the untyped JSON object sent to the provisioning system.
    pub fn to_json_map(&self) -> serde_json::Map<String, serde_json::Value> {
        self.0
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ConfigValue>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&ConfigValue> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, ConfigValue> {
        self.0.iter()
    }

    /// Compares two optional mappings, treating an absent mapping as empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use t3kton_types::ConfigValues;
    ///
    /// let empty = ConfigValues::new();
    /// assert!(ConfigValues::equivalent(None, Some(&empty)));
    /// assert!(ConfigValues::equivalent(None, None));
    /// ```
    pub fn equivalent(a: Option<&ConfigValues>, b: Option<&ConfigValues>) -> bool {
        match (a, b) {
            (Some(a), Some(b)) => a == b,
            (Some(only), None) | (None, Some(only)) => only.is_empty(),
            (None, None) => true,
        }
    }
}

impl fmt::Display for ConfigValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", serde_json::Value::Object(self.to_json_map()))
    }
}

impl FromIterator<(String, ConfigValue)> for ConfigValues {
    fn from_iter<I: IntoIterator<Item = (String, ConfigValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for ConfigValues {
    type Item = (String, ConfigValue);
    type IntoIter = btree_map::IntoIter<String, ConfigValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ConfigValues {
    type Item = (&'a String, &'a ConfigValue);
    type IntoIter = btree_map::Iter<'a, String, ConfigValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl From<BTreeMap<String, ConfigValue>> for ConfigValues {
    fn from(map: BTreeMap<String, ConfigValue>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample() -> ConfigValues {
        let mut values = ConfigValues::new();
        values.insert("hostname", "web01");
        values.insert("mtu", 9000i64);
        values.insert(">packages", ConfigValue::from_json(&json!(["nginx", "git"])));
        values
    }

    #[test]
    fn test_empty_collapse() {
        let empty = ConfigValues::new();
        assert!(ConfigValues::equivalent(None, None));
        assert!(ConfigValues::equivalent(None, Some(&empty)));
        assert!(ConfigValues::equivalent(Some(&empty), None));
        assert!(!ConfigValues::equivalent(None, Some(&sample())));
        assert!(!ConfigValues::equivalent(Some(&sample()), Some(&empty)));
        assert!(ConfigValues::equivalent(Some(&sample()), Some(&sample())));
    }

    #[test]
    fn test_json_map_round_trip() {
        let raw = json!({"hostname": "web01", "mtu": 9000, ">packages": ["nginx", "git"]});
        let serde_json::Value::Object(map) = raw else {
            panic!("expected object");
        };

        let values = ConfigValues::from_json_map(&map);
        assert_eq!(values, sample());
        assert_eq!(values.to_json_map(), map);
    }

    #[test]
    fn test_serde_is_plain_mapping() {
        let encoded = serde_json::to_value(sample()).unwrap();
        assert_eq!(
            encoded,
            json!({">packages": ["nginx", "git"], "hostname": "web01", "mtu": 9000})
        );

        let decoded: ConfigValues = serde_yaml::from_str("a: 1\nb: [x]\n").unwrap();
        assert_eq!(decoded.get("a"), Some(&ConfigValue::Number(1.0)));
        assert_eq!(decoded.len(), 2);
    }

    #[test]
    fn test_display() {
        let mut values = ConfigValues::new();
        values.insert("a", true);
        assert_eq!(values.to_string(), r#"{"a":true}"#);
    }
}

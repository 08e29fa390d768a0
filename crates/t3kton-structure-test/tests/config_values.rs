//! ConfigValue behavior across crate boundaries
//!
//! Values travel Contractor JSON -> status -> manifest YAML -> spec and back;
//! every hop must preserve them.

use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use t3kton_structured::{FileStructureStore, StructureStore};
use t3kton_types::{is_valid_config_name, ConfigValue, ConfigValues, Structure, StructureSpec};

fn samples() -> Vec<Value> {
    vec![
        Value::Null,
        json!(true),
        json!(0),
        json!(-17),
        json!(2.5),
        json!(9007199254740992i64),
        json!(""),
        json!("web01"),
        json!([]),
        json!([1, "two", null, [false]]),
        json!({}),
        json!({"nested": {"list": [1.5, {"deep": "yes"}]}, "flag": false}),
    ]
}

#[test]
fn test_json_text_round_trip() {
    for raw in samples() {
        let value = ConfigValue::from_json(&raw);
        let text = serde_json::to_string(&value).unwrap();
        let decoded: ConfigValue = serde_json::from_str(&text).unwrap();
        assert_eq!(decoded, value, "round trip of {raw}");
        assert_eq!(value.to_json(), raw);
    }
}

#[test]
fn test_yaml_round_trip() {
    for raw in samples() {
        let value = ConfigValue::from_json(&raw);
        let text = serde_yaml::to_string(&value).unwrap();
        let decoded: ConfigValue = serde_yaml::from_str(&text).unwrap();
        assert_eq!(decoded, value, "round trip of {raw}");
    }
}

#[test]
fn test_integral_floats_are_integers_on_the_wire() {
    let value = ConfigValue::from_json(&json!(3.0));
    assert_eq!(value, ConfigValue::from_json(&json!(3)));
    assert_eq!(serde_json::to_string(&value).unwrap(), "3");
}

#[test]
fn test_absent_equals_empty() {
    let empty = ConfigValues::new();
    assert!(ConfigValues::equivalent(None, Some(&empty)));
    assert!(ConfigValues::equivalent(Some(&empty), None));

    let mut one = ConfigValues::new();
    one.insert("a", 1i64);
    assert!(!ConfigValues::equivalent(None, Some(&one)));
}

#[test]
fn test_name_rules() {
    for name in ["a", "a:test", ">test", "stuff"] {
        assert!(is_valid_config_name(name), "{name}");
    }
    assert!(!is_valid_config_name("a:>test"));
}

#[tokio::test]
async fn test_values_survive_the_manifest_store() {
    let dir = tempfile_dir();
    let store = FileStructureStore::new(dir.path());

    let remote = json!({
        "mtu": 9000,
        ">packages": ["nginx", "git"],
        "~ntp": {"servers": ["10.0.0.1"], "iburst": true},
        "ratio": 0.25,
        "unset": null
    });
    let Value::Object(map) = remote.clone() else {
        panic!("expected object");
    };
    let values = ConfigValues::from_json_map(&map);

    let structure = Structure::new(
        "web01",
        StructureSpec {
            id: 42,
            state: "built".to_string(),
            blueprint: "base".to_string(),
            config_values: Some(values.clone()),
        },
    );
    store.put(structure).await.unwrap();

    let loaded = store.get("web01").await.unwrap().unwrap();
    let loaded_values = loaded.spec.config_values.unwrap();
    assert_eq!(loaded_values, values);
    assert_eq!(Value::Object(loaded_values.to_json_map()), remote);
}

fn tempfile_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("temp dir")
}

//! Admission followed by reconciliation
//!
//! A sparse manifest is defaulted from Contractor, validated, stored and
//! then reconciled without any further remote changes.

use pretty_assertions::assert_eq;
use serde_json::json;

use t3kton_structure_test::fixtures::{self, RemoteStructureFixture, BLUEPRINT};
use t3kton_structure_test::{CallVerifier, TestEnv};
use t3kton_structured::admission::{apply_defaults, validate_create, validate_update};
use t3kton_structured::{AdmissionError, Directive, StructureStore};
use t3kton_types::{Structure, StructureSpec};

#[tokio::test]
async fn test_defaulted_manifest_converges_without_mutations() {
    let env = TestEnv::new(
        StructureSpec::default(),
        RemoteStructureFixture::new("built").with_config_value("mtu", json!(9000)),
    );
    let contractor = env.reconciler.contractor().clone();
    env.transport.insert(fixtures::blueprint_uri(BLUEPRINT), json!({}));

    let mut manifest = Structure::new(
        "web01",
        StructureSpec {
            id: 42,
            ..Default::default()
        },
    );
    apply_defaults(&mut manifest.spec, &contractor).await.unwrap();
    assert_eq!(manifest.spec.state, "built");
    assert_eq!(manifest.spec.blueprint, BLUEPRINT);

    validate_create(&manifest, &contractor).await.unwrap();
    env.store.put(manifest).await.unwrap();

    env.transport.clear_calls();
    assert_eq!(env.pass().await.unwrap(), Directive::RequeueNow);
    assert_eq!(env.pass().await.unwrap(), Directive::Stop);
    CallVerifier::new(&env.transport).assert_read_only().unwrap();
}

#[tokio::test]
async fn test_invalid_manifest_reports_every_problem() {
    let env = TestEnv::new(
        fixtures::spec("built", BLUEPRINT),
        RemoteStructureFixture::new("planned"),
    );
    let contractor = env.reconciler.contractor().clone();

    let mut manifest = Structure::new("web02", fixtures::spec("built", "missing"));
    manifest.spec.id = 99;

    match validate_create(&manifest, &contractor).await {
        Err(AdmissionError::Invalid(errors)) => {
            assert_eq!(errors.len(), 2);
            assert_eq!(
                errors.to_string(),
                "[spec.id: structure not found, spec.blueprint: blueprint not found]"
            );
        }
        other => panic!("expected validation errors, got {other:?}"),
    }
}

#[tokio::test]
async fn test_state_change_rejected_while_job_runs() {
    let env = TestEnv::new(
        fixtures::spec("built", BLUEPRINT),
        RemoteStructureFixture::new("planned"),
    );
    env.transport.insert(fixtures::blueprint_uri(BLUEPRINT), json!({}));
    let contractor = env.reconciler.contractor().clone();

    // Observe, start the job, observe the job.
    for _ in 0..3 {
        env.pass().await.unwrap();
    }
    let existing = env.stored();
    assert!(existing.status.job.is_some());

    let mut updated = existing.clone();
    updated.spec.state = "planned".to_string();
    let err = validate_update(&updated, &existing, &contractor).await.unwrap_err();
    assert!(err.to_string().contains("can not change the State while there is a Job"));
}

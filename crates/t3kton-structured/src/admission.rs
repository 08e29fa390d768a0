//! Admission checks for Structures written by the external actor.
//!
//! Run before a manifest is stored: [`apply_defaults`] fills unset fields
//! from Contractor, then [`validate_create`] or [`validate_update`] collects
//! every problem into one [`ValidationErrors`].

use thiserror::Error;
use tracing::info;

use t3kton_contractor::{Contractor, ContractorError};
use t3kton_types::{
    validate_config_names, ConfigValues, Structure, StructureSpec, TargetState, ValidationErrors,
};

#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error(transparent)]
    Invalid(#[from] ValidationErrors),

    #[error("ID not set")]
    IdNotSet,

    #[error("Contractor lookup failed: {0}")]
    Remote(#[from] ContractorError),
}

fn blueprint_name(locator: &str) -> String {
    locator.split(':').nth(1).unwrap_or_default().to_string()
}

/// Fills unset state, blueprint and config values from Contractor.
pub async fn apply_defaults(spec: &mut StructureSpec, contractor: &Contractor) -> Result<(), AdmissionError> {
    if spec.id == 0 {
        return Err(AdmissionError::IdNotSet);
    }
    if !spec.state.is_empty() && !spec.blueprint.is_empty() && spec.config_values.is_some() {
        return Ok(());
    }

    let remote = contractor.structure(spec.id).await?;

    if spec.state.is_empty() {
        info!(state = %remote.state, "Defaulting state");
        spec.state = remote.state;
    }
    if spec.blueprint.is_empty() {
        spec.blueprint = blueprint_name(&remote.blueprint);
        info!(blueprint = %spec.blueprint, "Defaulting blueprint");
    }
    if spec.config_values.is_none() {
        info!(count = remote.config_values.len(), "Defaulting config values");
        spec.config_values = Some(ConfigValues::from_json_map(&remote.config_values));
    }
    Ok(())
}

async fn check_structure(structure: &Structure, contractor: &Contractor) -> Result<ValidationErrors, AdmissionError> {
    let spec = &structure.spec;
    let mut errors = ValidationErrors::new();

    match contractor.structure(spec.id).await {
        Ok(_) => {}
        Err(e) if e.is_not_found() => errors.push("spec.id", "structure not found"),
        Err(e) => return Err(e.into()),
    }

    if !spec.blueprint.is_empty() && !contractor.structure_blueprint_exists(&spec.blueprint).await? {
        errors.push("spec.blueprint", "blueprint not found");
    }

    if !spec.state.is_empty() && spec.target_state().is_err() {
        errors.push("spec.state", format!("invalid target state '{}'", spec.state));
    }

    if let Some(values) = &spec.config_values {
        if let Err(bad) = validate_config_names("spec.configValues", values) {
            errors.merge(bad);
        }
    }

    Ok(errors)
}

/// Checks a Structure about to be created.
pub async fn validate_create(structure: &Structure, contractor: &Contractor) -> Result<(), AdmissionError> {
    check_structure(structure, contractor).await?.into_result()?;
    Ok(())
}

/// Checks a change from `old` to `new`.
pub async fn validate_update(
    new: &Structure,
    old: &Structure,
    contractor: &Contractor,
) -> Result<(), AdmissionError> {
    let mut errors = check_structure(new, contractor).await?;

    if new.spec.id != old.spec.id {
        errors.push("spec.id", "can not change the ID");
    }

    let planned = TargetState::Planned.as_str();
    let blueprint_changed = new.spec.blueprint != old.spec.blueprint;
    let all_planned = [
        old.status.state.as_str(),
        new.status.state.as_str(),
        old.spec.state.as_str(),
        new.spec.state.as_str(),
    ]
    .iter()
    .all(|state| *state == planned);
    let job_in_flight = old.status.job.is_some() || new.status.job.is_some();

    if blueprint_changed && !all_planned {
        errors.push(
            "spec.blueprint",
            "can not change the BluePrint while not in 'Planned' State",
        );
    }
    if blueprint_changed && job_in_flight {
        errors.push("spec.blueprint", "can not change the BluePrint while there is a Job");
    }
    if new.spec.state != old.spec.state && job_in_flight {
        errors.push("spec.state", "can not change the State while there is a Job");
    }

    errors.into_result()?;
    Ok(())
}

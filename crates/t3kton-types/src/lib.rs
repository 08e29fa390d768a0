//! Shared types for the T3kton structure controllers.
//!
//! This crate provides the data model exchanged between the declared
//! Structure resource, the reconcile loop, and the Contractor provisioning
//! system:
//!
//! - [`ConfigValue`]: tagged-union configuration value with a bare JSON
//!   literal encoding
//! - [`ConfigValues`]: named mapping of config values
//! - [`Structure`], [`StructureSpec`], [`StructureStatus`], [`JobStatus`]:
//!   desired and observed resource state
//! - [`TargetState`]: the lifecycle states a Structure can be driven to
//! - [`ValidationErrors`]: aggregate of per-field validation failures

mod config_value;
mod config_values;
mod names;
mod structure;
mod validation;

pub use config_value::ConfigValue;
pub use config_values::ConfigValues;
pub use names::{is_valid_config_name, validate_config_names, CONFIG_NAME_PATTERN};
pub use structure::{
    JobStatus, ObjectMeta, Structure, StructureSpec, StructureStatus, TargetState,
};
pub use validation::{FieldError, ValidationErrors};

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid target state '{0}' (must be 'planned' or 'built')")]
    InvalidTargetState(String),
}

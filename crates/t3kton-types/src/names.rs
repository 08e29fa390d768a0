//! Configuration value name rules.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::{ConfigValues, FieldError, ValidationErrors};

/// Pattern every configuration value name must match.
///
/// An optional merge prefix (`<`, `>`, `-`, `~`), a name starting with an
/// alphanumeric, and an optional `:qualifier` suffix.
pub const CONFIG_NAME_PATTERN: &str = r"^[<>\-~]?[a-zA-Z0-9][a-zA-Z0-9_\-]*(:[a-zA-Z0-9]+)?$";

static CONFIG_NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(CONFIG_NAME_PATTERN).expect("config name pattern is valid"));

/// Returns true if `name` is an acceptable configuration value name.
///
/// # Examples
///
/// ```
/// use t3kton_types::is_valid_config_name;
///
/// assert!(is_valid_config_name(">packages"));
/// assert!(!is_valid_config_name("a:>test"));
/// ```
pub fn is_valid_config_name(name: &str) -> bool {
    CONFIG_NAME_REGEX.is_match(name)
}

/// Checks every name in `values`, reporting all offenders at once.
pub fn validate_config_names(field: &str, values: &ConfigValues) -> Result<(), ValidationErrors> {
    let errors: ValidationErrors = values
        .names()
        .filter(|name| !is_valid_config_name(name))
        .map(|name| {
            FieldError::new(
                format!("{field}[{name}]"),
                format!("invalid configuration value name '{name}'"),
            )
        })
        .collect();

    errors.into_result()
}

//! Configuration file support for structured.
//!
//! Loads and validates daemon configuration from TOML files.
//! Default location: /etc/t3kton/structured.toml

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use t3kton_contractor::HttpConfig;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/t3kton/structured.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse config file {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Invalid configuration for {field}: {message}")]
    Invalid { field: String, message: String },
}

impl ConfigError {
    fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Contractor connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractorSection {
    /// Base URL of the Contractor API host
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_username")]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Optional HTTP(S) proxy URL
    #[serde(default)]
    pub proxy: Option<String>,

    /// Seconds a login token is trusted before logging in again
    #[serde(default = "default_token_lifetime")]
    pub token_lifetime_secs: u64,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Pass scheduling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileSection {
    /// Delay between polls of an in-flight job
    #[serde(default = "default_job_poll_interval")]
    pub job_poll_interval_secs: u64,

    /// Delay before re-checking a converged Structure
    #[serde(default = "default_resync_interval")]
    pub resync_interval_secs: u64,

    /// First retry delay after a failed pass; doubles on each failure
    #[serde(default = "default_error_backoff")]
    pub error_backoff_secs: u64,

    #[serde(default = "default_max_error_backoff")]
    pub max_error_backoff_secs: u64,
}

/// Structure manifests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSection {
    #[serde(default = "default_store_directory")]
    pub directory: PathBuf,
}

/// Complete structured configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StructuredConfig {
    #[serde(default)]
    pub contractor: ContractorSection,

    #[serde(default)]
    pub reconcile: ReconcileSection,

    #[serde(default)]
    pub store: StoreSection,
}

fn default_host() -> String {
    "http://contractor".to_string()
}

fn default_username() -> String {
    "root".to_string()
}

fn default_token_lifetime() -> u64 {
    600
}

fn default_request_timeout() -> u64 {
    30
}

fn default_job_poll_interval() -> u64 {
    30
}

fn default_resync_interval() -> u64 {
    300
}

fn default_error_backoff() -> u64 {
    5
}

fn default_max_error_backoff() -> u64 {
    300
}

fn default_store_directory() -> PathBuf {
    PathBuf::from("/var/lib/t3kton/structures")
}

impl Default for ContractorSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            username: default_username(),
            password: String::new(),
            proxy: None,
            token_lifetime_secs: default_token_lifetime(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for ReconcileSection {
    fn default() -> Self {
        Self {
            job_poll_interval_secs: default_job_poll_interval(),
            resync_interval_secs: default_resync_interval(),
            error_backoff_secs: default_error_backoff(),
            max_error_backoff_secs: default_max_error_backoff(),
        }
    }
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            directory: default_store_directory(),
        }
    }
}

impl StructuredConfig {
    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                eprintln!(
                    "structured: Config file {} not found, using defaults",
                    path.display()
                );
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn job_poll_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile.job_poll_interval_secs)
    }

    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile.resync_interval_secs)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.reconcile.error_backoff_secs)
    }

    pub fn max_error_backoff(&self) -> Duration {
        Duration::from_secs(self.reconcile.max_error_backoff_secs)
    }

    /// Settings for the HTTP transport.
    pub fn http_config(&self) -> HttpConfig {
        HttpConfig {
            host: self.contractor.host.clone(),
            username: self.contractor.username.clone(),
            password: self.contractor.password.clone(),
            proxy: self.contractor.proxy.clone().filter(|p| !p.is_empty()),
            token_lifetime: Duration::from_secs(self.contractor.token_lifetime_secs),
            request_timeout: Duration::from_secs(self.contractor.request_timeout_secs),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let host = &self.contractor.host;
        if !(host.starts_with("http://") || host.starts_with("https://")) {
            return Err(ConfigError::invalid(
                "contractor.host",
                format!("'{host}' must be an http:// or https:// URL"),
            ));
        }
        if self.contractor.username.is_empty() {
            return Err(ConfigError::invalid("contractor.username", "must not be empty"));
        }
        if self.contractor.token_lifetime_secs == 0 {
            return Err(ConfigError::invalid("contractor.token_lifetime_secs", "must be > 0"));
        }
        if self.reconcile.job_poll_interval_secs == 0 {
            return Err(ConfigError::invalid("reconcile.job_poll_interval_secs", "must be > 0"));
        }
        if self.reconcile.error_backoff_secs == 0 {
            return Err(ConfigError::invalid("reconcile.error_backoff_secs", "must be > 0"));
        }
        if self.reconcile.max_error_backoff_secs < self.reconcile.error_backoff_secs {
            return Err(ConfigError::invalid(
                "reconcile.max_error_backoff_secs",
                "must be >= error_backoff_secs",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = StructuredConfig::default();
        assert_eq!(config.contractor.host, "http://contractor");
        assert_eq!(config.contractor.token_lifetime_secs, 600);
        assert_eq!(config.job_poll_interval(), Duration::from_secs(30));
        assert_eq!(config.resync_interval(), Duration::from_secs(300));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_str = r#"
[contractor]
host = "https://contractor.example.com"
username = "t3kton"
password = "secret"
proxy = ""

[reconcile]
job_poll_interval_secs = 10
"#;
        let config: StructuredConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.contractor.username, "t3kton");
        assert_eq!(config.job_poll_interval(), Duration::from_secs(10));
        // Unspecified values should use defaults
        assert_eq!(config.reconcile.max_error_backoff_secs, 300);
        assert_eq!(config.store.directory, PathBuf::from("/var/lib/t3kton/structures"));

        let http = config.http_config();
        assert_eq!(http.proxy, None);
        assert_eq!(http.token_lifetime, Duration::from_secs(600));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = StructuredConfig::default();
        config.contractor.host = "contractor:80".to_string();
        assert!(config.validate().is_err());

        let mut config = StructuredConfig::default();
        config.reconcile.job_poll_interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = StructuredConfig::default();
        config.reconcile.max_error_backoff_secs = 1;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_error_backoff_secs"));
    }

    #[test]
    fn test_load_nonexistent_file_defaults() {
        let config = StructuredConfig::load_or_default("/nonexistent/structured.toml").unwrap();
        assert_eq!(config.contractor.username, "root");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[store]\ndirectory = \"/tmp/structures\"").unwrap();

        let config = StructuredConfig::load_or_default(file.path()).unwrap();
        assert_eq!(config.store.directory, PathBuf::from("/tmp/structures"));

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        writeln!(bad, "[reconcile\n").unwrap();
        assert!(matches!(
            StructuredConfig::load_or_default(bad.path()),
            Err(ConfigError::Parse { .. })
        ));
    }
}

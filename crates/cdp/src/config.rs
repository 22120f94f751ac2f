//! Environment configuration
//!
//! Each environment has a YAML file named `{env}.yaml` in the working
//! directory. The loaded [`Config`] is passed explicitly to the components
//! that need it.
//!
//! ```yaml
//! regions:
//!   - us-east-1
//!   - us-west-2
//! default-path: /cdp/
//! policy-arn: arn:aws:iam::123456789012:policy/cdp-developer
//! ```

use cdp_common::defaults::{DEFAULT_ENV, default_group_description, default_path};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming the environment to load
pub const ENV_VAR: &str = "ENV";

/// Configuration loading failures
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Settings for one environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Regions queried when a command is not given any
    pub regions: Vec<String>,

    /// IAM path for listing and creating users
    #[serde(default = "default_path")]
    pub default_path: String,

    /// Managed policy attached to new users
    #[serde(default)]
    pub policy_arn: Option<String>,

    /// Description that marks a security group as Juju's
    #[serde(default = "default_group_description")]
    pub group_description: String,

    /// Named AWS credentials profile
    #[serde(default)]
    pub aws_profile: Option<String>,
}

impl Config {
    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self =
            serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Load `{env}.yaml` from `dir`.
    pub fn load_env(dir: &Path, env: &str) -> Result<Self, ConfigError> {
        Self::load(&dir.join(format!("{env}.yaml")))
    }

    /// Environment name: the explicit one, else `$ENV`, else `development`.
    pub fn env_name(explicit: Option<&str>) -> String {
        explicit
            .map(|e| e.to_string())
            .or_else(|| std::env::var(ENV_VAR).ok().filter(|e| !e.is_empty()))
            .unwrap_or_else(|| DEFAULT_ENV.to_string())
    }

    /// Region used for global services and credential resolution.
    pub fn home_region(&self) -> &str {
        // validate() guarantees at least one region
        self.regions.first().map(String::as_str).unwrap_or("us-east-1")
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.regions.is_empty() {
            return Err(ConfigError::Invalid("regions must list at least one region".into()));
        }
        if let Some(region) = self.regions.iter().find(|r| r.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!("empty region name {region:?}")));
        }
        if !(self.default_path.starts_with('/') && self.default_path.ends_with('/')) {
            return Err(ConfigError::Invalid(format!(
                "default-path must begin and end with '/', got {:?}",
                self.default_path
            )));
        }
        Ok(())
    }
}

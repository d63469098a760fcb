//! Engine configuration.
//!
//! Every field has a default, so an empty TOML document is a valid
//! configuration:
//!
//! ```toml
//! max_group_members = 500
//! key_schedule = "chained"      # or "static"
//! tree_hash = "positional"      # or "xor"
//! epoch_secret_retention = 0
//! verify_key_packages = false
//!
//! [size_thresholds]
//! optimal_max = 150
//! good_max = 300
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::key_schedule::KeySchedulePolicy;
use crate::tree::TreeHashMode;
use crate::MAX_GROUP_MEMBERS;

/// Environment variable naming a TOML file to load with [`MlsConfig::load`].
pub const CONFIG_ENV_VAR: &str = "SONET_MLS_CONFIG";

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MlsConfig {
    /// Hard cap on occupied leaves per group.
    #[serde(default = "default_max_group_members")]
    pub max_group_members: u32,
    /// Size bands reported by the governor.
    #[serde(default)]
    pub size_thresholds: SizeThresholds,
    #[serde(default)]
    pub key_schedule: KeySchedulePolicy,
    #[serde(default)]
    pub tree_hash: TreeHashMode,
    /// Superseded epoch secrets kept per group for late decryption.
    /// 0 erases each secret as soon as the epoch advances.
    #[serde(default)]
    pub epoch_secret_retention: usize,
    /// Reject key packages whose signatures do not verify.
    #[serde(default)]
    pub verify_key_packages: bool,
}

/// Upper bounds of the `OPTIMAL` and `GOOD` size bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeThresholds {
    #[serde(default = "default_optimal_max")]
    pub optimal_max: u32,
    #[serde(default = "default_good_max")]
    pub good_max: u32,
}

fn default_max_group_members() -> u32 {
    MAX_GROUP_MEMBERS
}

fn default_optimal_max() -> u32 {
    150
}

fn default_good_max() -> u32 {
    300
}

impl Default for SizeThresholds {
    fn default() -> Self {
        Self {
            optimal_max: default_optimal_max(),
            good_max: default_good_max(),
        }
    }
}

impl Default for MlsConfig {
    fn default() -> Self {
        Self {
            max_group_members: default_max_group_members(),
            size_thresholds: SizeThresholds::default(),
            key_schedule: KeySchedulePolicy::default(),
            tree_hash: TreeHashMode::default(),
            epoch_secret_retention: 0,
            verify_key_packages: false,
        }
    }
}

impl MlsConfig {
    /// Load from the file named by [`CONFIG_ENV_VAR`].
    ///
    /// Falls back to defaults if the variable is unset or the file does
    /// not exist.
    pub fn load() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) if Path::new(&path).exists() => Self::from_path(path),
            _ => Ok(Self::default()),
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: MlsConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the size bands are ordered below the member cap.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_group_members == 0 {
            return Err(ConfigError::Invalid("max_group_members must be positive".into()));
        }
        let t = &self.size_thresholds;
        if t.optimal_max > t.good_max {
            return Err(ConfigError::Invalid(format!(
                "optimal_max ({}) exceeds good_max ({})",
                t.optimal_max, t.good_max
            )));
        }
        if t.good_max >= self.max_group_members {
            return Err(ConfigError::Invalid(format!(
                "good_max ({}) must be below max_group_members ({})",
                t.good_max, self.max_group_members
            )));
        }
        Ok(())
    }
}

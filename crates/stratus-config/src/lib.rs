pub mod error;

pub use error::*;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_PATH_ENV: &str = "STRATUS_CONFIG_PATH";
/// Upper bound for any duration in the file (one week)
const MAX_DURATION_SECS: u64 = 7 * 24 * 60 * 60;
const CANDIDATES: [&str; 4] = [
    "stratus.local.yaml",
    ".stratus.local.yaml",
    "stratus.yaml",
    ".stratus.yaml",
];

/// Stratus global config directory (`~/.config/stratus`)
pub fn get_config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join("stratus"))
        .ok_or(ConfigError::ConfigDirNotFound)
}

/// Locate the provider config file
///
/// Search order:
/// 1. `STRATUS_CONFIG_PATH` environment variable (direct path)
/// 2. current directory: stratus.local.yaml, .stratus.local.yaml, stratus.yaml, .stratus.yaml
/// 3. `./.stratus/` with the same names
/// 4. `~/.config/stratus/stratus.yaml` (global)
pub fn find_config_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!(
            "{} points at missing file {}, falling back to search",
            CONFIG_PATH_ENV,
            path.display()
        );
    }

    let current_dir = std::env::current_dir()?;

    if let Some(path) = first_existing(&current_dir) {
        return Ok(path);
    }

    let local_dir = current_dir.join(".stratus");
    if local_dir.is_dir() {
        if let Some(path) = first_existing(&local_dir) {
            return Ok(path);
        }
    }

    if let Ok(config_dir) = get_config_dir() {
        let global_config = config_dir.join("stratus.yaml");
        if global_config.exists() {
            return Ok(global_config);
        }
    }

    Err(ConfigError::ConfigFileNotFound)
}

fn first_existing(dir: &Path) -> Option<PathBuf> {
    CANDIDATES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.exists())
}

/// Lifecycle operation a timeout applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    Delete,
}

/// Per resource kind timeout overrides, in seconds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeoutOverrides {
    #[serde(default)]
    pub create_secs: Option<u64>,
    #[serde(default)]
    pub update_secs: Option<u64>,
    #[serde(default)]
    pub delete_secs: Option<u64>,
}

impl TimeoutOverrides {
    pub fn get(&self, operation: Operation) -> Option<Duration> {
        let secs = match operation {
            Operation::Create => self.create_secs,
            Operation::Update => self.update_secs,
            Operation::Delete => self.delete_secs,
        };
        secs.map(Duration::from_secs)
    }
}

/// Retry budget for mutating calls, in seconds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrySettings {
    #[serde(default)]
    pub max_duration_secs: Option<u64>,
    #[serde(default)]
    pub interval_secs: Option<u64>,
}

/// Provider configuration file (`stratus.yaml`)
///
/// ```yaml
/// region: jp-east-1
/// retry:
///   max_duration_secs: 300
///   interval_secs: 2
/// timeouts:
///   db_instance:
///     create_secs: 4800
///     delete_secs: 4800
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub timeouts: HashMap<String, TimeoutOverrides>,
}

impl ProviderConfig {
    /// Load from the discovered config file, or defaults when there is none.
    pub fn load() -> Result<Self> {
        match find_config_file() {
            Ok(path) => Self::load_from_path(&path),
            Err(ConfigError::ConfigFileNotFound) => {
                tracing::debug!("No config file found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e),
        }
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_yaml(&content).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for (kind, overrides) in &self.timeouts {
            for (name, value) in [
                ("create_secs", overrides.create_secs),
                ("update_secs", overrides.update_secs),
                ("delete_secs", overrides.delete_secs),
            ] {
                check_secs(&format!("timeouts.{}.{}", kind, name), value, false)?;
            }
        }
        check_secs("retry.max_duration_secs", self.retry.max_duration_secs, true)?;
        check_secs("retry.interval_secs", self.retry.interval_secs, false)?;
        Ok(())
    }

    /// Timeout override for one resource kind and operation.
    pub fn timeout(&self, kind: &str, operation: Operation) -> Option<Duration> {
        self.timeouts.get(kind).and_then(|t| t.get(operation))
    }

    pub fn retry_max_duration(&self) -> Option<Duration> {
        self.retry.max_duration_secs.map(Duration::from_secs)
    }

    pub fn retry_interval(&self) -> Option<Duration> {
        self.retry.interval_secs.map(Duration::from_secs)
    }
}

fn check_secs(field: &str, value: Option<u64>, allow_zero: bool) -> Result<()> {
    let reason = match value {
        Some(0) if !allow_zero => "must be greater than zero".to_string(),
        Some(secs) if secs > MAX_DURATION_SECS => {
            format!("must be at most {} seconds", MAX_DURATION_SECS)
        }
        _ => return Ok(()),
    };
    Err(ConfigError::InvalidValue {
        field: field.to_string(),
        reason,
    })
}

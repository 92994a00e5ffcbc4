//! Configuration file support for wtrack.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/wtrack/config.toml`.

use crate::sync::DEFAULT_SYNC_MARKER;
use crate::{CalorieModel, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub user: UserConfig,

    #[serde(default)]
    pub calories: CaloriesConfig,

    #[serde(default)]
    pub sync: SyncConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl DataConfig {
    pub fn store_path(&self) -> PathBuf {
        store_path(&self.data_dir)
    }

    pub fn queue_path(&self) -> PathBuf {
        queue_path(&self.data_dir)
    }
}

/// File holding sessions, planned workouts and metrics
pub fn store_path(data_dir: &Path) -> PathBuf {
    data_dir.join("store.json")
}

/// Live measurement event queue
pub fn queue_path(data_dir: &Path) -> PathBuf {
    data_dir.join("queue").join("measurements.jsonl")
}

/// Local user settings
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct UserConfig {
    /// User the CLI acts for when `--user` is not given
    #[serde(default)]
    pub id: Option<Uuid>,
}

/// Whole-session calorie estimate parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CaloriesConfig {
    #[serde(default = "default_met")]
    pub met: f64,

    /// Body weight used when the real one is unknown
    #[serde(default = "default_body_weight_kg")]
    pub body_weight_kg: f64,

    /// Use the user's latest recorded Weight metric when one exists
    #[serde(default)]
    pub use_recorded_weight: bool,
}

impl Default for CaloriesConfig {
    fn default() -> Self {
        Self {
            met: default_met(),
            body_weight_kg: default_body_weight_kg(),
            use_recorded_weight: false,
        }
    }
}

impl CaloriesConfig {
    pub fn model(&self) -> CalorieModel {
        CalorieModel {
            met: self.met,
            body_weight_kg: self.body_weight_kg,
        }
    }
}

/// Measurement synchronization settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_sync_marker")]
    pub marker: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            marker: default_sync_marker(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(".local/share"))
            .unwrap_or_else(|| PathBuf::from("."))
    });
    base.join("wtrack")
}

fn default_met() -> f64 {
    CalorieModel::DEFAULT_MET
}

fn default_body_weight_kg() -> f64 {
    CalorieModel::DEFAULT_BODY_WEIGHT_KG
}

fn default_sync_marker() -> String {
    DEFAULT_SYNC_MARKER.to_string()
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            std::env::var_os("HOME")
                .map(|home| PathBuf::from(home).join(".config"))
                .unwrap_or_else(|| PathBuf::from("."))
        });
        base.join("wtrack").join("config.toml")
    }

    /// Reject values the domain cannot work with
    pub fn validate(&self) -> Result<()> {
        if !(self.calories.met.is_finite() && self.calories.met > 0.0) {
            return Err(Error::Config(format!(
                "calories.met must be positive, got {}",
                self.calories.met
            )));
        }
        if !(self.calories.body_weight_kg.is_finite() && self.calories.body_weight_kg > 0.0) {
            return Err(Error::Config(format!(
                "calories.body_weight_kg must be positive, got {}",
                self.calories.body_weight_kg
            )));
        }
        if self.sync.marker.trim().is_empty() {
            return Err(Error::Config("sync.marker must not be blank".into()));
        }
        if self.user.id.is_some_and(|id| id.is_nil()) {
            return Err(Error::Config("user.id must not be the nil uuid".into()));
        }
        Ok(())
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.calories.met, 5.0);
        assert_eq!(config.calories.body_weight_kg, 70.0);
        assert_eq!(config.sync.marker, "[auto-sync]");
        assert!(config.user.id.is_none());
        assert!(config.validate().is_ok());
        assert_eq!(config.calories.model(), CalorieModel::default());
    }

    #[test]
    fn test_config_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");

        let mut config = Config::default();
        config.user.id = Some(Uuid::new_v4());
        config.calories.body_weight_kg = 82.5;
        config.save_to(&path).unwrap();

        let parsed = Config::load_from(&path).unwrap();
        assert_eq!(parsed.user.id, config.user.id);
        assert_eq!(parsed.calories.body_weight_kg, 82.5);
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[calories]
body_weight_kg = 90.0
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.calories.body_weight_kg, 90.0);
        assert_eq!(config.calories.met, 5.0); // default
        assert!(!config.calories.use_recorded_weight);
        assert_eq!(config.sync.marker, "[auto-sync]");
    }

    #[test]
    fn test_invalid_calorie_settings_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[calories]\nmet = 0.0\n").unwrap();

        assert!(matches!(Config::load_from(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_data_paths() {
        let data = DataConfig {
            data_dir: PathBuf::from("/tmp/wtrack"),
        };
        assert_eq!(data.store_path(), PathBuf::from("/tmp/wtrack/store.json"));
        assert_eq!(
            data.queue_path(),
            PathBuf::from("/tmp/wtrack/queue/measurements.jsonl")
        );
    }
}

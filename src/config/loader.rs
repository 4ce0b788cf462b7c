//! Configuration Loader
//!
//! Environment-aware configuration loading. A single `bridgesync-config.yaml`
//! holds base settings plus optional per-environment sections
//! (`development:` / `test:` / `production:`) that are deep-merged over the
//! base before deserialization. A missing file yields the defaults, so
//! embedded and test usage never needs a config directory.

use serde_yaml::Value as YamlValue;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use super::BridgeSyncConfig;
use crate::error::{Result, SyncError};

const CONFIG_FILE_NAME: &str = "bridgesync-config.yaml";
const ENVIRONMENT_SECTIONS: [&str; 3] = ["development", "test", "production"];

/// Loaded configuration plus the environment it was resolved for.
#[derive(Debug)]
pub struct ConfigManager {
    config: BridgeSyncConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection.
    pub fn load() -> Result<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory.
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> Result<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with an explicit environment.
    ///
    /// Useful in tests, which must not mutate process environment variables.
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> Result<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(|| PathBuf::from("config"));

        debug!(
            environment = environment,
            directory = %config_directory.display(),
            "Loading bridgesync configuration"
        );

        let config_file = config_directory.join(CONFIG_FILE_NAME);
        let config = if config_file.is_file() {
            Self::load_and_merge_config(&config_file, environment)?
        } else {
            warn!(
                file = %config_file.display(),
                "Configuration file not found, using defaults"
            );
            BridgeSyncConfig::default()
        };

        config.validate()?;

        debug!(
            environment = environment,
            inbound_queue = %config.messaging.inbound_queue,
            outbound_queue = %config.messaging.outbound_queue,
            "✅ Configuration loaded"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &BridgeSyncConfig {
        &self.config
    }

    /// Environment the configuration was resolved for.
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Directory the configuration was loaded from.
    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Detect the runtime environment from well-known variables.
    pub fn detect_environment() -> String {
        env::var("BRIDGESYNC_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
    }

    fn load_and_merge_config(config_file: &Path, environment: &str) -> Result<BridgeSyncConfig> {
        let yaml_content = std::fs::read_to_string(config_file).map_err(|e| {
            SyncError::Configuration(format!(
                "Failed to read {}: {}",
                config_file.display(),
                e
            ))
        })?;

        let mut yaml_data: YamlValue = serde_yaml::from_str(&yaml_content).map_err(|e| {
            SyncError::Configuration(format!(
                "Invalid YAML in {}: {}",
                config_file.display(),
                e
            ))
        })?;

        if let Some(env_overrides) = yaml_data.get(environment).cloned() {
            debug!(environment = environment, "Applying environment overrides");
            Self::merge_yaml_values(&mut yaml_data, env_overrides);
        }

        // Environment sections are overlay input, not config keys.
        if let YamlValue::Mapping(ref mut map) = yaml_data {
            for section in ENVIRONMENT_SECTIONS {
                map.remove(&YamlValue::String(section.to_string()));
            }
        }

        serde_yaml::from_value(yaml_data).map_err(|e| {
            SyncError::Configuration(format!(
                "Failed to deserialize {}: {}",
                config_file.display(),
                e
            ))
        })
    }

    /// Recursively merge YAML values, overrides winning over base keys.
    fn merge_yaml_values(base: &mut YamlValue, override_value: YamlValue) {
        match (&mut *base, override_value) {
            (YamlValue::Mapping(base_map), YamlValue::Mapping(override_map)) => {
                for (key, value) in override_map {
                    if let Some(existing_value) = base_map.get_mut(&key) {
                        Self::merge_yaml_values(existing_value, value);
                    } else {
                        base_map.insert(key, value);
                    }
                }
            }
            (base_ref, override_val) => {
                *base_ref = override_val;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(dir: &Path, contents: &str) {
        let mut file = std::fs::File::create(dir.join(CONFIG_FILE_NAME)).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let manager =
            ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test")
                .unwrap();
        assert_eq!(manager.config().messaging.batch_size, 10);
        assert_eq!(manager.environment(), "test");
    }

    #[test]
    fn test_environment_overlay_wins() {
        let dir = tempfile::tempdir().unwrap();
        write_config(
            dir.path(),
            concat!(
                "messaging:\n",
                "  inbound_queue: base_inbound\n",
                "  batch_size: 25\n",
                "test:\n",
                "  messaging:\n",
                "    inbound_queue: test_inbound\n",
            ),
        );

        let manager =
            ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test")
                .unwrap();
        assert_eq!(manager.config().messaging.inbound_queue, "test_inbound");
        // Non-overridden keys keep their base values.
        assert_eq!(manager.config().messaging.batch_size, 25);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_config(
            dir.path(),
            concat!("lock:\n", "  ttl_seconds: 10\n", "  renew_interval_seconds: 10\n"),
        );

        let err = ConfigManager::load_from_directory_with_env(
            Some(dir.path().to_path_buf()),
            "development",
        )
        .unwrap_err();
        assert!(err.to_string().contains("renew_interval_seconds"));
    }
}

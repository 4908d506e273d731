use std::fs::{File, read_to_string};
use std::io::Error as IoError;
use std::io::Write;
use std::path::Path;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use tracing::debug;

use procgroup_metadata::group::{AccessMode, PullPolicy, ServiceType};
use procgroup_metadata::resource::ResourceLimit;

const DEFAULT_CPU_UNIT: &str = "m";
const DEFAULT_CPU_REQUEST: i64 = 100;
const DEFAULT_CPU_LIMIT: i64 = 1000;

const DEFAULT_MEMORY_UNIT: &str = "Mi";
const DEFAULT_MEMORY_REQUEST: i64 = 128;
const DEFAULT_MEMORY_LIMIT: i64 = 512;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IoError: {0}")]
    IoError(#[from] IoError),
    #[error("TomlError: {0}")]
    TomlError(#[from] toml::de::Error),
    #[error("TomlSerError: {0}")]
    TomlSerError(#[from] toml::ser::Error),
}

/// Platform wide defaults applied while translating process groups
#[derive(Builder, Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[builder(default)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// cpu limit of processes declaring none
    pub default_cpu: ResourceLimit,
    /// memory limit of processes declaring none
    pub default_memory: ResourceLimit,
    pub default_pull_policy: PullPolicy,
    pub default_service_type: ServiceType,
    /// storage class of volumes and claims without an explicit class
    #[builder(setter(into, strip_option))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,
    pub default_access_mode: AccessMode,
    /// whether destroy also removes persistent volumes unless told otherwise
    pub remove_storage_resource: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_cpu: ResourceLimit::cpu(DEFAULT_CPU_UNIT, DEFAULT_CPU_REQUEST, DEFAULT_CPU_LIMIT),
            default_memory: ResourceLimit::memory(
                DEFAULT_MEMORY_UNIT,
                DEFAULT_MEMORY_REQUEST,
                DEFAULT_MEMORY_LIMIT,
            ),
            default_pull_policy: PullPolicy::default(),
            default_service_type: ServiceType::default(),
            storage_class: None,
            default_access_mode: AccessMode::default(),
            remove_storage_resource: false,
        }
    }
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    pub fn load_from<T: AsRef<Path>>(path: T) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        debug!(?path_ref, "loading engine config");

        let file_str = read_to_string(path_ref)?;
        Self::load_str(&file_str)
    }

    pub fn load_str(config: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(config)?)
    }

    pub fn save_to<T: AsRef<Path>>(&self, path: T) -> Result<(), ConfigError> {
        let path_ref = path.as_ref();
        debug!(?path_ref, "saving engine config");

        let toml = toml::to_string(self)?;
        let mut file = File::create(path_ref)?;
        file.write_all(toml.as_bytes())?;
        file.sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn test_load_partial_config() {
        let config = EngineConfig::load_str(
            r#"
defaultPullPolicy = "Always"
storageClass = "fast"
removeStorageResource = true

[defaultMemory]
type = "memory"
unit = "Gi"
minimum = 1
maximum = 2
"#,
        )
        .expect("parse");

        assert_eq!(config.default_pull_policy, PullPolicy::Always);
        assert_eq!(config.storage_class.as_deref(), Some("fast"));
        assert!(config.remove_storage_resource);
        assert_eq!(config.default_memory.unit, "Gi");
        assert_eq!(config.default_cpu, EngineConfig::default().default_cpu);
        assert_eq!(config.default_service_type, ServiceType::ClusterIP);
    }

    #[test]
    fn test_builder_defaults() {
        let config = EngineConfig::builder()
            .storage_class("standard")
            .build()
            .expect("build");

        assert_eq!(config.storage_class.as_deref(), Some("standard"));
        assert_eq!(config.default_cpu.maximum, DEFAULT_CPU_LIMIT);
        assert!(!config.remove_storage_resource);
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            EngineConfig::load_str("defaultPullPolicy = 3"),
            Err(ConfigError::TomlError(_))
        ));
    }
}

//! Sensor configuration.
//!
//! Every field has a default, so an empty document is a valid configuration. The driver runs on
//! `SensorConfig::default()`; host tools and tests load TOML.

use alloc::vec;
use alloc::vec::Vec;

use serde::Deserialize;
use thiserror::Error;
use vigil_shared::constants::DEFAULT_QUEUE_CAPACITY;
use vigil_shared::ops::{FileOperation, OperationSet, RegistryOperation};
use vigil_shared::wire::PoolClass;

/// Which processes get a registry entry when they start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingPolicy {
    /// Children of tracked processes, starting from roots added with `watch`.
    #[default]
    Descendants,
    /// Every process the notifier reports.
    All,
}

/// Mirror of the `[process]` table
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessFilterConfig {
    #[serde(default = "default_capacity")] pub capacity: usize,
    #[serde(default)]                      pub pool:     PoolClass,
    #[serde(default)]                      pub tracking: TrackingPolicy,
}

/// Mirror of the `[file_system]` table
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileSystemFilterConfig {
    #[serde(default = "default_capacity")]        pub capacity:   usize,
    #[serde(default)]                             pub pool:       PoolClass,
    #[serde(default = "default_file_operations")] pub operations: Vec<FileOperation>,
}

/// Mirror of the `[registry]` table
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryFilterConfig {
    #[serde(default = "default_capacity")]            pub capacity:   usize,
    #[serde(default)]                                 pub pool:       PoolClass,
    #[serde(default = "default_registry_operations")] pub operations: Vec<RegistryOperation>,
}

/// Mirror of the `[logging]` table
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    #[serde(default = "default_level")] pub level: log::LevelFilter,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SensorConfig {
    #[serde(default)] pub process:     ProcessFilterConfig,
    #[serde(default)] pub file_system: FileSystemFilterConfig,
    #[serde(default)] pub registry:    RegistryFilterConfig,
    #[serde(default)] pub logging:     LoggingConfig,
}

fn default_capacity() -> usize { DEFAULT_QUEUE_CAPACITY }
fn default_level() -> log::LevelFilter { log::LevelFilter::Info }

fn default_file_operations() -> Vec<FileOperation> {
    vec![FileOperation::Create, FileOperation::Write]
}

fn default_registry_operations() -> Vec<RegistryOperation> {
    vec![
        RegistryOperation::PreCreateKeyEx,
        RegistryOperation::PreOpenKeyEx,
        RegistryOperation::PreDeleteKey,
        RegistryOperation::PreRenameKey,
        RegistryOperation::PreSetValueKey,
        RegistryOperation::PreDeleteValueKey,
    ]
}

impl Default for ProcessFilterConfig {
    fn default() -> Self {
        Self { capacity: default_capacity(), pool: PoolClass::default(), tracking: TrackingPolicy::default() }
    }
}

impl Default for FileSystemFilterConfig {
    fn default() -> Self {
        Self { capacity: default_capacity(), pool: PoolClass::default(), operations: default_file_operations() }
    }
}

impl Default for RegistryFilterConfig {
    fn default() -> Self {
        Self { capacity: default_capacity(), pool: PoolClass::default(), operations: default_registry_operations() }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_level() }
    }
}

impl FileSystemFilterConfig {
    pub fn operation_set(&self) -> OperationSet {
        self.operations.iter().copied().collect()
    }
}

impl RegistryFilterConfig {
    pub fn operation_set(&self) -> OperationSet {
        self.operations.iter().copied().collect()
    }
}

/// A configuration the sensor cannot run with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("[{0}] capacity must be non-zero")]
    ZeroCapacity(&'static str),
}

/// All the ways config loading can go wrong
#[cfg(feature = "std")]
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

impl SensorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (table, capacity) in [
            ("process", self.process.capacity),
            ("file_system", self.file_system.capacity),
            ("registry", self.registry.capacity),
        ] {
            if capacity == 0 {
                return Err(ConfigError::ZeroCapacity(table));
            }
        }
        Ok(())
    }

    /// Parse and validate a TOML document.
    #[cfg(feature = "std")]
    pub fn from_toml(text: &str) -> Result<Self, LoadError> {
        let cfg: SensorConfig = toml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read, parse and validate the TOML file at `path`.
    #[cfg(feature = "std")]
    pub fn load(path: &std::path::Path) -> Result<Self, LoadError> {
        log::debug!("reading sensor config from {}", path.display());
        let text = std::fs::read_to_string(path)?;
        let cfg = Self::from_toml(&text)?;
        log::info!("loaded sensor config from {}", path.display());
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_table() {
        let cfg = SensorConfig::default();
        assert_eq!(cfg.process.capacity, 1024);
        assert_eq!(cfg.process.tracking, TrackingPolicy::Descendants);
        assert_eq!(cfg.file_system.pool, PoolClass::NonPaged);
        assert_eq!(cfg.file_system.operation_set().len(), 2);
        assert!(cfg.registry.operation_set().contains(RegistryOperation::PreSetValueKey.notify_class()));
        assert_eq!(cfg.logging.level, log::LevelFilter::Info);
        cfg.validate().unwrap();
    }

    #[test]
    fn zero_capacity_names_its_table() {
        let mut cfg = SensorConfig::default();
        cfg.registry.capacity = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::ZeroCapacity("registry"))));
    }
}

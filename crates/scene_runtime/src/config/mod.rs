//! Runtime configuration
//!
//! Settings load from TOML or RON by file extension; every section has
//! defaults so a missing or partial file still yields a working
//! runtime.

pub use serde::{Deserialize, Serialize};

use crate::scripting::LoopSettings;
use crate::spatial::QuadTreeConfig;

/// File-backed configuration
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from a `.toml` or `.ron` file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;

        if path.ends_with(".toml") {
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else if path.ends_with(".ron") {
            ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Save configuration to a `.toml` or `.ron` file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, Default::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// World extents the spatial index covers
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Minimum X corner
    pub x: f32,
    /// Minimum Z corner
    pub z: f32,
    /// Width along X
    pub width: f32,
    /// Depth along Z
    pub depth: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            x: -500.0,
            z: -500.0,
            width: 1000.0,
            depth: 1000.0,
        }
    }
}

/// Spatial index tuning
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialConfig {
    /// Objects a node holds before splitting
    pub max_objects: usize,
    /// Maximum subdivision depth
    pub max_levels: u32,
}

impl Default for SpatialConfig {
    fn default() -> Self {
        let defaults = QuadTreeConfig::default();
        Self {
            max_objects: defaults.max_objects,
            max_levels: defaults.max_levels,
        }
    }
}

impl From<SpatialConfig> for QuadTreeConfig {
    fn from(config: SpatialConfig) -> Self {
        Self {
            max_objects: config.max_objects,
            max_levels: config.max_levels,
        }
    }
}

/// Frame pacing settings
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Seconds per fixed sub-step
    pub fixed_time_step: f32,
    /// Fixed sub-step cap per frame
    pub max_sub_steps: u32,
}

impl Default for LoopConfig {
    fn default() -> Self {
        let defaults = LoopSettings::default();
        Self {
            fixed_time_step: defaults.fixed_time_step,
            max_sub_steps: defaults.max_sub_steps,
        }
    }
}

impl From<LoopConfig> for LoopSettings {
    fn from(config: LoopConfig) -> Self {
        Self {
            fixed_time_step: config.fixed_time_step,
            max_sub_steps: config.max_sub_steps,
        }
    }
}

/// Background worker settings
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Worker threads spawned on entering play mode
    pub threads: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { threads: 2 }
    }
}

/// Top-level runtime configuration
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// World extents
    pub world: WorldConfig,
    /// Spatial index tuning
    pub spatial: SpatialConfig,
    /// Frame pacing
    pub game_loop: LoopConfig,
    /// Background workers
    pub workers: WorkerConfig,
}

impl Config for RuntimeConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = RuntimeConfig::default();
        assert_eq!(config.spatial.max_objects, 10);
        assert_eq!(config.spatial.max_levels, 5);
        assert_eq!(config.workers.threads, 2);
        assert!(config.game_loop.fixed_time_step > 0.0);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let parsed: RuntimeConfig = toml::from_str(
            r#"
            [workers]
            threads = 8
            "#,
        )
        .unwrap();
        assert_eq!(parsed.workers.threads, 8);
        assert_eq!(parsed.spatial.max_objects, 10);
    }

    #[test]
    fn toml_round_trip() {
        let mut config = RuntimeConfig::default();
        config.game_loop.max_sub_steps = 9;
        let text = toml::to_string_pretty(&config).unwrap();
        let back: RuntimeConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.game_loop.max_sub_steps, 9);
    }
}

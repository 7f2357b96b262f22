use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Tunable thresholds for the extraction heuristics. Every field has a
/// production default; a TOML file can override any subset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Linear contrast coefficient applied around the 128 midpoint.
    pub contrast_k: f32,
    /// Channel values above this become white during passport binarization.
    pub binarize_threshold: u8,
    /// Floor of the plausible range for bare birth-year candidates.
    pub bare_year_floor: i32,
    /// Minimum assumed holder age; caps bare birth-year candidates at
    /// `current_year - min_holder_age`.
    pub min_holder_age: i32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            contrast_k: 1.5,
            binarize_threshold: 120,
            bare_year_floor: 1920,
            min_holder_age: 18,
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }
}

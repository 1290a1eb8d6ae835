//! Study configuration files (TOML).

use std::path::Path;

use crate::domain::StudyConfig;
use crate::error::SimError;
use crate::io::export::io_error;

/// Load a study config. Missing keys take their defaults.
pub fn load_config(path: &Path) -> Result<StudyConfig, SimError> {
    let content = std::fs::read_to_string(path).map_err(io_error(path))?;
    parse_config(&content).map_err(|e| match e {
        SimError::Config(msg) => SimError::Config(format!("{}: {msg}", path.display())),
        other => other,
    })
}

pub fn parse_config(content: &str) -> Result<StudyConfig, SimError> {
    toml::from_str(content).map_err(|e| SimError::Config(e.to_string()))
}

/// Render a config as TOML (what `bvsim config` prints).
pub fn config_to_toml(config: &StudyConfig) -> Result<String, SimError> {
    toml::to_string_pretty(config).map_err(|e| SimError::Config(e.to_string()))
}

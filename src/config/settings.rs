//! Optional configuration file loaded from TOML
//!
//! Every field is optional; anything left out keeps the built-in default or
//! the value from the environment.
//!
//! ```toml
//! [bot]
//! modes = ["en", "es"]
//! default_mode = "en"
//! data_dir = "./data"
//! fuzzy_threshold = 0.6
//!
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};

use super::ConfigError;

/// Root of the configuration file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsFile {
    /// Knowledge and language-mode settings
    #[serde(default)]
    pub bot: BotSettings,

    /// HTTP API settings
    #[serde(default)]
    pub server: ServerSettings,
}

impl SettingsFile {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let settings: SettingsFile = toml::from_str(content)?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BotSettings {
    /// Configured language modes
    #[serde(default)]
    pub modes: Option<Vec<String>>,

    /// Mode active at startup
    #[serde(default)]
    pub default_mode: Option<String>,

    /// Root directory holding one sub-directory per mode
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Minimum similarity ratio for fuzzy matches
    #[serde(default)]
    pub fuzzy_threshold: Option<f64>,

    /// Fixed seed for joke/topic selection
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerSettings {
    #[serde(default)]
    pub host: Option<String>,

    #[serde(default)]
    pub port: Option<u16>,
}

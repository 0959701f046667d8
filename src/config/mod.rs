//! Application configuration

pub mod messages;
pub mod settings;

use std::env;
use std::path::{Path, PathBuf};

use crate::core::matcher::DEFAULT_THRESHOLD;

pub use messages::Messages;
pub use settings::SettingsFile;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub modes: Vec<String>,
    pub default_mode: String,
    pub fuzzy_threshold: f64,
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3000,
            data_dir: PathBuf::from("./data"),
            modes: vec!["en".into(), "es".into()],
            default_mode: "en".into(),
            fuzzy_threshold: DEFAULT_THRESHOLD,
            seed: None,
        }
    }
}

impl Config {
    /// Defaults, then the optional TOML file, then environment variables
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(path) = file {
            config.apply_file(SettingsFile::from_file(path)?);
        }
        config.apply_env(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_file(&mut self, file: SettingsFile) {
        let SettingsFile { bot, server } = file;

        if let Some(modes) = bot.modes {
            self.modes = modes;
        }
        if let Some(mode) = bot.default_mode {
            self.default_mode = mode;
        }
        if let Some(dir) = bot.data_dir {
            self.data_dir = dir;
        }
        if let Some(threshold) = bot.fuzzy_threshold {
            self.fuzzy_threshold = threshold;
        }
        if bot.seed.is_some() {
            self.seed = bot.seed;
        }
        if let Some(host) = server.host {
            self.host = host;
        }
        if let Some(port) = server.port {
            self.port = port;
        }
        self.normalize_modes();
    }

    /// Apply overrides from a variable lookup (the process environment in production)
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("PORT").and_then(|p| p.parse().ok()) {
            self.port = port;
        }
        if let Some(dir) = lookup("TEACHBOT_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(modes) = lookup("TEACHBOT_MODES") {
            self.modes = modes
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(mode) = lookup("TEACHBOT_DEFAULT_MODE") {
            self.default_mode = mode;
        }
        if let Some(threshold) = lookup("TEACHBOT_FUZZY_THRESHOLD") {
            self.fuzzy_threshold = threshold.trim().parse().map_err(|_| {
                ConfigError::Validation(format!("invalid TEACHBOT_FUZZY_THRESHOLD '{}'", threshold))
            })?;
        }
        if let Some(seed) = lookup("TEACHBOT_SEED") {
            self.seed = Some(seed.trim().parse().map_err(|_| {
                ConfigError::Validation(format!("invalid TEACHBOT_SEED '{}'", seed))
            })?);
        }
        self.normalize_modes();
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.modes.is_empty() {
            return Err(ConfigError::Validation("at least one mode is required".into()));
        }
        if !self.has_mode(&self.default_mode) {
            return Err(ConfigError::Validation(format!(
                "default mode '{}' is not one of: {}",
                self.default_mode,
                self.modes.join(", ")
            )));
        }
        if !(0.0..=1.0).contains(&self.fuzzy_threshold) {
            return Err(ConfigError::Validation(format!(
                "fuzzy threshold {} must be between 0 and 1",
                self.fuzzy_threshold
            )));
        }
        Ok(())
    }

    pub fn has_mode(&self, mode: &str) -> bool {
        self.modes.iter().any(|m| m == mode)
    }

    /// Directory holding the knowledge, jokes and messages of `mode`
    pub fn mode_dir(&self, mode: &str) -> PathBuf {
        self.data_dir.join(mode)
    }

    fn normalize_modes(&mut self) {
        for mode in &mut self.modes {
            *mode = mode.trim().to_lowercase();
        }
        let mut seen = Vec::with_capacity(self.modes.len());
        self.modes.retain(|mode| {
            let fresh = !seen.contains(mode);
            if fresh {
                seen.push(mode.clone());
            }
            fresh
        });
        self.default_mode = self.default_mode.trim().to_lowercase();
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_mode, "en");
        assert_eq!(config.fuzzy_threshold, 0.6);
        assert_eq!(config.mode_dir("es"), PathBuf::from("./data/es"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env(lookup(&[
                ("PORT", "8081"),
                ("TEACHBOT_DATA_DIR", "/tmp/bot"),
                ("TEACHBOT_MODES", " EN, fa ,,"),
                ("TEACHBOT_DEFAULT_MODE", "FA"),
                ("TEACHBOT_FUZZY_THRESHOLD", "0.8"),
                ("TEACHBOT_SEED", "99"),
            ]))
            .unwrap();

        assert_eq!(config.port, 8081);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/bot"));
        assert_eq!(config.modes, vec!["en", "fa"]);
        assert_eq!(config.default_mode, "fa");
        assert_eq!(config.fuzzy_threshold, 0.8);
        assert_eq!(config.seed, Some(99));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_threshold_env() {
        let mut config = Config::default();
        let result = config.apply_env(lookup(&[("TEACHBOT_FUZZY_THRESHOLD", "high")]));
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_file_then_env() {
        let file = SettingsFile::from_str(
            r#"
[bot]
modes = ["en", "de"]
fuzzy_threshold = 0.7

[server]
port = 9000
"#,
        )
        .unwrap();

        let mut config = Config::default();
        config.apply_file(file);
        config.apply_env(lookup(&[("PORT", "9100")])).unwrap();

        assert_eq!(config.modes, vec!["en", "de"]);
        assert_eq!(config.fuzzy_threshold, 0.7);
        assert_eq!(config.port, 9100);
    }

    #[test]
    fn test_validation() {
        let mut config = Config {
            default_mode: "xx".into(),
            ..Config::default()
        };
        assert!(config.validate().is_err());

        config.default_mode = "en".into();
        config.fuzzy_threshold = 1.5;
        assert!(config.validate().is_err());

        config.fuzzy_threshold = 0.6;
        config.modes.clear();
        assert!(config.validate().is_err());
    }
}

//! Configuration file loading and validation.
//!
//! The config is TOML: a default provider, per-provider credentials and
//! preferred models, and named profiles (`name = "provider/model"`). It is
//! searched for in the working directory first, then in the platform config
//! directory (`~/.config/ask/config.toml` on Linux). The session engine only
//! ever consumes the resolved `{provider, model, api_key}` triple; everything
//! here stays at the edge.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found")]
    NotFound,

    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{0}")]
    Invalid(String),

    /// The key for this provider is still a placeholder from the wizard or a
    /// hand-edited template.
    #[error("placeholder API key detected for provider '{provider}'")]
    PlaceholderKey { provider: String },
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ProviderConfig {
    pub api_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Config {
    pub default_provider: Option<String>,
    /// Render assistant replies as markdown (default on).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markdown: Option<bool>,
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default)]
    pub profiles: HashMap<String, String>,
}

impl Config {
    pub fn load() -> Result<Config, ConfigError> {
        for path in Self::search_paths() {
            if path.exists() {
                let config = Self::load_from_path(&path)?;
                config.validate()?;
                return Ok(config);
            }
        }
        Err(ConfigError::NotFound)
    }

    pub fn load_from_path(path: &PathBuf) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Like [`Config::load`] but tolerant of missing or invalid files; used
    /// by the setup wizard so an existing partial config is preserved.
    pub fn load_lenient() -> Config {
        for path in Self::search_paths() {
            if path.exists() {
                if let Ok(config) = Self::load_from_path(&path) {
                    return config;
                }
            }
        }
        Config::default()
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to_path(&Self::config_path())
    }

    pub fn save_to_path(&self, path: &PathBuf) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Invalid(format!("failed to serialize config: {e}")))?;
        fs::write(path, contents)?;
        Ok(())
    }

    fn search_paths() -> Vec<PathBuf> {
        vec![PathBuf::from(CONFIG_FILE), Self::config_path()]
    }

    pub fn config_path() -> PathBuf {
        match ProjectDirs::from("", "", "ask") {
            Some(dirs) => dirs.config_dir().join(CONFIG_FILE),
            None => PathBuf::from(CONFIG_FILE),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let Some(default) = self.default_provider.as_deref() else {
            return Err(ConfigError::Invalid(
                "default_provider not set in config".into(),
            ));
        };
        let Some(provider) = self.providers.get(default) else {
            return Err(ConfigError::Invalid(format!(
                "default provider '{default}' not found in providers config"
            )));
        };
        if provider.api_key.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "api_key not set for provider '{default}'"
            )));
        }
        if is_placeholder_key(&provider.api_key) {
            return Err(ConfigError::PlaceholderKey {
                provider: default.to_string(),
            });
        }
        Ok(())
    }

    /// Credential and preferred model for a provider, rejecting placeholder
    /// keys. `Ok(None)` means the provider simply is not configured.
    pub fn credentials_for(&self, provider: &str) -> Result<Option<&ProviderConfig>, ConfigError> {
        match self.providers.get(provider) {
            None => Ok(None),
            Some(pc) if pc.api_key.is_empty() => Ok(None),
            Some(pc) if is_placeholder_key(&pc.api_key) => Err(ConfigError::PlaceholderKey {
                provider: provider.to_string(),
            }),
            Some(pc) => Ok(Some(pc)),
        }
    }

    pub fn configured_providers(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Keys the wizard or a template left unfilled.
pub fn is_placeholder_key(key: &str) -> bool {
    const PREFIXES: &[&str] = &["YOUR_", "REPLACE_", "INSERT_", "ADD_YOUR_", "PASTE_"];
    PREFIXES.iter().any(|p| key.starts_with(p))
        || key == "your-api-key-here"
        || key == "sk-..."
        || key == "***"
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
default_provider = "gemini"

[providers.gemini]
api_key = "g-key"
model = "gemini-2.5-pro"

[providers.claude]
api_key = "c-key"

[profiles]
fast = "gemini/gemini-2.5-flash"
"#;

    fn write_config(contents: &str) -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn parses_providers_and_profiles() {
        let (_dir, path) = write_config(SAMPLE);
        let config = Config::load_from_path(&path).unwrap();

        assert_eq!(config.default_provider.as_deref(), Some("gemini"));
        assert_eq!(
            config.providers["gemini"].model.as_deref(),
            Some("gemini-2.5-pro")
        );
        assert_eq!(config.profiles["fast"], "gemini/gemini-2.5-flash");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn save_round_trips() {
        let (_dir, path) = write_config(SAMPLE);
        let config = Config::load_from_path(&path).unwrap();

        let out = _dir.path().join("saved.toml");
        config.save_to_path(&out).unwrap();
        let reloaded = Config::load_from_path(&out).unwrap();
        assert_eq!(reloaded.default_provider.as_deref(), Some("gemini"));
        assert_eq!(reloaded.providers.len(), 2);
    }

    #[test]
    fn rejects_missing_default_provider() {
        let (_dir, path) = write_config("[providers.gemini]\napi_key = \"k\"\n");
        let config = Config::load_from_path(&path).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_placeholder_keys() {
        let (_dir, path) = write_config(
            "default_provider = \"claude\"\n[providers.claude]\napi_key = \"YOUR_API_KEY\"\n",
        );
        let config = Config::load_from_path(&path).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::PlaceholderKey { .. })
        ));
    }

    #[test]
    fn placeholder_detection() {
        assert!(is_placeholder_key("YOUR_KEY_HERE"));
        assert!(is_placeholder_key("sk-..."));
        assert!(is_placeholder_key("***"));
        assert!(!is_placeholder_key("sk-proj-abc123"));
    }

    #[test]
    fn credentials_for_distinguishes_unconfigured_from_placeholder() {
        let (_dir, path) = write_config(SAMPLE);
        let config = Config::load_from_path(&path).unwrap();

        assert!(config.credentials_for("claude").unwrap().is_some());
        assert!(config.credentials_for("qwen").unwrap().is_none());
    }
}

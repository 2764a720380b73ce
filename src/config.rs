use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Result, anyhow};

use crate::artifact::DEFAULT_OUTPUT_DIR;
use crate::provider::Provider;

pub const DEFAULT_TEMPERATURE: f32 = 0.0;
pub const DEFAULT_PYTHON: &str = "python3";
pub const DEFAULT_EXEC_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// On-disk configuration. Every field is optional so a partial file still loads.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub python: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub exec_timeout_secs: Option<u64>,
    pub ollama_url: Option<String>,
    pub openai_api_key: Option<String>,
    pub claude_api_key: Option<String>,
}

/// Values given on the command line; they win over the file and the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub provider: Option<Provider>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub python: Option<String>,
    pub output_dir: Option<PathBuf>,
}

/// Fully resolved settings used to wire the workflow.
#[derive(Debug, Clone)]
pub struct Settings {
    pub provider: Provider,
    pub model: String,
    pub temperature: f32,
    pub python: String,
    pub output_dir: PathBuf,
    pub exec_timeout: Duration,
    pub ollama_url: String,
    pub api_key: Option<String>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)
            .map_err(|e| anyhow!("Invalid config file {}: {}", path.display(), e))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    pub fn get_config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("diagramgen"))
    }

    /// Merge CLI overrides, the environment and this file into concrete settings.
    pub fn resolve(&self, overrides: &Overrides) -> Result<Settings> {
        self.resolve_with_env(overrides, |var| std::env::var(var).ok())
    }

    fn resolve_with_env<F>(&self, overrides: &Overrides, env: F) -> Result<Settings>
    where
        F: Fn(&str) -> Option<String>,
    {
        let provider = match (overrides.provider, self.provider.as_deref()) {
            (Some(p), _) => p,
            (None, Some(name)) => Provider::from_str(name)
                .ok_or_else(|| anyhow!("Unknown provider '{}' in config", name))?,
            (None, None) => Provider::default(),
        };

        // A model saved for a different provider is meaningless here
        let model = overrides
            .model
            .clone()
            .or_else(|| {
                if overrides.provider.is_none() || self.provider.as_deref().and_then(Provider::from_str) == Some(provider) {
                    self.model.clone()
                } else {
                    None
                }
            })
            .unwrap_or_else(|| provider.default_model().to_string());

        let temperature = overrides
            .temperature
            .or(self.temperature)
            .unwrap_or(DEFAULT_TEMPERATURE);
        if !(0.0..=2.0).contains(&temperature) {
            return Err(anyhow!("Temperature must be between 0 and 2, got {}", temperature));
        }

        let exec_timeout_secs = self.exec_timeout_secs.unwrap_or(DEFAULT_EXEC_TIMEOUT_SECS);
        if exec_timeout_secs == 0 {
            return Err(anyhow!("exec_timeout_secs must be at least 1"));
        }

        let api_key = match provider {
            Provider::OpenAI => env("OPENAI_API_KEY").or_else(|| self.openai_api_key.clone()),
            Provider::Claude => env("ANTHROPIC_API_KEY").or_else(|| self.claude_api_key.clone()),
            Provider::Ollama => None,
        }
        .filter(|k| !k.trim().is_empty());

        Ok(Settings {
            provider,
            model,
            temperature,
            python: overrides
                .python
                .clone()
                .or_else(|| self.python.clone())
                .unwrap_or_else(|| DEFAULT_PYTHON.to_string()),
            output_dir: overrides
                .output_dir
                .clone()
                .or_else(|| self.output_dir.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            exec_timeout: Duration::from_secs(exec_timeout_secs),
            ollama_url: self
                .ollama_url
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            api_key,
        })
    }
}

impl Settings {
    /// Where the key came from, for display: "env", "config", "local" or None.
    pub fn key_source(&self) -> Option<&'static str> {
        let Some(var) = self.provider.api_key_var() else {
            return Some("local");
        };
        if std::env::var(var).map(|v| !v.trim().is_empty()).unwrap_or(false) {
            Some("env")
        } else if self.api_key.is_some() {
            Some("config")
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::new());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            provider: Some("claude".to_string()),
            model: Some("claude-3-5-sonnet-latest".to_string()),
            exec_timeout_secs: Some(30),
            ..Config::new()
        };
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_defaults_match_hosted_model() {
        let settings = Config::new().resolve_with_env(&Overrides::default(), no_env).unwrap();
        assert_eq!(settings.provider, Provider::OpenAI);
        assert_eq!(settings.model, "gpt-4o-mini");
        assert_eq!(settings.temperature, 0.0);
        assert_eq!(settings.python, DEFAULT_PYTHON);
        assert_eq!(settings.output_dir, PathBuf::from(DEFAULT_OUTPUT_DIR));
        assert!(settings.api_key.is_none());
    }

    #[test]
    fn test_env_key_wins_over_config_key() {
        let config = Config {
            openai_api_key: Some("from-config".to_string()),
            ..Config::new()
        };
        let settings = config
            .resolve_with_env(&Overrides::default(), |var| {
                (var == "OPENAI_API_KEY").then(|| "from-env".to_string())
            })
            .unwrap();
        assert_eq!(settings.api_key.as_deref(), Some("from-env"));

        let settings = config.resolve_with_env(&Overrides::default(), no_env).unwrap();
        assert_eq!(settings.api_key.as_deref(), Some("from-config"));
    }

    #[test]
    fn test_overrides_win_and_drop_foreign_model() {
        let config = Config {
            provider: Some("openai".to_string()),
            model: Some("gpt-4o".to_string()),
            ..Config::new()
        };
        let overrides = Overrides {
            provider: Some(Provider::Ollama),
            ..Overrides::default()
        };
        let settings = config.resolve_with_env(&overrides, no_env).unwrap();
        assert_eq!(settings.provider, Provider::Ollama);
        assert_eq!(settings.model, Provider::Ollama.default_model());
    }

    #[test]
    fn test_rejects_unknown_provider_and_bad_temperature() {
        let config = Config {
            provider: Some("gemini".to_string()),
            ..Config::new()
        };
        assert!(config.resolve_with_env(&Overrides::default(), no_env).is_err());

        let overrides = Overrides {
            temperature: Some(3.5),
            ..Overrides::default()
        };
        assert!(Config::new().resolve_with_env(&overrides, no_env).is_err());
    }

    #[test]
    fn test_rejects_zero_exec_timeout() {
        let config = Config {
            exec_timeout_secs: Some(0),
            ..Config::new()
        };
        assert!(config.resolve_with_env(&Overrides::default(), no_env).is_err());

        let config = Config {
            exec_timeout_secs: Some(5),
            ..Config::new()
        };
        let settings = config.resolve_with_env(&Overrides::default(), no_env).unwrap();
        assert_eq!(settings.exec_timeout, Duration::from_secs(5));
    }
}

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::state::EndpointConfig;

pub const HOST_ENV: &str = "OLLAMA_HOST";
pub const MODEL_ENV: &str = "OLLAMA_MODEL";

/// Settings persisted between runs. Unset fields fall back to the built-in
/// defaults of [`EndpointConfig`].
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub base_url: Option<String>,
    pub default_model: Option<String>,
    pub timeout_ms: Option<u64>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(config_path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(config_path, config_content)?;
        Ok(())
    }

    pub fn save_default_model(model: &str) -> Result<()> {
        let mut config = Self::load().unwrap_or_else(|_| Self::new());
        config.default_model = Some(model.to_string());
        config.save()
    }

    /// Effective endpoint: environment overrides the file, the file
    /// overrides the defaults. CLI flags are applied by the caller on top.
    pub fn endpoint(&self) -> EndpointConfig {
        self.endpoint_with_env(|key| std::env::var(key).ok())
    }

    fn endpoint_with_env(&self, env: impl Fn(&str) -> Option<String>) -> EndpointConfig {
        let defaults = EndpointConfig::default();
        let base_url = env(HOST_ENV)
            .map(|host| normalize_host(&host))
            .or_else(|| self.base_url.clone())
            .unwrap_or(defaults.base_url);
        let model = env(MODEL_ENV)
            .or_else(|| self.default_model.clone())
            .unwrap_or(defaults.model);
        let timeout = self
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.timeout);

        EndpointConfig {
            base_url,
            model,
            timeout,
        }
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("ollama-chat").join("config.json"))
    }
}

/// `OLLAMA_HOST` is often a bare `host:port`
fn normalize_host(host: &str) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{}", host)
    }
}

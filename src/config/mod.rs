use std::{fs, path::Path};

use serde::Deserialize;

use crate::core::error::PhishyError;

pub const DEFAULT_CONFIG_PATH: &str = "config/phishy.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub timeout_ms: u64,
    pub max_concurrent_requests: usize,
    pub user_agent: String,
    pub model_path: String,
    pub reputation_base_url: String,
    /// Environment variable holding the VirusTotal API key.
    pub api_key_env: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            max_concurrent_requests: 4,
            user_agent: "phishy/1.1".to_string(),
            model_path: "model/url_model.json".to_string(),
            reputation_base_url: "https://www.virustotal.com/api/v3".to_string(),
            api_key_env: "VT_API_KEY".to_string(),
        }
    }
}

impl AppConfig {
    /// Credential for the reputation service. Absence is degraded mode, not an error.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
    }
}

pub fn load_config(path: Option<&str>) -> Result<AppConfig, PhishyError> {
    let default_path = Path::new(DEFAULT_CONFIG_PATH);
    let path = path.map(Path::new).unwrap_or(default_path);

    if !path.exists() {
        return Ok(AppConfig::default());
    }

    let content = fs::read_to_string(path).map_err(|e| PhishyError::Config(e.to_string()))?;
    let cfg: AppConfig =
        toml::from_str(&content).map_err(|e| PhishyError::Config(e.to_string()))?;
    validate(&cfg)?;
    Ok(cfg)
}

fn validate(cfg: &AppConfig) -> Result<(), PhishyError> {
    if cfg.timeout_ms == 0 {
        return Err(PhishyError::Config("timeout_ms must be greater than zero".into()));
    }
    if cfg.max_concurrent_requests == 0 {
        return Err(PhishyError::Config(
            "max_concurrent_requests must be greater than zero".into(),
        ));
    }
    if cfg.reputation_base_url.trim().is_empty() {
        return Err(PhishyError::Config("reputation_base_url is empty".into()));
    }
    Ok(())
}

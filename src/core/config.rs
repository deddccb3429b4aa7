use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

use super::conversion::NumberFormat;
use super::currency::CurrencyCode;

pub const API_KEY_ENV: &str = "FXCONV_API_KEY";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    pub api_key: Option<String>,
}

fn default_base_url() -> String {
    "https://v6.exchangerate-api.com/v6".to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig {
            base_url: default_base_url(),
            api_key: None,
        }
    }
}

impl ProviderConfig {
    /// Picks the credential from the environment value if set, else from the
    /// config file.
    pub fn resolve_api_key(&self, from_env: Option<String>) -> Result<String> {
        from_env
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.api_key.clone().filter(|k| !k.trim().is_empty()))
            .with_context(|| {
                format!("No API key configured. Set {API_KEY_ENV} or provider.api_key")
            })
    }

    pub fn api_key(&self) -> Result<String> {
        self.resolve_api_key(std::env::var(API_KEY_ENV).ok())
    }
}

fn default_reference() -> CurrencyCode {
    CurrencyCode::from_static("USD")
}

fn default_base() -> CurrencyCode {
    CurrencyCode::from_static("USD")
}

fn default_target() -> CurrencyCode {
    CurrencyCode::from_static("GHS")
}

fn default_amount() -> String {
    "1".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default = "default_reference")]
    pub reference_currency: CurrencyCode,
    #[serde(default = "default_base")]
    pub base_currency: CurrencyCode,
    #[serde(default = "default_target")]
    pub target_currency: CurrencyCode,
    #[serde(default = "default_amount")]
    pub amount: String,
    #[serde(default)]
    pub format: NumberFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            provider: ProviderConfig::default(),
            reference_currency: default_reference(),
            base_currency: default_base(),
            target_currency: default_target(),
            amount: default_amount(),
            format: NumberFormat::default(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("in", "codito", "fxconv")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}

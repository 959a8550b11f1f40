use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::db::DB_FILE;
use crate::error::{BridgeError, Result};

/// Credentials and transport settings for the Heartland Retail API.
#[derive(Clone, Serialize, Deserialize)]
pub struct HeartlandConfig {
    #[serde(default)]
    pub subdomain: String,
    #[serde(default)]
    pub api_token: String,
    /// Overrides the URL derived from `subdomain`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for HeartlandConfig {
    fn default() -> Self {
        Self {
            subdomain: String::new(),
            api_token: String::new(),
            base_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl fmt::Debug for HeartlandConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeartlandConfig")
            .field("subdomain", &self.subdomain)
            .field("api_token", &if self.api_token.is_empty() { "" } else { "***" })
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl HeartlandConfig {
    #[cfg(test)]
    pub fn new(subdomain: &str, api_token: &str) -> Self {
        Self {
            subdomain: subdomain.to_string(),
            api_token: api_token.to_string(),
            ..Default::default()
        }
    }

    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = Some(base_url.to_string());
        self
    }

    #[cfg(test)]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn base_url(&self) -> Result<String> {
        if let Some(url) = &self.base_url {
            return Ok(url.trim_end_matches('/').to_string());
        }
        if self.subdomain.is_empty() {
            return Err(BridgeError::Settings(
                "missing Heartland subdomain (HEARTLAND_SUBDOMAIN)".to_string(),
            ));
        }
        Ok(format!("https://{}.retail.heartland.us/api", self.subdomain))
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_token.is_empty() {
            return Err(BridgeError::Settings(
                "missing Heartland API token (HEARTLAND_API_TOKEN)".to_string(),
            ));
        }
        self.base_url().map(|_| ())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default)]
    pub heartland: HeartlandConfig,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            bind_addr: default_bind_addr(),
            heartland: HeartlandConfig::default(),
        }
    }
}

impl Settings {
    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(DB_FILE)
    }

    /// Let the environment override the settings file.
    pub fn apply_env<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = var("PO_BRIDGE_DATA_DIR") {
            self.data_dir = v;
        }
        if let Some(port) = var("PORT") {
            self.bind_addr = format!("0.0.0.0:{port}");
        }
        if let Some(v) = var("HEARTLAND_SUBDOMAIN") {
            self.heartland.subdomain = v;
        }
        if let Some(v) = var("HEARTLAND_API_TOKEN") {
            self.heartland.api_token = v;
        }
        if let Some(v) = var("HEARTLAND_BASE_URL") {
            self.heartland.base_url = Some(v);
        }
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("po-bridge")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".local")
        .join("share")
        .join("po-bridge")
}

pub fn load_settings() -> Settings {
    let path = settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        serde_json::from_str(&content).unwrap_or_default()
    } else {
        Settings::default()
    }
}

/// Settings file merged with `.env` and the process environment.
pub fn load_effective_settings() -> Settings {
    let _ = dotenvy::dotenv();
    let mut settings = load_settings();
    settings.apply_env(|key| std::env::var(key).ok().filter(|v| !v.is_empty()));
    settings
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| BridgeError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}

use anyhow::bail;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::login::BrowserLoginOptions;

/// portal-oauth application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Portal page the browser opens first
    #[serde(default)]
    pub login_url: String,

    /// Interval between two screen checks, in milliseconds
    #[serde(default = "default_refresh_frequency_ms")]
    pub refresh_frequency_ms: u64,

    /// Overall login timeout in seconds (optional, no timeout when unset)
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    #[serde(default)]
    pub screenshot_on_error: bool,

    /// Directory where failed-login screenshots are written (optional)
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot_dir: Option<PathBuf>,

    /// Accept the cookie banner instead of rejecting it
    #[serde(default)]
    pub accept_cookies: bool,

    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Chromium binary (optional, auto-detected when unset)
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chrome_executable: Option<PathBuf>,

    /// Browser UI language
    #[serde(default = "default_language")]
    pub language: String,

    /// Client bootstrapped from the store's credentials (optional)
    #[serde(default)]
    pub default_client_id: Option<String>,

    #[serde(default)]
    pub default_client_secret: Option<String>,

    #[serde(default)]
    pub default_redirect_url: Option<String>,

    /// Admin API key (optional, enables Admin API functionality)
    #[serde(default)]
    pub admin_api_key: Option<String>,

    /// Length of minted refresh tokens, a positive multiple of 4
    #[serde(default = "default_refresh_token_length")]
    pub refresh_token_length: usize,

    /// `expires_in` reported by the token endpoint, in seconds
    #[serde(default = "default_access_token_expires_in")]
    pub access_token_expires_in: u64,

    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    #[serde(default = "default_clients_path")]
    pub clients_path: PathBuf,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_refresh_frequency_ms() -> u64 {
    1500
}

fn default_headless() -> bool {
    true
}

fn default_language() -> String {
    "fr-FR".to_string()
}

fn default_refresh_token_length() -> usize {
    32
}

fn default_access_token_expires_in() -> u64 {
    3600
}

fn default_store_path() -> PathBuf {
    PathBuf::from("store.json")
}

fn default_clients_path() -> PathBuf {
    PathBuf::from("clients.json")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            login_url: String::new(),
            refresh_frequency_ms: default_refresh_frequency_ms(),
            timeout_secs: None,
            screenshot_on_error: false,
            screenshot_dir: None,
            accept_cookies: false,
            headless: default_headless(),
            chrome_executable: None,
            language: default_language(),
            default_client_id: None,
            default_client_secret: None,
            default_redirect_url: None,
            admin_api_key: None,
            refresh_token_length: default_refresh_token_length(),
            access_token_expires_in: default_access_token_expires_in(),
            store_path: default_store_path(),
            clients_path: default_clients_path(),
        }
    }
}

impl Config {
    /// Get default config file path
    pub fn default_config_path() -> &'static str {
        "config.json"
    }

    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            // Config file doesn't exist, return default config
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Check values serde cannot express
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.refresh_token_length == 0 || self.refresh_token_length % 4 != 0 {
            bail!(
                "refreshTokenLength must be a positive multiple of 4, got {}",
                self.refresh_token_length
            );
        }
        Ok(())
    }

    /// Options of the browser login method
    pub fn login_options(&self) -> BrowserLoginOptions {
        BrowserLoginOptions {
            url: self.login_url.clone(),
            refresh_frequency: Duration::from_millis(self.refresh_frequency_ms),
            timeout: self.timeout_secs.map(Duration::from_secs),
            screenshot_on_error: self.screenshot_on_error,
            accept_cookies: self.accept_cookies,
        }
    }
}

//! Application configuration management.
//!
//! Holds the base URLs of the backend services, the request timeouts and the
//! session policy, plus the last used login id.
//!
//! Configuration is stored at `~/.config/tcfd-portal/config.json`. Service URLs
//! can be overridden from the environment (a `.env` file is honoured by the binary).

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Application name used for config/cache directory paths
pub const APP_NAME: &str = "tcfd-portal";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Default base URL for every service when nothing else is configured.
const DEFAULT_SERVICE_URL: &str = "http://localhost:8080";

/// HTTP request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Timeout for report generation, which drafts the report with an LLM.
const DEFAULT_REPORT_TIMEOUT_SECS: u64 = 300;

const ENV_GATEWAY_URL: &str = "TCFD_GATEWAY_URL";
const ENV_AUTH_URL: &str = "TCFD_AUTH_URL";
const ENV_TCFD_URL: &str = "TCFD_SERVICE_URL";
const ENV_MATERIALITY_URL: &str = "TCFD_MATERIALITY_URL";
const ENV_LLM_URL: &str = "TCFD_LLM_URL";

fn default_service_url() -> String {
    DEFAULT_SERVICE_URL.to_string()
}

fn default_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_report_timeout() -> u64 {
    DEFAULT_REPORT_TIMEOUT_SECS
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Gateway serving document downloads
    #[serde(default = "default_service_url")]
    pub gateway_url: String,
    #[serde(default = "default_service_url")]
    pub auth_url: String,
    #[serde(default = "default_service_url")]
    pub tcfd_url: String,
    #[serde(default = "default_service_url")]
    pub materiality_url: String,
    /// Report generation (LLM/RAG) service
    #[serde(default = "default_service_url")]
    pub llm_url: String,

    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_report_timeout")]
    pub report_timeout_secs: u64,

    /// Keep a persisted session authenticated when verification fails for a
    /// reason other than 401 (timeout, unreachable service).
    #[serde(default = "default_true")]
    pub preserve_session_on_network_error: bool,

    #[serde(default)]
    pub last_username: Option<String>,

    /// Where downloaded reports are written. Falls back to the platform
    /// download directory.
    #[serde(default)]
    pub download_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gateway_url: default_service_url(),
            auth_url: default_service_url(),
            tcfd_url: default_service_url(),
            materiality_url: default_service_url(),
            llm_url: default_service_url(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            report_timeout_secs: DEFAULT_REPORT_TIMEOUT_SECS,
            preserve_session_on_network_error: true,
            last_username: None,
            download_dir: None,
        }
    }
}

impl Config {
    /// Load the config file (or defaults) and apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")?
        } else {
            Self::default()
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Override service URLs from the environment. The lookup is injected so
    /// tests don't have to touch process-wide state.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let overrides: [(&str, &mut String); 5] = [
            (ENV_GATEWAY_URL, &mut self.gateway_url),
            (ENV_AUTH_URL, &mut self.auth_url),
            (ENV_TCFD_URL, &mut self.tcfd_url),
            (ENV_MATERIALITY_URL, &mut self.materiality_url),
            (ENV_LLM_URL, &mut self.llm_url),
        ];

        for (key, slot) in overrides {
            if let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) {
                debug!(key, url = %value, "Service URL overridden from environment");
                *slot = value.trim().trim_end_matches('/').to_string();
            }
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn report_timeout(&self) -> Duration {
        Duration::from_secs(self.report_timeout_secs)
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Directory holding the persisted session keys.
    pub fn session_dir(&self) -> Result<PathBuf> {
        Ok(self.cache_dir()?.join("session"))
    }

    pub fn download_dir(&self) -> PathBuf {
        self.download_dir
            .clone()
            .or_else(dirs::download_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

//! Application configuration.

use cexscan_api::RetryConfig;
use cexscan_dashboard::DashboardConfig;
use cexscan_session::LicenseGateConfig;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::{AppError, AppResult};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "CEXSCAN_CONFIG";
/// Config file used when neither `--config` nor `CEXSCAN_CONFIG` is given.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// User identity as configured. Environment variables take precedence.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdentityConfig {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

/// Retry and cooldown policy for API calls.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Per-attempt timeout (ms).
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Attempts per call before the endpoint cools down.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Backoff base after a 5xx (ms).
    #[serde(default = "default_server_error_base_delay_ms")]
    pub server_error_base_delay_ms: u64,
    /// Backoff base after any other failure (ms).
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_jitter_ms")]
    pub max_jitter_ms: u64,
    #[serde(default = "default_cooldown_base_ms")]
    pub cooldown_base_ms: u64,
    #[serde(default = "default_cooldown_max_ms")]
    pub cooldown_max_ms: u64,
    /// Cap on the cooldown doubling exponent.
    #[serde(default = "default_cooldown_max_exponent")]
    pub cooldown_max_exponent: u32,
}

fn default_request_timeout_ms() -> u64 {
    8_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_server_error_base_delay_ms() -> u64 {
    3_000
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_max_jitter_ms() -> u64 {
    1_000
}

fn default_cooldown_base_ms() -> u64 {
    10_000
}

fn default_cooldown_max_ms() -> u64 {
    300_000
}

fn default_cooldown_max_exponent() -> u32 {
    4
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
            max_retries: default_max_retries(),
            server_error_base_delay_ms: default_server_error_base_delay_ms(),
            base_delay_ms: default_base_delay_ms(),
            max_jitter_ms: default_max_jitter_ms(),
            cooldown_base_ms: default_cooldown_base_ms(),
            cooldown_max_ms: default_cooldown_max_ms(),
            cooldown_max_exponent: default_cooldown_max_exponent(),
        }
    }
}

impl From<&HttpConfig> for RetryConfig {
    fn from(config: &HttpConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            request_timeout: Duration::from_millis(config.request_timeout_ms),
            base_delay: Duration::from_millis(config.base_delay_ms),
            server_error_base_delay: Duration::from_millis(config.server_error_base_delay_ms),
            max_jitter: Duration::from_millis(config.max_jitter_ms),
            cooldown_base: Duration::from_millis(config.cooldown_base_ms),
            cooldown_max: Duration::from_millis(config.cooldown_max_ms),
            cooldown_max_exponent: config.cooldown_max_exponent,
        }
    }
}

/// License polling.
#[derive(Debug, Clone, Deserialize)]
pub struct LicenseConfig {
    #[serde(default = "default_license_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_license_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_license_check_timeout_ms")]
    pub check_timeout_ms: u64,
}

fn default_license_initial_delay_ms() -> u64 {
    60_000
}

fn default_license_max_delay_ms() -> u64 {
    900_000
}

fn default_license_check_timeout_ms() -> u64 {
    5_000
}

impl Default for LicenseConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_license_initial_delay_ms(),
            max_delay_ms: default_license_max_delay_ms(),
            check_timeout_ms: default_license_check_timeout_ms(),
        }
    }
}

impl From<&LicenseConfig> for LicenseGateConfig {
    fn from(config: &LicenseConfig) -> Self {
        Self {
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            check_timeout: Duration::from_millis(config.check_timeout_ms),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SettingsSyncConfig {
    /// Quiet period before a range change is written (ms).
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_debounce_ms() -> u64 {
    500
}

impl Default for SettingsSyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

/// Root configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Base URL of the backend API.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default)]
    pub identity: IdentityConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub license: LicenseConfig,

    #[serde(default)]
    pub settings_sync: SettingsSyncConfig,

    #[serde(default)]
    pub dashboard: DashboardConfig,
}

fn default_api_url() -> String {
    "http://localhost:8000".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            identity: IdentityConfig::default(),
            http: HttpConfig::default(),
            license: LicenseConfig::default(),
            settings_sync: SettingsSyncConfig::default(),
            dashboard: DashboardConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration: explicit path, else `CEXSCAN_CONFIG`, else
    /// `config/default.toml`. Only a missing default file falls back to
    /// built-in defaults; an explicitly named file must exist.
    pub fn load(path: Option<&str>) -> AppResult<Self> {
        let explicit = path
            .map(str::to_string)
            .or_else(|| std::env::var(CONFIG_ENV).ok());

        let config = match explicit {
            Some(path) => Self::from_file(&path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(DEFAULT_CONFIG_PATH)?
            }
            None => {
                tracing::warn!(path = DEFAULT_CONFIG_PATH, "Config file not found, using defaults");
                Self::default()
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config {path}: {e}")))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.api_url.trim().is_empty() {
            return Err(AppError::Config("api_url must not be empty".to_string()));
        }
        if self.http.max_retries == 0 {
            return Err(AppError::Config("http.max_retries must be at least 1".to_string()));
        }
        if self.license.initial_delay_ms > self.license.max_delay_ms {
            return Err(AppError::Config(
                "license.initial_delay_ms exceeds license.max_delay_ms".to_string(),
            ));
        }
        self.dashboard.validate()?;
        Ok(())
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::from(&self.http)
    }

    pub fn license_gate_config(&self) -> LicenseGateConfig {
        LicenseGateConfig::from(&self.license)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.settings_sync.debounce_ms)
    }
}

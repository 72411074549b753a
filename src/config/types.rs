//! Core configuration types and loading.

use crate::grants::{Plan, Principal, RoleId};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Daemon configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    /// Who may grant and revoke.
    #[serde(default)]
    pub authority: AuthorityConfig,
    /// Backend role ids for each plan.
    #[serde(default)]
    pub roles: RolesConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    /// Periodic status side file.
    #[serde(default)]
    pub status: StatusConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}

/// Service identity and HTTP endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Name reported by `/health`.
    #[serde(default = "default_service_name")]
    pub name: String,
    /// HTTP port for health, status, metrics and the grant API (0 disables).
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            http_port: default_http_port(),
        }
    }
}

/// Administrator list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorityConfig {
    #[serde(default)]
    pub admins: Vec<Principal>,
}

/// Plan role ids. Zero or absent means the role is not configured.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct RolesConfig {
    #[serde(default)]
    pub essential: Option<u64>,
    #[serde(default)]
    pub prime: Option<u64>,
}

impl RolesConfig {
    /// Backend role for a plan, if configured.
    pub fn role_for(&self, plan: Plan) -> Option<RoleId> {
        let id = match plan {
            Plan::Essential => self.essential,
            Plan::Prime => self.prime,
        };
        id.filter(|&id| id != 0).map(RoleId)
    }

    /// All configured role ids.
    pub fn configured(&self) -> Vec<RoleId> {
        [Plan::Essential, Plan::Prime]
            .into_iter()
            .filter_map(|p| self.role_for(p))
            .collect()
    }
}

/// Role backend settings.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Upper bound for a single backend call, in seconds.
    #[serde(default = "default_backend_timeout")]
    pub timeout_secs: u64,
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_backend_timeout(),
        }
    }
}

/// Status side-file settings.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusConfig {
    #[serde(default = "default_status_path")]
    pub path: PathBuf,
    #[serde(default = "default_status_interval")]
    pub interval_secs: u64,
}

impl StatusConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            path: default_status_path(),
            interval_secs: default_status_interval(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

fn default_service_name() -> String {
    "grantd".to_string()
}

fn default_http_port() -> u16 {
    5000
}

fn default_backend_timeout() -> u64 {
    10
}

fn default_status_path() -> PathBuf {
    PathBuf::from("grantd_status.json")
}

fn default_status_interval() -> u64 {
    30
}

// src/config/models.rs
use crate::health::ReadyOptions;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("server.port must be non-zero")]
    ZeroPort,

    #[error("server.tls.cert_path and server.tls.key_path must be non-empty")]
    EmptyTlsPath,

    #[error("health check #{0} has an empty name")]
    EmptyCheckName(usize),

    #[error("health check {name:?} must use http or https, got {scheme:?}")]
    UnsupportedScheme { name: String, scheme: String },

    #[error("auth.username and auth.password must be non-empty")]
    EmptyCredentials,

    #[error("metrics.path must start with '/', got {0:?}")]
    InvalidMetricsPath(String),

    #[error("metrics.port must be non-zero and differ from server.port")]
    InvalidMetricsPort,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub auth: Option<AuthConfig>,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::ZeroPort);
        }
        if let Some(tls) = &self.server.tls {
            if tls.cert_path.as_os_str().is_empty() || tls.key_path.as_os_str().is_empty() {
                return Err(ConfigError::EmptyTlsPath);
            }
        }

        let mut names = HashSet::new();
        for (index, check) in self.health.checks.iter().enumerate() {
            if check.name.trim().is_empty() {
                return Err(ConfigError::EmptyCheckName(index));
            }
            if !matches!(check.url.scheme(), "http" | "https") {
                return Err(ConfigError::UnsupportedScheme {
                    name: check.name.clone(),
                    scheme: check.url.scheme().to_string(),
                });
            }
            if !names.insert(check.name.as_str()) {
                tracing::warn!(check = %check.name, "duplicate health check name in config");
            }
        }

        if let Some(auth) = &self.auth {
            if auth.username.is_empty() || auth.password.is_empty() {
                return Err(ConfigError::EmptyCredentials);
            }
        }

        if self.metrics.enabled {
            if !self.metrics.path.starts_with('/') {
                return Err(ConfigError::InvalidMetricsPath(self.metrics.path.clone()));
            }
            if self.metrics.port == 0 || self.metrics.port == self.server.port {
                return Err(ConfigError::InvalidMetricsPort);
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
    #[serde(default = "default_read_header_timeout_secs")]
    pub read_header_timeout_secs: u64,
    #[serde(default = "default_write_timeout_secs")]
    pub write_timeout_secs: u64,
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// Serves HTTPS when present.
    #[serde(default)]
    pub tls: Option<TlsConfig>,
}

impl ServerConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn read_header_timeout(&self) -> Duration {
        Duration::from_secs(self.read_header_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
            read_header_timeout_secs: default_read_header_timeout_secs(),
            write_timeout_secs: default_write_timeout_secs(),
            idle_timeout_secs: default_idle_timeout_secs(),
            tls: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_environment")]
    pub environment: String,
    /// 0 disables the overall deadline.
    #[serde(default = "default_overall_timeout_ms")]
    pub overall_timeout_ms: u64,
    /// 0 disables the per-check deadline.
    #[serde(default = "default_per_check_timeout_ms")]
    pub per_check_timeout_ms: u64,
    #[serde(default)]
    pub checks: Vec<HttpCheckConfig>,
}

impl HealthConfig {
    pub fn ready_options(&self) -> ReadyOptions {
        let per_check = Duration::from_millis(self.per_check_timeout_ms);
        ReadyOptions::unbounded()
            .with_overall_timeout(Duration::from_millis(self.overall_timeout_ms))
            .with_per_check_timeout((!per_check.is_zero()).then_some(per_check))
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            environment: default_environment(),
            overall_timeout_ms: default_overall_timeout_ms(),
            per_check_timeout_ms: default_per_check_timeout_ms(),
            checks: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpCheckConfig {
    pub name: String,
    pub url: Url,
    #[serde(default)]
    pub expected_status: Option<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub realm: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
            path: default_metrics_path(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

fn default_shutdown_timeout_secs() -> u64 {
    20
}

fn default_read_header_timeout_secs() -> u64 {
    10
}

fn default_write_timeout_secs() -> u64 {
    10
}

fn default_idle_timeout_secs() -> u64 {
    120
}

fn default_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_overall_timeout_ms() -> u64 {
    2000
}

fn default_per_check_timeout_ms() -> u64 {
    800
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

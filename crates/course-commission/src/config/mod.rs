use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::commission::HeaderStatus;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub commission: CommissionConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            commission: CommissionConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Commission engine knobs.
#[derive(Debug, Clone)]
pub struct CommissionConfig {
    /// Zero disables the background sweep.
    pub sweep_interval: Duration,
    pub stats_cache_window: Duration,
    pub default_header_status: HeaderStatus,
    pub seed_csv: Option<PathBuf>,
}

impl Default for CommissionConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(60),
            stats_cache_window: Duration::from_secs(30),
            default_header_status: HeaderStatus::Active,
            seed_csv: None,
        }
    }
}

impl CommissionConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let sweep_interval = seconds_var("COMMISSION_SWEEP_INTERVAL_SECS")?
            .unwrap_or(defaults.sweep_interval);
        let stats_cache_window = seconds_var("COMMISSION_STATS_CACHE_SECS")?
            .unwrap_or(defaults.stats_cache_window);

        let default_header_status = match env::var("COMMISSION_DEFAULT_HEADER_STATUS") {
            Ok(value) => HeaderStatus::parse(&value)
                .filter(|status| status.is_operator_controlled())
                .ok_or(ConfigError::InvalidDefaultStatus { value })?,
            Err(_) => defaults.default_header_status,
        };

        let seed_csv = env::var("COMMISSION_SEED_CSV")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            sweep_interval,
            stats_cache_window,
            default_header_status,
            seed_csv,
        })
    }
}

fn seconds_var(name: &'static str) -> Result<Option<Duration>, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<u64>()
            .map(|secs| Some(Duration::from_secs(secs)))
            .map_err(|_| ConfigError::InvalidSeconds { name, value }),
        Err(_) => Ok(None),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidSeconds { name: &'static str, value: String },
    InvalidDefaultStatus { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidSeconds { name, value } => {
                write!(f, "{name} must be a whole number of seconds, got '{value}'")
            }
            ConfigError::InvalidDefaultStatus { value } => write!(
                f,
                "COMMISSION_DEFAULT_HEADER_STATUS must be active or inactive, got '{value}'"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidSeconds { .. }
            | ConfigError::InvalidDefaultStatus { .. } => None,
        }
    }
}

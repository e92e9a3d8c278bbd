use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::workflows::pipeline::{RejectionVocabulary, SlaPolicy};

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
    pub pipeline: PipelineConfig,
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

        let grace_multiplier = match env::var("PIPELINE_SLA_GRACE_MULTIPLIER") {
            Ok(raw) => parse_grace_multiplier(&raw)?,
            Err(_) => SlaPolicy::DEFAULT_GRACE_MULTIPLIER,
        };

        let rejection_vocabulary = match env::var("PIPELINE_REJECTION_KEYWORDS") {
            Ok(raw) => RejectionVocabulary::from_csv(&raw),
            Err(_) => RejectionVocabulary::default(),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            pipeline: PipelineConfig {
                sla: SlaPolicy::with_grace_multiplier(grace_multiplier),
                rejection_vocabulary,
            },
        })
    }
}

/// Parse a grace multiplier, rejecting values below 1.0.
pub fn parse_grace_multiplier(raw: &str) -> Result<f64, ConfigError> {
    let value = raw
        .trim()
        .parse::<f64>()
        .map_err(|_| ConfigError::InvalidGraceMultiplier(raw.to_string()))?;
    if !value.is_finite() || value < 1.0 {
        return Err(ConfigError::InvalidGraceMultiplier(raw.to_string()));
    }
    Ok(value)
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

/// Engine tunables: SLA grace band and the vocabulary that seeds comment-required stages.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub sla: SlaPolicy,
    pub rejection_vocabulary: RejectionVocabulary,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidGraceMultiplier(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidGraceMultiplier(raw) => write!(
                f,
                "PIPELINE_SLA_GRACE_MULTIPLIER must be a number >= 1.0 (got '{}')",
                raw
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidGraceMultiplier(_) => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}

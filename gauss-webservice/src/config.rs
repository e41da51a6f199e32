use std::net::SocketAddr;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{key} has invalid value {value:?}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Service settings, read once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    /// `GAUSS_BIND_ADDR`
    pub bind_addr: SocketAddr,
    /// `GAUSS_WORKERS`: worker count used when a request does not name one.
    pub default_workers: Option<usize>,
    /// `GAUSS_VERIFY`: cross-check parallel results with the sequential engine.
    pub verify: bool,
    /// `GAUSS_VERIFY_MAX_IN_FLIGHT`
    pub verify_max_in_flight: usize,
    /// `GAUSS_MAX_ROWS`
    pub max_rows: usize,
    /// `GAUSS_MAX_WORKERS`: upper bound on the worker processes one request may fork.
    pub max_workers: usize,
    /// `GAUSS_LOG_FORMAT=json` switches to JSON log lines.
    pub json_logs: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            default_workers: None,
            verify: true,
            verify_max_in_flight: 4,
            max_rows: 2048,
            max_workers: 64,
            json_logs: false,
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key/value source; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(value) = lookup("GAUSS_BIND_ADDR") {
            config.bind_addr = parse("GAUSS_BIND_ADDR", &value)?;
        }
        if let Some(value) = lookup("GAUSS_WORKERS") {
            config.default_workers = Some(parse_positive("GAUSS_WORKERS", &value)?);
        }
        if let Some(value) = lookup("GAUSS_VERIFY") {
            config.verify = parse("GAUSS_VERIFY", &value)?;
        }
        if let Some(value) = lookup("GAUSS_VERIFY_MAX_IN_FLIGHT") {
            config.verify_max_in_flight = parse_positive("GAUSS_VERIFY_MAX_IN_FLIGHT", &value)?;
        }
        if let Some(value) = lookup("GAUSS_MAX_ROWS") {
            config.max_rows = parse_positive("GAUSS_MAX_ROWS", &value)?;
        }
        if let Some(value) = lookup("GAUSS_MAX_WORKERS") {
            config.max_workers = parse_positive("GAUSS_MAX_WORKERS", &value)?;
        }
        if let Some(workers) = config.default_workers.filter(|&w| w > config.max_workers) {
            return Err(ConfigError::InvalidValue {
                key: "GAUSS_WORKERS",
                value: workers.to_string(),
                reason: format!("exceeds GAUSS_MAX_WORKERS ({})", config.max_workers),
            });
        }
        if let Some(value) = lookup("GAUSS_LOG_FORMAT") {
            config.json_logs = match value.as_str() {
                "json" => true,
                "text" => false,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "GAUSS_LOG_FORMAT",
                        value,
                        reason: "expected \"json\" or \"text\"".to_string(),
                    })
                }
            };
        }
        Ok(config)
    }
}

fn parse<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn parse_positive(key: &'static str, value: &str) -> Result<usize, ConfigError> {
    match parse::<usize>(key, value)? {
        0 => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
            reason: "must be at least 1".to_string(),
        }),
        n => Ok(n),
    }
}

//! Environment configuration

use crate::audit::DEFAULT_AUDIT_CAPACITY;
use crate::conversation::DEFAULT_MAX_VERIFICATION_ATTEMPTS;
use crate::error::TellerError;
use crate::Result;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub max_verification_attempts: u32,
    pub reference_data_path: Option<PathBuf>,
    pub rate_limit_window: Duration,
    pub chat_rate_limit: usize,
    pub session_rate_limit: usize,
    /// Characters per streamed chunk
    pub stream_chunk_size: usize,
    /// Running behind a reverse proxy that sets `x-forwarded-for`
    pub trust_proxy: bool,
    /// Events retained by the in-memory audit log
    pub audit_log_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            allowed_origins: vec!["http://localhost:3000".to_string()],
            max_verification_attempts: DEFAULT_MAX_VERIFICATION_ATTEMPTS,
            reference_data_path: None,
            rate_limit_window: Duration::from_secs(60),
            chat_rate_limit: 30,
            session_rate_limit: 10,
            stream_chunk_size: 20,
            trust_proxy: false,
            audit_log_capacity: DEFAULT_AUDIT_CAPACITY,
        }
    }
}

impl AppConfig {
    /// Read configuration from the environment (and `.env`, if present)
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; missing keys fall back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let port = match lookup("PORT").or_else(|| lookup("API_PORT")) {
            Some(raw) => parse_value("PORT", &raw)?,
            None => defaults.port,
        };

        let allowed_origins = lookup("ALLOWED_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or(defaults.allowed_origins);

        let max_verification_attempts = parse_or(
            &lookup,
            "MAX_VERIFICATION_ATTEMPTS",
            defaults.max_verification_attempts,
        )?;
        if max_verification_attempts == 0 {
            return Err(TellerError::ConfigError(
                "MAX_VERIFICATION_ATTEMPTS must be at least 1".to_string(),
            ));
        }

        let window_secs = parse_or(
            &lookup,
            "RATE_LIMIT_WINDOW_SECS",
            defaults.rate_limit_window.as_secs(),
        )?;

        let stream_chunk_size = parse_or(&lookup, "STREAM_CHUNK_SIZE", defaults.stream_chunk_size)?;
        if stream_chunk_size == 0 {
            return Err(TellerError::ConfigError(
                "STREAM_CHUNK_SIZE must be at least 1".to_string(),
            ));
        }

        let audit_log_capacity =
            parse_or(&lookup, "AUDIT_LOG_CAPACITY", defaults.audit_log_capacity)?;
        if audit_log_capacity == 0 {
            return Err(TellerError::ConfigError(
                "AUDIT_LOG_CAPACITY must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            port,
            allowed_origins,
            max_verification_attempts,
            reference_data_path: lookup("REFERENCE_DATA_PATH").map(PathBuf::from),
            rate_limit_window: Duration::from_secs(window_secs),
            chat_rate_limit: parse_or(&lookup, "CHAT_RATE_LIMIT", defaults.chat_rate_limit)?,
            session_rate_limit: parse_or(
                &lookup,
                "SESSION_RATE_LIMIT",
                defaults.session_rate_limit,
            )?,
            stream_chunk_size,
            trust_proxy: parse_or(&lookup, "TRUST_PROXY", defaults.trust_proxy)?,
            audit_log_capacity,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| TellerError::ConfigError(format!("{} has invalid value '{}'", key, raw)))
}

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ClientError;
use crate::store::resource::Sequencing;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "compact" | "text" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
    pub session_path: PathBuf,
    pub log_level: String,
    pub log_format: LogFormat,
    pub request_timeout_ms: u64,
    pub notification_buffer_size: usize,
    pub sequencing: Sequencing,
    pub credentials: Option<Credentials>,
}

impl Config {
    pub fn from_env() -> Result<Self, ClientError> {
        let _ = dotenvy::dotenv();

        let credentials = match (env::var("RIDESHARE_EMAIL"), env::var("RIDESHARE_PASSWORD")) {
            (Ok(email), Ok(password)) => Some(Credentials { email, password }),
            _ => None,
        };

        let config = Self {
            api_base_url: env::var("API_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:5000/api".to_string()),
            session_path: env::var("SESSION_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".rideshare/session.json")),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format: parse_or_default("LOG_FORMAT", LogFormat::Compact)?,
            request_timeout_ms: parse_or_default("REQUEST_TIMEOUT_MS", 15_000)?,
            notification_buffer_size: parse_or_default("NOTIFICATION_BUFFER_SIZE", 64)?,
            sequencing: parse_or_default("SEQUENCING", Sequencing::LastWriteWins)?,
            credentials,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    fn validate(&self) -> Result<(), ClientError> {
        if !(self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://")) {
            return Err(ClientError::Config(format!(
                "API_BASE_URL must be an http(s) url, got '{}'",
                self.api_base_url
            )));
        }
        if self.request_timeout_ms == 0 {
            return Err(ClientError::Config("REQUEST_TIMEOUT_MS must be > 0".to_string()));
        }
        if self.notification_buffer_size == 0 {
            return Err(ClientError::Config(
                "NOTIFICATION_BUFFER_SIZE must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:5000/api".to_string(),
            session_path: PathBuf::from(".rideshare/session.json"),
            log_level: "info".to_string(),
            log_format: LogFormat::Compact,
            request_timeout_ms: 15_000,
            notification_buffer_size: 64,
            sequencing: Sequencing::LastWriteWins,
            credentials: None,
        }
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, ClientError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| ClientError::Config(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}

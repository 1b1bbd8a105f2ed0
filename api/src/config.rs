use std::time::Duration;

use axum::http::HeaderName;
use url::Url;

const DEFAULT_MODEL_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL_NAME: &str = "gpt-4o-mini";
const DEFAULT_MODEL_TIMEOUT_SECS: u64 = 45;
const DEFAULT_MODEL_MAX_TOKENS: u32 = 2000;
const DEFAULT_IDENTITY_HEADER: &str = "x-subject-id";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub endpoint: Url,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub port: u16,
    pub cors_origins: Vec<String>,
    /// Header carrying the subject id verified by the upstream identity provider.
    pub identity_header: HeaderName,
    pub model: ModelConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let database_max_connections =
            parse_or("DATABASE_MAX_CONNECTIONS", get("DATABASE_MAX_CONNECTIONS"), 20u32)?;
        let port = parse_or("PORT", get("PORT"), 3000u16)?;

        let cors_origins = get("VITALS_CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:3000".to_string())
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(ToString::to_string)
            .collect();

        let identity_header = get("VITALS_IDENTITY_HEADER")
            .unwrap_or_else(|| DEFAULT_IDENTITY_HEADER.to_string());
        let identity_header = HeaderName::try_from(identity_header.to_lowercase()).map_err(|e| {
            ConfigError::Invalid {
                name: "VITALS_IDENTITY_HEADER",
                reason: e.to_string(),
            }
        })?;

        let endpoint = get("INSIGHT_MODEL_URL").unwrap_or_else(|| DEFAULT_MODEL_URL.to_string());
        let endpoint = Url::parse(&endpoint).map_err(|e| ConfigError::Invalid {
            name: "INSIGHT_MODEL_URL",
            reason: e.to_string(),
        })?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                name: "INSIGHT_MODEL_URL",
                reason: format!("unsupported scheme '{}'", endpoint.scheme()),
            });
        }

        let api_key =
            get("INSIGHT_MODEL_API_KEY").ok_or(ConfigError::Missing("INSIGHT_MODEL_API_KEY"))?;
        let model = get("INSIGHT_MODEL_NAME").unwrap_or_else(|| DEFAULT_MODEL_NAME.to_string());
        let max_tokens = parse_or(
            "INSIGHT_MODEL_MAX_TOKENS",
            get("INSIGHT_MODEL_MAX_TOKENS"),
            DEFAULT_MODEL_MAX_TOKENS,
        )?;

        let timeout_secs = parse_or(
            "INSIGHT_MODEL_TIMEOUT_SECS",
            get("INSIGHT_MODEL_TIMEOUT_SECS"),
            DEFAULT_MODEL_TIMEOUT_SECS,
        )?;
        if !(1..=300).contains(&timeout_secs) {
            return Err(ConfigError::Invalid {
                name: "INSIGHT_MODEL_TIMEOUT_SECS",
                reason: "must be between 1 and 300".to_string(),
            });
        }

        Ok(Self {
            database_url,
            database_max_connections,
            port,
            cors_origins,
            identity_header,
            model: ModelConfig {
                endpoint,
                api_key,
                model,
                max_tokens,
                timeout: Duration::from_secs(timeout_secs),
            },
        })
    }
}

fn parse_or<T>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
    }
}

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::constants::DEFAULT_USER_AGENT;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("failed to parse {name} as boolean: {value}")]
    ParseBool { name: String, value: String },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub database_path: PathBuf,

    // Web Server
    pub web_host: String,
    pub web_port: u16,

    // Upstream source
    pub reddit: Option<RedditCredentials>,
    pub reddit_user_agent: String,
    pub subreddit: String,
    pub reddit_auth_url: String,
    pub reddit_api_url: String,
    pub upstream_timeout: Duration,

    // Ingestion
    pub ingest_enabled: bool,
    pub ingest_batch_size: u32,
    pub ingest_interval: Duration,

    // Translation
    pub translate: Option<TranslateConfig>,
}

/// Application credentials issued by the upstream source.
#[derive(Clone)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
    /// Refresh token for the `refresh_token` grant. Without one the
    /// read-only `client_credentials` grant is used.
    pub refresh_token: Option<String>,
}

impl std::fmt::Debug for RedditCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedditCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// OpenAI-compatible chat endpoint used to produce the translated copy.
#[derive(Clone)]
pub struct TranslateConfig {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub target_language: String,
}

impl std::fmt::Debug for TranslateConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslateConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("target_language", &self.target_language)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if an environment variable is present but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Database
            database_path: PathBuf::from(env_or_default("DATABASE_PATH", "./data/feed.sqlite")),

            // Web Server
            web_host: env_or_default("WEB_HOST", "0.0.0.0"),
            web_port: parse_env_u16("WEB_PORT", 8080)?,

            // Upstream source
            reddit: load_credentials()?,
            reddit_user_agent: env_or_default("REDDIT_USER_AGENT", DEFAULT_USER_AGENT),
            subreddit: env_or_default("SUBREDDIT", "pathofexile"),
            reddit_auth_url: env_or_default("REDDIT_AUTH_URL", "https://www.reddit.com"),
            reddit_api_url: env_or_default("REDDIT_API_URL", "https://oauth.reddit.com"),
            upstream_timeout: Duration::from_secs(parse_env_u64("UPSTREAM_TIMEOUT_SECS", 30)?),

            // Ingestion
            ingest_enabled: parse_env_bool("INGEST_ENABLED", true)?,
            ingest_batch_size: parse_env_u32("INGEST_BATCH_SIZE", 10)?,
            ingest_interval: Duration::from_secs(parse_env_u64("INGEST_INTERVAL_SECS", 900)?),

            // Translation
            translate: load_translate_config(),
        })
    }

    /// Configuration with no upstream credentials, for tests and local tooling.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            database_path: PathBuf::from(":memory:"),
            web_host: "127.0.0.1".to_string(),
            web_port: 0,
            reddit: None,
            reddit_user_agent: DEFAULT_USER_AGENT.to_string(),
            subreddit: "pathofexile".to_string(),
            reddit_auth_url: "http://127.0.0.1:9".to_string(),
            reddit_api_url: "http://127.0.0.1:9".to_string(),
            upstream_timeout: Duration::from_secs(5),
            ingest_enabled: false,
            ingest_batch_size: 10,
            ingest_interval: Duration::from_secs(900),
            translate: None,
        }
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.ingest_batch_size) {
            return Err(ConfigError::InvalidValue {
                name: "INGEST_BATCH_SIZE".to_string(),
                message: "must be between 1 and 100".to_string(),
            });
        }
        if self.ingest_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "INGEST_INTERVAL_SECS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.subreddit.is_empty() || self.subreddit.contains('/') {
            return Err(ConfigError::InvalidValue {
                name: "SUBREDDIT".to_string(),
                message: format!("'{}' is not a community name", self.subreddit),
            });
        }
        for (name, value) in [
            ("REDDIT_AUTH_URL", &self.reddit_auth_url),
            ("REDDIT_API_URL", &self.reddit_api_url),
        ] {
            if url::Url::parse(value).is_err() {
                return Err(ConfigError::InvalidValue {
                    name: name.to_string(),
                    message: format!("'{value}' is not a valid URL"),
                });
            }
        }
        Ok(())
    }

    /// Whether the background ingestion scheduler should run.
    #[must_use]
    pub fn ingestion_active(&self) -> bool {
        self.ingest_enabled && self.reddit.is_some()
    }
}

fn load_credentials() -> Result<Option<RedditCredentials>, ConfigError> {
    match (
        optional_env("REDDIT_CLIENT_ID"),
        optional_env("REDDIT_CLIENT_SECRET"),
    ) {
        (Some(client_id), Some(client_secret)) => Ok(Some(RedditCredentials {
            client_id,
            client_secret,
            refresh_token: optional_env("REDDIT_REFRESH_TOKEN"),
        })),
        (None, None) => Ok(None),
        (Some(_), None) => Err(ConfigError::MissingEnvVar(
            "REDDIT_CLIENT_SECRET".to_string(),
        )),
        (None, Some(_)) => Err(ConfigError::MissingEnvVar("REDDIT_CLIENT_ID".to_string())),
    }
}

fn load_translate_config() -> Option<TranslateConfig> {
    let api_url = optional_env("TRANSLATE_API_URL")?;
    let api_key = optional_env("TRANSLATE_API_KEY")?;
    Some(TranslateConfig {
        api_url,
        api_key,
        model: env_or_default(
            "TRANSLATE_MODEL",
            "meta-llama/Meta-Llama-3.1-8B-Instruct-Turbo",
        ),
        target_language: env_or_default("TRANSLATE_TARGET_LANGUAGE", "Simplified Chinese"),
    })
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u32(name: &str, default: u32) -> Result<u32, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u16(name: &str, default: u16) -> Result<u16, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_bool(name: &str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => match val.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::ParseBool {
                name: name.to_string(),
                value: val,
            }),
        },
        _ => Ok(default),
    }
}

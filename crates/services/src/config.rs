use std::env;
use std::time::Duration;

use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_API_URL: &str = "http://localhost:5000";
pub const DEFAULT_DB_URL: &str = "sqlite://educare-drafts.sqlite3";

/// Runtime settings shared by the API client and the attempt runtime.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceConfig {
    pub api_url: Url,
    pub api_token: Option<String>,
    pub db_url: String,
    pub autosave_secs: u32,
    pub tick: Duration,
    pub warning_ttl: Duration,
    pub http_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_url: Url::parse(DEFAULT_API_URL).expect("default API URL should be valid"),
            api_token: None,
            db_url: DEFAULT_DB_URL.to_owned(),
            autosave_secs: 30,
            tick: Duration::from_secs(1),
            warning_ttl: Duration::from_secs(3),
            http_timeout: Duration::from_secs(15),
        }
    }
}

impl ServiceConfig {
    /// Read configuration from the process environment, loading `.env` first.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for malformed URLs or numbers.
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is fine.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for malformed URLs or numbers.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_url = match get("EDUCARE_API_URL") {
            Some(raw) => parse_url("EDUCARE_API_URL", &raw)?,
            None => defaults.api_url,
        };
        let api_token = get("EDUCARE_API_TOKEN").map(|t| t.trim().to_owned());
        let db_url = get("EDUCARE_DB_URL").unwrap_or(defaults.db_url);

        let autosave_secs = match get("EDUCARE_AUTOSAVE_SECS") {
            Some(raw) => parse_positive("EDUCARE_AUTOSAVE_SECS", &raw)?,
            None => defaults.autosave_secs,
        };
        let tick = match get("EDUCARE_TICK_MILLIS") {
            Some(raw) => {
                Duration::from_millis(u64::from(parse_positive("EDUCARE_TICK_MILLIS", &raw)?))
            }
            None => defaults.tick,
        };
        let warning_ttl = match get("EDUCARE_WARNING_SECS") {
            Some(raw) => {
                Duration::from_secs(u64::from(parse_positive("EDUCARE_WARNING_SECS", &raw)?))
            }
            None => defaults.warning_ttl,
        };
        let http_timeout = match get("EDUCARE_HTTP_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(u64::from(parse_positive(
                "EDUCARE_HTTP_TIMEOUT_SECS",
                &raw,
            )?)),
            None => defaults.http_timeout,
        };

        Ok(Self {
            api_url,
            api_token,
            db_url,
            autosave_secs,
            tick,
            warning_ttl,
            http_timeout,
        })
    }

    /// # Errors
    ///
    /// Returns `ConfigError::InvalidUrl` if `raw` is not a URL.
    pub fn with_api_url(mut self, raw: &str) -> Result<Self, ConfigError> {
        self.api_url = parse_url("--api-url", raw)?;
        Ok(self)
    }

    #[must_use]
    pub fn with_api_token(mut self, token: Option<String>) -> Self {
        if token.is_some() {
            self.api_token = token;
        }
        self
    }

    #[must_use]
    pub fn with_db_url(mut self, db_url: impl Into<String>) -> Self {
        self.db_url = db_url.into();
        self
    }
}

fn parse_url(key: &'static str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw.trim()).map_err(|source| ConfigError::InvalidUrl { key, source })
}

fn parse_positive(key: &'static str, raw: &str) -> Result<u32, ConfigError> {
    match raw.trim().parse::<u32>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(ConfigError::InvalidNumber {
            key,
            value: raw.to_owned(),
        }),
    }
}

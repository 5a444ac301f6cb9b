//! Client configuration: where the template store and recording API live, and how to
//! authenticate against them.

use std::env;
use std::time::Duration;

use url::Url;

use crate::error::ConfigError;

pub const API_KEY_VAR: &str = "PROMPTBIND_API_KEY";
pub const API_BASE_VAR: &str = "PROMPTBIND_API_BASE";
pub const TIMEOUT_VAR: &str = "PROMPTBIND_TIMEOUT_SECS";

pub const DEFAULT_API_BASE: &str = "https://app.promptbind.dev/api";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct ClientConfig {
    api_base: Url,
    api_key: String,
    timeout: Duration,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_base", &self.api_base.as_str())
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ClientConfig {
    /// Fails if `api_base` is not an absolute URL that can take path segments.
    pub fn new(api_base: &str, api_key: impl Into<String>) -> Result<Self, ConfigError> {
        let api_base = Url::parse(api_base.trim_end_matches('/')).map_err(|source| ConfigError::InvalidUrl {
            value: api_base.to_string(),
            source,
        })?;
        if api_base.cannot_be_a_base() {
            return Err(ConfigError::CannotBeABase(api_base.to_string()));
        }
        Ok(Self {
            api_base,
            api_key: api_key.into(),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Loads configuration from environment variables, reading a `.env` file first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_env_inner()
    }

    /// Loads configuration from environment variables only.
    pub(crate) fn from_env_inner() -> Result<Self, ConfigError> {
        let api_key = env::var(API_KEY_VAR)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::MissingSetting(API_KEY_VAR))?;
        let api_base = env::var(API_BASE_VAR).unwrap_or_else(|_| DEFAULT_API_BASE.to_string());

        let config = Self::new(&api_base, api_key)?;
        match env::var(TIMEOUT_VAR) {
            Ok(raw) => {
                let seconds = raw.trim().parse::<u64>().map_err(|_| ConfigError::InvalidTimeout(raw.clone()))?;
                Ok(config.with_timeout(Duration::from_secs(seconds)))
            }
            Err(_) => Ok(config),
        }
    }

    #[inline]
    pub fn api_base(&self) -> &Url {
        &self.api_base
    }

    #[inline]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    #[inline]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// `{api_base}/{segments...}`, each segment percent-encoded.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, ConfigError> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| ConfigError::CannotBeABase(self.api_base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

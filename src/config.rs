//! Startup configuration read from the environment (and an optional `.env`).

use crate::gemini::GeminiConfig;
use std::time::Duration;

pub const API_KEY_VAR: &str = "GOOGLE_API_KEY";
pub const MODEL_VAR: &str = "GEMINI_MODEL";
pub const BASE_URL_VAR: &str = "GEMINI_BASE_URL";
pub const TIMEOUT_VAR: &str = "GEMINI_TIMEOUT_SECS";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("GOOGLE_API_KEY is not set (export it or add it to .env)")]
    MissingApiKey,

    #[error("GEMINI_TIMEOUT_SECS must be a whole number of seconds, got {0:?}")]
    InvalidTimeout(String),
}

impl GeminiConfig {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        match dotenv_outcome(dotenvy::dotenv()) {
            Ok(Some(path)) => log::debug!("Loaded environment from {}", path.display()),
            Ok(None) => {}
            Err(e) => log::warn!("Ignoring unreadable .env file: {e}"),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_key = read(API_KEY_VAR).ok_or(ConfigError::MissingApiKey)?;
        let mut config = GeminiConfig::new(api_key);

        if let Some(model) = read(MODEL_VAR) {
            config = config.with_model(model);
        }
        if let Some(base_url) = read(BASE_URL_VAR) {
            config = config.with_base_url(base_url);
        }
        if let Some(raw) = read(TIMEOUT_VAR) {
            let secs = raw
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidTimeout(raw.clone()))?;
            config = config.with_timeout(Some(Duration::from_secs(secs)));
        }

        Ok(config)
    }
}

// A missing `.env` is normal; anything else is worth reporting.
fn dotenv_outcome<T>(result: Result<T, dotenvy::Error>) -> Result<Option<T>, dotenvy::Error> {
    match result {
        Ok(loaded) => Ok(Some(loaded)),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

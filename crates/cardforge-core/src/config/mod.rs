//! Runtime configuration for remote sync.
//!
//! Values come from a lookup closure so callers can layer process env,
//! `.env` files and CLI profiles, and tests can run without touching env.

use std::env;
use std::time::Duration;

use crate::auth::{OAuthClientConfig, DEFAULT_TOKEN_URL};
use crate::error::{Error, Result};
use crate::sync::{SyncPolicy, TransportFailurePolicy, DEFAULT_CONFLICT_WINDOW_MS};
use crate::util::{is_http_url, normalize_text_option};

pub const ENV_DRIVE_API_BASE_URL: &str = "CARDFORGE_DRIVE_API_BASE_URL";
pub const ENV_OAUTH_TOKEN_URL: &str = "CARDFORGE_OAUTH_TOKEN_URL";
pub const ENV_GOOGLE_CLIENT_ID: &str = "GOOGLE_CLIENT_ID";
pub const ENV_GOOGLE_CLIENT_SECRET: &str = "GOOGLE_CLIENT_SECRET";
pub const ENV_GOOGLE_ACCESS_TOKEN: &str = "GOOGLE_DRIVE_ACCESS_TOKEN";
pub const ENV_CONFLICT_WINDOW_MS: &str = "CARDFORGE_CONFLICT_WINDOW_MS";
pub const ENV_AUTO_SYNC_DEBOUNCE_MS: &str = "CARDFORGE_AUTO_SYNC_DEBOUNCE_MS";
pub const ENV_TRANSPORT_FAILURE: &str = "CARDFORGE_TRANSPORT_FAILURE";

pub const DEFAULT_DRIVE_API_BASE_URL: &str = "https://www.googleapis.com";
pub const DEFAULT_AUTO_SYNC_DEBOUNCE_MS: u64 = 2000;

/// Everything needed to reach the remote store and tune the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub drive_api_base_url: String,
    /// OAuth client used to refresh stored sessions
    pub oauth: Option<OAuthClientConfig>,
    /// Pre-issued token; bypasses the OAuth session when set
    pub access_token: Option<String>,
    pub policy: SyncPolicy,
    pub auto_sync_debounce: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            drive_api_base_url: DEFAULT_DRIVE_API_BASE_URL.to_string(),
            oauth: None,
            access_token: None,
            policy: SyncPolicy::default(),
            auto_sync_debounce: Duration::from_millis(DEFAULT_AUTO_SYNC_DEBOUNCE_MS),
        }
    }
}

impl SyncConfig {
    /// Load from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::parse(|key| env::var(key).ok())
    }

    /// Parse from an arbitrary key lookup.
    pub fn parse(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let value = |key: &str| normalize_text_option(lookup(key));
        let mut config = Self::default();

        if let Some(url) = value(ENV_DRIVE_API_BASE_URL) {
            if !is_http_url(&url) {
                return Err(Error::InvalidInput(format!(
                    "{ENV_DRIVE_API_BASE_URL} must include http:// or https://"
                )));
            }
            config.drive_api_base_url = url.trim_end_matches('/').to_string();
        }

        match (value(ENV_GOOGLE_CLIENT_ID), value(ENV_GOOGLE_CLIENT_SECRET)) {
            (Some(client_id), secret) => {
                let token_url =
                    value(ENV_OAUTH_TOKEN_URL).unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string());
                let oauth = OAuthClientConfig::new(client_id, secret)
                    .and_then(|oauth| oauth.with_token_url(token_url))
                    .map_err(|error| Error::InvalidInput(error.to_string()))?;
                config.oauth = Some(oauth);
            }
            (None, Some(_)) => {
                return Err(Error::InvalidInput(format!(
                    "{ENV_GOOGLE_CLIENT_SECRET} is set but {ENV_GOOGLE_CLIENT_ID} is missing"
                )));
            }
            (None, None) => {}
        }

        config.access_token = value(ENV_GOOGLE_ACCESS_TOKEN);

        if let Some(raw) = value(ENV_CONFLICT_WINDOW_MS) {
            config.policy.conflict_window_ms = parse_non_negative(ENV_CONFLICT_WINDOW_MS, &raw)?;
        }
        if let Some(raw) = value(ENV_AUTO_SYNC_DEBOUNCE_MS) {
            let millis = parse_non_negative(ENV_AUTO_SYNC_DEBOUNCE_MS, &raw)?;
            config.auto_sync_debounce = Duration::from_millis(millis.unsigned_abs());
        }
        if let Some(raw) = value(ENV_TRANSPORT_FAILURE) {
            config.policy.transport_failure = raw.parse::<TransportFailurePolicy>()?;
        }

        Ok(config)
    }

    /// Whether some form of remote credential is configured.
    #[must_use]
    pub const fn has_remote_credentials(&self) -> bool {
        self.oauth.is_some() || self.access_token.is_some()
    }
}

fn parse_non_negative(key: &str, raw: &str) -> Result<i64> {
    match raw.parse::<i64>() {
        Ok(value) if value >= 0 => Ok(value),
        _ => Err(Error::InvalidInput(format!(
            "{key} must be a non-negative integer (got '{raw}')"
        ))),
    }
}

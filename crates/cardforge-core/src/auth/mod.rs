//! Google OAuth session handling for Drive access.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::util::{compact_text, is_http_url, normalize_text_option, unix_timestamp_now};

const EXPIRY_SKEW_SECONDS: i64 = 60;

pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_REVOKE_URL: &str = "https://oauth2.googleapis.com/revoke";

/// Scope granting access to the per-user hidden application folder.
pub const DRIVE_APPDATA_SCOPE: &str = "https://www.googleapis.com/auth/drive.appdata";

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoogleSession {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix seconds
    pub expires_at: i64,
    #[serde(default)]
    pub scope: Option<String>,
}

impl GoogleSession {
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at <= unix_timestamp_now() + EXPIRY_SKEW_SECONDS
    }
}

impl fmt::Debug for GoogleSession {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("GoogleSession")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Google OAuth is not configured (set GOOGLE_CLIENT_ID).")]
    NotConfigured,
    #[error("Not signed in to Google Drive.")]
    NotSignedIn,
    #[error("Invalid auth configuration: {0}")]
    InvalidConfiguration(&'static str),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to parse JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Auth API error: {0}")]
    Api(String),
    #[error("Secure storage error: {0}")]
    SecureStorage(String),
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Where a signed-in session is kept between runs.
pub trait SessionPersistence: Clone + Send + Sync + 'static {
    fn load_session(&self) -> AuthResult<Option<GoogleSession>>;
    fn save_session(&self, session: &GoogleSession) -> AuthResult<()>;
    fn clear_session(&self) -> AuthResult<()>;
}

/// Source of bearer tokens for remote calls.
#[allow(async_fn_in_trait)]
pub trait AccessTokenProvider {
    /// Return a valid access token, refreshing it when needed.
    async fn ensure_signed_in(&self) -> AuthResult<String>;

    /// Whether a session exists, without touching the network.
    fn is_signed_in(&self) -> bool;
}

/// OAuth client registration
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub token_url: String,
    pub revoke_url: String,
}

impl OAuthClientConfig {
    pub fn new(client_id: impl Into<String>, client_secret: Option<String>) -> AuthResult<Self> {
        let client_id = client_id.into().trim().to_string();
        if client_id.is_empty() {
            return Err(AuthError::NotConfigured);
        }
        Ok(Self {
            client_id,
            client_secret: normalize_text_option(client_secret),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            revoke_url: DEFAULT_REVOKE_URL.to_string(),
        })
    }

    pub fn with_token_url(mut self, token_url: impl AsRef<str>) -> AuthResult<Self> {
        let token_url = token_url.as_ref().trim().trim_end_matches('/');
        if !is_http_url(token_url) {
            return Err(AuthError::InvalidConfiguration(
                "OAuth token URL must include http:// or https://",
            ));
        }
        token_url.clone_into(&mut self.token_url);
        Ok(self)
    }
}

impl fmt::Debug for OAuthClientConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("OAuthClientConfig")
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("token_url", &self.token_url)
            .finish_non_exhaustive()
    }
}

/// Refresh-token based Google session client.
#[derive(Clone)]
pub struct GoogleAuthClient<S: SessionPersistence> {
    config: OAuthClientConfig,
    client: Client,
    store: S,
    cached: Arc<Mutex<Option<GoogleSession>>>,
}

impl<S: SessionPersistence> GoogleAuthClient<S> {
    pub fn new(config: OAuthClientConfig, store: S) -> AuthResult<Self> {
        Ok(Self {
            config,
            client: Client::builder().build()?,
            store,
            cached: Arc::new(Mutex::new(None)),
        })
    }

    /// Exchange a refresh token (from an external consent flow) for a session.
    pub async fn sign_in_with_refresh_token(&self, refresh_token: &str) -> AuthResult<GoogleSession> {
        self.refresh_session(refresh_token).await
    }

    pub async fn restore_session(&self) -> AuthResult<Option<GoogleSession>> {
        let Some(stored_session) = self.store.load_session()? else {
            return Ok(None);
        };

        if !stored_session.is_expired() {
            return Ok(Some(stored_session));
        }

        match self.refresh_session(&stored_session.refresh_token).await {
            Ok(refreshed) => Ok(Some(refreshed)),
            Err(error) => {
                tracing::warn!("Failed to refresh persisted session: {}", error);
                self.store.clear_session()?;
                self.set_cached(None);
                Ok(None)
            }
        }
    }

    pub async fn refresh_session(&self, refresh_token: &str) -> AuthResult<GoogleSession> {
        if refresh_token.trim().is_empty() {
            return Err(AuthError::InvalidConfiguration(
                "Refresh token must not be empty",
            ));
        }

        let mut form = vec![
            ("grant_type", "refresh_token"),
            ("client_id", self.config.client_id.as_str()),
            ("refresh_token", refresh_token.trim()),
        ];
        if let Some(secret) = self.config.client_secret.as_deref() {
            form.push(("client_secret", secret));
        }

        let response = self
            .client
            .post(&self.config.token_url)
            .form(&form)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Api(parse_api_error(status, &body)));
        }

        let payload = response.json::<TokenResponse>().await?;
        let session = payload.into_session(refresh_token.trim())?;
        self.store.save_session(&session)?;
        self.set_cached(Some(session.clone()));
        Ok(session)
    }

    /// Revoke the stored refresh token and forget the session locally.
    pub async fn sign_out(&self) -> AuthResult<()> {
        if let Some(session) = self.store.load_session()? {
            let response = self
                .client
                .post(&self.config.revoke_url)
                .form(&[("token", session.refresh_token.as_str())])
                .send()
                .await?;
            // 400 means the token was already invalid
            if !(response.status().is_success() || response.status() == StatusCode::BAD_REQUEST) {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(AuthError::Api(parse_api_error(status, &body)));
            }
        }

        self.store.clear_session()?;
        self.set_cached(None);
        Ok(())
    }

    /// Stored session, if any, without refreshing it.
    pub fn stored_session(&self) -> AuthResult<Option<GoogleSession>> {
        self.store.load_session()
    }

    fn cached_valid(&self) -> Option<GoogleSession> {
        self.cached
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .filter(|session| !session.is_expired())
    }

    fn set_cached(&self, session: Option<GoogleSession>) {
        *self.cached.lock().unwrap_or_else(PoisonError::into_inner) = session;
    }
}

impl<S: SessionPersistence> AccessTokenProvider for GoogleAuthClient<S> {
    async fn ensure_signed_in(&self) -> AuthResult<String> {
        if let Some(session) = self.cached_valid() {
            return Ok(session.access_token);
        }

        let session = self.restore_session().await?.ok_or(AuthError::NotSignedIn)?;
        self.set_cached(Some(session.clone()));
        Ok(session.access_token)
    }

    fn is_signed_in(&self) -> bool {
        self.cached_valid().is_some() || matches!(self.store.load_session(), Ok(Some(_)))
    }
}

/// A pre-issued access token, e.g. from `GOOGLE_DRIVE_ACCESS_TOKEN`.
#[derive(Clone)]
pub struct StaticAccessToken {
    token: String,
}

impl StaticAccessToken {
    pub fn new(token: impl Into<String>) -> AuthResult<Self> {
        let token = token.into().trim().to_string();
        if token.is_empty() {
            return Err(AuthError::InvalidConfiguration(
                "Access token must not be empty",
            ));
        }
        Ok(Self { token })
    }
}

impl fmt::Debug for StaticAccessToken {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("StaticAccessToken")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl AccessTokenProvider for StaticAccessToken {
    async fn ensure_signed_in(&self) -> AuthResult<String> {
        Ok(self.token.clone())
    }

    fn is_signed_in(&self) -> bool {
        true
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
    scope: Option<String>,
}

impl TokenResponse {
    /// Google omits the refresh token on refresh; keep the one we sent.
    fn into_session(self, sent_refresh_token: &str) -> AuthResult<GoogleSession> {
        let access_token = self
            .access_token
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| AuthError::Api("Token response did not include an access token".to_string()))?;
        let expires_in = self.expires_in.unwrap_or(3600);

        Ok(GoogleSession {
            access_token,
            refresh_token: self
                .refresh_token
                .unwrap_or_else(|| sent_refresh_token.to_string()),
            expires_at: unix_timestamp_now().saturating_add(expires_in),
            scope: self.scope,
        })
    }
}

#[derive(Debug, Deserialize)]
struct OAuthErrorResponse {
    error: Option<String>,
    error_description: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<OAuthErrorResponse>(body) {
        if let Some(message) = payload.error_description.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

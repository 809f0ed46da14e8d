//! CLI Google session helpers with secure keychain persistence.

#[cfg(test)]
use std::collections::HashMap;
#[cfg(test)]
use std::sync::{Mutex, OnceLock};

#[cfg(not(test))]
use keyring::Entry;

use cardforge_core::auth::{
    AccessTokenProvider, AuthResult, GoogleAuthClient, SessionPersistence, StaticAccessToken,
};
pub use cardforge_core::auth::{AuthError, GoogleSession};
use cardforge_core::config::SyncConfig;

#[cfg(not(test))]
const KEYRING_SERVICE_NAME: &str = "cardforge-cli";

#[derive(Clone)]
pub struct SessionStore {
    username: String,
}

impl SessionStore {
    pub fn new(profile_name: &str) -> Self {
        Self {
            username: format!("google_session:{profile_name}"),
        }
    }

    #[cfg(test)]
    fn test_store() -> &'static Mutex<HashMap<String, String>> {
        static STORE: OnceLock<Mutex<HashMap<String, String>>> = OnceLock::new();
        STORE.get_or_init(|| Mutex::new(HashMap::new()))
    }

    #[cfg(not(test))]
    fn entry(&self) -> AuthResult<Entry> {
        Entry::new(KEYRING_SERVICE_NAME, &self.username)
            .map_err(|error| AuthError::SecureStorage(error.to_string()))
    }
}

impl SessionPersistence for SessionStore {
    #[cfg(not(test))]
    fn load_session(&self) -> AuthResult<Option<GoogleSession>> {
        let entry = self.entry()?;
        match entry.get_password() {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(AuthError::SecureStorage(error.to_string())),
        }
    }

    #[cfg(test)]
    fn load_session(&self) -> AuthResult<Option<GoogleSession>> {
        let store = Self::test_store();
        let guard = store
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        if let Some(raw) = guard.get(&self.username) {
            Ok(Some(serde_json::from_str(raw)?))
        } else {
            Ok(None)
        }
    }

    #[cfg(not(test))]
    fn save_session(&self, session: &GoogleSession) -> AuthResult<()> {
        let raw = serde_json::to_string(session)?;
        self.entry()?
            .set_password(&raw)
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        Ok(())
    }

    #[cfg(test)]
    fn save_session(&self, session: &GoogleSession) -> AuthResult<()> {
        let raw = serde_json::to_string(session)?;
        let store = Self::test_store();
        let mut guard = store
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        guard.insert(self.username.clone(), raw);
        Ok(())
    }

    #[cfg(not(test))]
    fn clear_session(&self) -> AuthResult<()> {
        let entry = self.entry()?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(AuthError::SecureStorage(error.to_string())),
        }
    }

    #[cfg(test)]
    fn clear_session(&self) -> AuthResult<()> {
        let store = Self::test_store();
        let mut guard = store
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        guard.remove(&self.username);
        Ok(())
    }
}

pub type GoogleAuthService = GoogleAuthClient<SessionStore>;

/// OAuth client for a profile, when the profile has a client registration.
pub fn auth_service_for_profile(
    profile_name: &str,
    config: &SyncConfig,
) -> AuthResult<Option<GoogleAuthService>> {
    config
        .oauth
        .clone()
        .map(|oauth| GoogleAuthClient::new(oauth, SessionStore::new(profile_name)))
        .transpose()
}

pub fn load_stored_session(profile_name: &str) -> AuthResult<Option<GoogleSession>> {
    SessionStore::new(profile_name).load_session()
}

pub fn clear_stored_session(profile_name: &str) -> AuthResult<()> {
    SessionStore::new(profile_name).clear_session()
}

/// Token source chosen for this invocation.
///
/// A pre-issued token beats a stored OAuth session.
#[derive(Clone)]
pub enum CliTokens {
    Static(StaticAccessToken),
    OAuth(GoogleAuthService),
    Unconfigured,
}

impl CliTokens {
    pub fn for_profile(profile_name: &str, config: &SyncConfig) -> AuthResult<Self> {
        if let Some(token) = config.access_token.as_deref() {
            return Ok(Self::Static(StaticAccessToken::new(token)?));
        }
        Ok(auth_service_for_profile(profile_name, config)?
            .map_or(Self::Unconfigured, Self::OAuth))
    }

    pub const fn is_configured(&self) -> bool {
        !matches!(self, Self::Unconfigured)
    }

    pub const fn label(&self) -> &'static str {
        match self {
            Self::Static(_) => "access token",
            Self::OAuth(_) => "OAuth session",
            Self::Unconfigured => "not configured",
        }
    }
}

impl AccessTokenProvider for CliTokens {
    async fn ensure_signed_in(&self) -> AuthResult<String> {
        match self {
            Self::Static(token) => token.ensure_signed_in().await,
            Self::OAuth(client) => client.ensure_signed_in().await,
            Self::Unconfigured => Err(AuthError::NotConfigured),
        }
    }

    fn is_signed_in(&self) -> bool {
        match self {
            Self::Static(token) => token.is_signed_in(),
            Self::OAuth(client) => client.is_signed_in(),
            Self::Unconfigured => false,
        }
    }
}

//! Persistent CLI profile configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use cardforge_core::config::{
    ENV_DRIVE_API_BASE_URL, ENV_GOOGLE_CLIENT_ID, ENV_GOOGLE_CLIENT_SECRET, ENV_OAUTH_TOKEN_URL,
};
pub use cardforge_core::util::{is_http_url, normalize_text_option};
use serde::{Deserialize, Serialize};

const CONFIG_FILE_NAME: &str = "cli-config.json";
pub const ENV_PROFILE: &str = "CARDFORGE_PROFILE";
pub const DEFAULT_PROFILE: &str = "default";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliProfilesConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default)]
    pub active_profile: Option<String>,
    #[serde(default)]
    pub profiles: BTreeMap<String, CliProfile>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliProfile {
    #[serde(default)]
    pub google_client_id: Option<String>,
    #[serde(default)]
    pub google_client_secret: Option<String>,
    #[serde(default)]
    pub drive_api_base_url: Option<String>,
    #[serde(default)]
    pub oauth_token_url: Option<String>,
}

const fn default_config_version() -> u32 {
    1
}

pub fn default_config_path() -> Result<PathBuf, String> {
    dirs::config_dir()
        .map(|dir| dir.join("cardforge").join(CONFIG_FILE_NAME))
        .ok_or_else(|| "Failed to resolve CLI config directory".to_string())
}

pub fn normalize_profile_name(value: Option<&str>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

impl CliProfilesConfig {
    pub fn load() -> Result<Self, String> {
        Self::load_from_path(&default_config_path()?)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|error| format!("Failed to read config at {}: {}", path.display(), error))?;
        let mut config = serde_json::from_str::<Self>(&raw)
            .map_err(|error| format!("Failed to parse config at {}: {}", path.display(), error))?;
        config.normalize();
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf, String> {
        let path = default_config_path()?;
        self.save_to_path(&path)?;
        Ok(path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    error
                )
            })?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        let serialized = serde_json::to_string_pretty(&normalized)
            .map_err(|error| format!("Failed to serialize config: {error}"))?;
        std::fs::write(path, serialized)
            .map_err(|error| format!("Failed to write config at {}: {}", path.display(), error))
    }

    /// Explicit flag, then `CARDFORGE_PROFILE`, then the active profile.
    pub fn resolve_profile_name(&self, explicit: Option<&str>) -> String {
        if let Some(profile) = normalize_profile_name(explicit) {
            return profile;
        }
        if let Some(profile) = normalize_profile_name(std::env::var(ENV_PROFILE).ok().as_deref()) {
            return profile;
        }
        if let Some(profile) = normalize_profile_name(self.active_profile.as_deref()) {
            return profile;
        }
        DEFAULT_PROFILE.to_string()
    }

    pub fn profile(&self, name: &str) -> Option<&CliProfile> {
        self.profiles.get(name)
    }

    pub fn profile_mut_or_default(&mut self, name: &str) -> &mut CliProfile {
        self.profiles.entry(name.to_string()).or_default()
    }

    fn normalize(&mut self) {
        self.active_profile = normalize_profile_name(self.active_profile.as_deref());
        for profile in self.profiles.values_mut() {
            profile.normalize();
        }
    }
}

impl CliProfile {
    /// Value for a sync config key, so a profile can stand in for env vars.
    pub fn lookup(&self, key: &str) -> Option<String> {
        let value = match key {
            ENV_GOOGLE_CLIENT_ID => &self.google_client_id,
            ENV_GOOGLE_CLIENT_SECRET => &self.google_client_secret,
            ENV_DRIVE_API_BASE_URL => &self.drive_api_base_url,
            ENV_OAUTH_TOKEN_URL => &self.oauth_token_url,
            _ => return None,
        };
        normalize_text_option(value.clone())
    }

    pub fn has_oauth_client(&self) -> bool {
        self.lookup(ENV_GOOGLE_CLIENT_ID).is_some()
    }

    fn normalize(&mut self) {
        self.google_client_id = normalize_text_option(self.google_client_id.take());
        self.google_client_secret = normalize_text_option(self.google_client_secret.take());
        self.drive_api_base_url = normalize_text_option(self.drive_api_base_url.take());
        self.oauth_token_url = normalize_text_option(self.oauth_token_url.take());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn normalize_profile_name_rejects_empty() {
        assert_eq!(normalize_profile_name(None), None);
        assert_eq!(normalize_profile_name(Some(" ")), None);
        assert_eq!(normalize_profile_name(Some(" work ")), Some("work".to_string()));
    }

    #[test]
    fn config_roundtrip_preserves_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);

        let mut config = CliProfilesConfig {
            version: 1,
            active_profile: Some(" default ".to_string()),
            profiles: BTreeMap::new(),
        };
        config.profiles.insert(
            "default".to_string(),
            CliProfile {
                google_client_id: Some(" client-id.apps.googleusercontent.com ".to_string()),
                google_client_secret: Some("   ".to_string()),
                drive_api_base_url: None,
                oauth_token_url: None,
            },
        );

        config.save_to_path(&path).unwrap();
        let loaded = CliProfilesConfig::load_from_path(&path).unwrap();

        assert_eq!(loaded.active_profile.as_deref(), Some("default"));
        let profile = loaded.profile("default").unwrap();
        assert_eq!(
            profile.google_client_id.as_deref(),
            Some("client-id.apps.googleusercontent.com")
        );
        assert_eq!(profile.google_client_secret, None);
    }

    #[test]
    fn missing_config_file_loads_default() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = CliProfilesConfig::load_from_path(&dir.path().join("absent.json")).unwrap();
        assert_eq!(loaded, CliProfilesConfig::default());
    }

    #[test]
    fn malformed_config_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "{not json").unwrap();

        let error = CliProfilesConfig::load_from_path(&path).unwrap_err();
        assert!(error.contains("Failed to parse config"));
    }

    #[test]
    fn explicit_profile_wins() {
        let config = CliProfilesConfig {
            active_profile: Some("work".to_string()),
            ..CliProfilesConfig::default()
        };
        assert_eq!(config.resolve_profile_name(Some("home")), "home");
    }

    #[test]
    fn profile_lookup_maps_config_keys() {
        let profile = CliProfile {
            google_client_id: Some("client".to_string()),
            drive_api_base_url: Some("http://127.0.0.1:9000".to_string()),
            ..CliProfile::default()
        };
        assert_eq!(profile.lookup(ENV_GOOGLE_CLIENT_ID).as_deref(), Some("client"));
        assert_eq!(
            profile.lookup(ENV_DRIVE_API_BASE_URL).as_deref(),
            Some("http://127.0.0.1:9000")
        );
        assert_eq!(profile.lookup(ENV_GOOGLE_CLIENT_SECRET), None);
        assert_eq!(profile.lookup("UNRELATED"), None);
        assert!(profile.has_oauth_client());
    }
}

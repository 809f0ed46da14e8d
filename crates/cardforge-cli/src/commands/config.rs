use serde::Serialize;

use crate::cli::ConfigCommands;
use crate::commands::common::resolve_sync_config;
use crate::config_profiles::{is_http_url, normalize_text_option, CliProfile, CliProfilesConfig};
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct ProfileView {
    profile: String,
    active: bool,
    google_client_id: Option<String>,
    google_client_secret: Option<&'static str>,
    drive_api_base_url: String,
    oauth_token_url: Option<String>,
    conflict_window_ms: i64,
    transport_failure: &'static str,
    auto_sync_debounce_ms: u128,
}

pub fn run_config(command: ConfigCommands, profile: Option<&str>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            client_id,
            client_secret,
            drive_api_base_url,
            token_url,
            no_activate,
        } => {
            let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
            let profile_name = config.resolve_profile_name(profile);
            let updates = CliProfile {
                google_client_id: client_id,
                google_client_secret: client_secret,
                drive_api_base_url: normalize_url(drive_api_base_url, "--drive-api-base-url")?,
                oauth_token_url: normalize_url(token_url, "--token-url")?,
            };
            apply_profile_updates(config.profile_mut_or_default(&profile_name), updates);
            resolve_sync_config(config.profile(&profile_name))?;

            if !no_activate {
                config.active_profile = Some(profile_name.clone());
            }
            let path = config.save().map_err(CliError::Config)?;
            println!("Saved profile '{}' to {}", profile_name, path.display());
            Ok(())
        }
        ConfigCommands::Show => {
            let config = CliProfilesConfig::load().map_err(CliError::Config)?;
            let profile_name = config.resolve_profile_name(profile);
            let stored = config.profile(&profile_name).cloned().unwrap_or_default();
            let resolved = resolve_sync_config(Some(&stored))?;
            let view = ProfileView {
                active: config.active_profile.as_deref() == Some(profile_name.as_str()),
                profile: profile_name,
                google_client_id: resolved.oauth.as_ref().map(|oauth| oauth.client_id.clone()),
                google_client_secret: resolved
                    .oauth
                    .as_ref()
                    .and_then(|oauth| oauth.client_secret.as_ref())
                    .map(|_| "[REDACTED]"),
                drive_api_base_url: resolved.drive_api_base_url.clone(),
                oauth_token_url: resolved.oauth.as_ref().map(|oauth| oauth.token_url.clone()),
                conflict_window_ms: resolved.policy.conflict_window_ms,
                transport_failure: resolved.policy.transport_failure.as_str(),
                auto_sync_debounce_ms: resolved.auto_sync_debounce.as_millis(),
            };
            println!("{}", serde_json::to_string_pretty(&view)?);
            Ok(())
        }
    }
}

/// Overwrite only the fields given on the command line.
pub fn apply_profile_updates(profile: &mut CliProfile, updates: CliProfile) {
    if let Some(value) = normalize_text_option(updates.google_client_id) {
        profile.google_client_id = Some(value);
    }
    if let Some(value) = normalize_text_option(updates.google_client_secret) {
        profile.google_client_secret = Some(value);
    }
    if let Some(value) = updates.drive_api_base_url {
        profile.drive_api_base_url = Some(value);
    }
    if let Some(value) = updates.oauth_token_url {
        profile.oauth_token_url = Some(value);
    }
}

pub fn normalize_url(value: Option<String>, flag: &str) -> Result<Option<String>, CliError> {
    let Some(value) = normalize_text_option(value) else {
        return Ok(None);
    };
    if !is_http_url(&value) {
        return Err(CliError::Config(format!(
            "{flag} must include http:// or https://"
        )));
    }
    Ok(Some(value.trim_end_matches('/').to_string()))
}

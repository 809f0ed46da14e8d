use cardforge_core::config::ENV_GOOGLE_ACCESS_TOKEN;

use crate::auth::{auth_service_for_profile, clear_stored_session, load_stored_session};
use crate::cli::AuthCommands;
use crate::commands::common::{format_sync_timestamp, load_profile_sync_config};
use crate::error::CliError;

pub async fn run_auth(command: AuthCommands, profile: Option<&str>) -> Result<(), CliError> {
    match command {
        AuthCommands::Login { refresh_token } => {
            let (profile_name, config) = load_profile_sync_config(profile)?;
            let auth_service = auth_service_for_profile(&profile_name, &config)
                .map_err(|error| CliError::Auth(error.to_string()))?
                .ok_or_else(|| {
                    CliError::Config(format!(
                        "Profile '{profile_name}' has no Google OAuth client. Run `cardforge config init --profile {profile_name} --client-id <ID>` first."
                    ))
                })?;
            let session = auth_service
                .sign_in_with_refresh_token(&refresh_token)
                .await
                .map_err(|error| CliError::Auth(error.to_string()))?;
            println!(
                "Signed in profile '{}' (access token expires {})",
                profile_name,
                format_sync_timestamp(session.expires_at.saturating_mul(1000))
            );
            Ok(())
        }
        AuthCommands::Status => {
            let (profile_name, config) = load_profile_sync_config(profile)?;
            if config.access_token.is_some() {
                println!("Profile '{profile_name}' uses {ENV_GOOGLE_ACCESS_TOKEN} from the environment.");
                return Ok(());
            }

            let session = match auth_service_for_profile(&profile_name, &config)
                .map_err(|error| CliError::Auth(error.to_string()))?
            {
                Some(service) => service
                    .restore_session()
                    .await
                    .map_err(|error| CliError::Auth(error.to_string()))?,
                None => load_stored_session(&profile_name)
                    .map_err(|error| CliError::Auth(error.to_string()))?,
            };

            if let Some(session) = session {
                println!(
                    "Profile '{}' is signed in (expires {})",
                    profile_name,
                    format_sync_timestamp(session.expires_at.saturating_mul(1000))
                );
            } else {
                println!("Profile '{profile_name}' is not signed in.");
            }
            Ok(())
        }
        AuthCommands::Logout => {
            let (profile_name, config) = load_profile_sync_config(profile)?;
            let maybe_auth_service = auth_service_for_profile(&profile_name, &config)
                .map_err(|error| CliError::Auth(error.to_string()))?;

            if let Some(service) = maybe_auth_service {
                if let Err(error) = service.sign_out().await {
                    tracing::warn!("Failed to revoke Google session: {}", error);
                    clear_stored_session(&profile_name)
                        .map_err(|error| CliError::Auth(error.to_string()))?;
                }
            } else {
                clear_stored_session(&profile_name)
                    .map_err(|error| CliError::Auth(error.to_string()))?;
            }

            println!("Signed out profile '{profile_name}'");
            Ok(())
        }
    }
}

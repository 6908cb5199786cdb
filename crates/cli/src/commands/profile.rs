//! Profile command.

use propdesk_auth::AuthConfig;

use crate::app::App;
use crate::error::CliError;

/// Load and show the signed-in principal's profile.
pub async fn show(config: AuthConfig) -> Result<(), CliError> {
    let app = App::start(&config).await?;
    let result = app.service.load_profile().await;
    app.finish().await;

    match result? {
        Some(profile) => tracing::info!(
            id = %profile.id,
            email = profile.email.as_ref().map_or("-", |e| e.as_str()),
            full_name = profile.full_name.as_deref().unwrap_or("-"),
            created_at = ?profile.created_at,
            "Profile"
        ),
        None => tracing::warn!("No profile row for the signed-in account"),
    }
    Ok(())
}

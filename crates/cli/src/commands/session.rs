//! Session transition commands.
//!
//! # Usage
//!
//! ```bash
//! propdesk login -e tenant@example.com -p 'correct-horse'
//! propdesk login --admin -e ops@propdesk.app -p 'correct-horse'
//! propdesk signup -e tenant@example.com -p 'correct-horse'
//! propdesk logout
//! propdesk status
//! ```

use propdesk_auth::AuthConfig;

use crate::app::App;
use crate::error::CliError;

/// Sign in through the user or admin form.
pub async fn login(
    config: AuthConfig,
    email: &str,
    password: &str,
    admin: bool,
) -> Result<(), CliError> {
    let app = App::start(&config).await?;
    let result = app.service.sign_in(email, password, admin).await;
    let route = app.service.navigation().current_route();
    app.finish().await;

    let role = result?;
    tracing::info!(%role, route = %route, "Signed in as {email}");
    Ok(())
}

/// Create a user account.
pub async fn signup(config: AuthConfig, email: &str, password: &str) -> Result<(), CliError> {
    let app = App::start(&config).await?;
    let result = app.service.sign_up(email, password).await;
    app.finish().await;

    let report = result?;
    tracing::info!(
        principal = %report.principal.id,
        signed_in = report.signed_in,
        warnings = report.warnings.len(),
        "Account created for {email}"
    );
    for warning in &report.warnings {
        tracing::warn!(?warning, "Sign-up completed with a warning");
    }
    Ok(())
}

/// Sign out. Succeeds even when already signed out or when the stored
/// session cannot be loaded.
pub async fn logout(config: AuthConfig) -> Result<(), CliError> {
    let app = App::assemble(&config)?;
    if let Err(e) = app.initialize().await {
        tracing::warn!(error = %e, "Could not load session, signing out anyway");
    }
    app.service.sign_out().await;
    app.finish().await;
    tracing::info!("Signed out");
    Ok(())
}

/// Show the current session, role, route and bypass state.
pub async fn status(config: AuthConfig) -> Result<(), CliError> {
    let app = App::start(&config).await?;
    let snapshot = app.service.store().snapshot();
    let route = app.service.navigation().current_route();
    let bypass = app.service.bypass().active_role();

    match snapshot.principal() {
        Some(principal) => tracing::info!(
            principal = %principal.id,
            email = principal.email_str().unwrap_or("-"),
            role = %app.service.roles().resolve(principal),
            expires_at = ?snapshot.session.as_ref().map(|s| s.expires_at),
            route = %route,
            "Signed in"
        ),
        None => tracing::info!(route = %route, "Signed out"),
    }
    if let Some(role) = bypass {
        tracing::info!(%role, "Development bypass active at the route guard");
    }

    app.finish().await;
    Ok(())
}

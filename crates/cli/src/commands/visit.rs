//! Route guard command.

use propdesk_auth::AuthConfig;
use propdesk_core::AppRoute;

use crate::app::App;
use crate::error::CliError;

/// Navigate to `path` and apply the route guard.
pub async fn visit(config: AuthConfig, path: &str) -> Result<(), CliError> {
    let app = App::start(&config).await?;
    let route = AppRoute::parse(path);

    match app.service.visit(&route) {
        Some(redirect) => tracing::info!(
            requested = %route,
            kind = ?route.kind(),
            redirect = %redirect.location(),
            "Redirected"
        ),
        None => tracing::info!(route = %route, kind = ?route.kind(), "Allowed"),
    }

    app.finish().await;
    Ok(())
}

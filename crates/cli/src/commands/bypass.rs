//! Development bypass commands.
//!
//! These never contact the backend.

use propdesk_auth::AuthConfig;
use propdesk_auth::bypass::DevBypass;
use propdesk_auth::markers::Markers;
use propdesk_core::Role;

use crate::app::open_storage;
use crate::error::CliError;

fn dev_bypass(config: &AuthConfig) -> Result<DevBypass, CliError> {
    Ok(DevBypass::new(
        config.environment,
        Markers::new(open_storage(config)?),
    ))
}

pub fn enable(config: &AuthConfig, role: Role) -> Result<(), CliError> {
    dev_bypass(config)?.enable(role)?;
    Ok(())
}

pub fn disable(config: &AuthConfig) -> Result<(), CliError> {
    dev_bypass(config)?.disable()?;
    Ok(())
}

pub fn show(config: &AuthConfig) -> Result<(), CliError> {
    let bypass = dev_bypass(config)?;
    let stored = bypass.stored();
    tracing::info!(
        environment = %bypass.environment(),
        enabled = stored.bypass_enabled,
        role = %stored.role,
        honored = bypass.active_role().is_some(),
        "Development bypass"
    );
    Ok(())
}

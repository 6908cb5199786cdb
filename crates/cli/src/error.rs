//! CLI error type.

use thiserror::Error;

use propdesk_auth::bypass::BypassError;
use propdesk_auth::provider::ProviderError;
use propdesk_auth::services::mailer::MailerError;
use propdesk_auth::services::profiles::ProfileError;
use propdesk_auth::storage::StoreError;
use propdesk_auth::{AuthError, ConfigError};

/// Errors that can end a CLI command.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("local state error: {0}")]
    Store(#[from] StoreError),

    #[error("auth client error: {0}")]
    Provider(#[from] ProviderError),

    #[error("profile client error: {0}")]
    Profile(#[from] ProfileError),

    #[error("mailer client error: {0}")]
    Mailer(#[from] MailerError),

    #[error("{}", .0.user_message())]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Bypass(#[from] BypassError),
}

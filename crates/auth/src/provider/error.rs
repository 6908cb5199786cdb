//! Auth provider error types.

use thiserror::Error;

use crate::storage::StoreError;

/// Errors reported by an [`AuthProvider`](super::AuthProvider).
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Wrong password or unknown account. Carries the provider's message.
    #[error("{0}")]
    InvalidCredentials(String),

    /// Sign-up for an email that already has an account.
    #[error("user already registered")]
    UserAlreadyExists,

    /// The operation needs a session and there is none.
    #[error("no active session")]
    NoSession,

    /// The provider could not be reached.
    #[error("network error: {0}")]
    Network(String),

    /// The provider rejected the request.
    #[error("auth provider error: {status} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Provider message.
        message: String,
    },

    /// The provider's response could not be understood.
    #[error("unexpected provider response: {0}")]
    Parse(String),

    /// The local session cache failed.
    #[error("session cache error: {0}")]
    Storage(#[from] StoreError),
}

impl ProviderError {
    /// Returns `true` if the provider definitively rejected a token or request,
    /// as opposed to being unreachable.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        match self {
            Self::Api { status, .. } => *status >= 400 && *status < 500,
            Self::InvalidCredentials(_) | Self::NoSession => true,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Parse(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

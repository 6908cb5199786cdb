//! Authentication error types.

use thiserror::Error;

use crate::provider::ProviderError;
use crate::services::profiles::ProfileError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] propdesk_core::EmailError),

    /// Password too short.
    #[error("password must be at least {min} characters")]
    WeakPassword { min: usize },

    /// Wrong password or unknown account. Carries the provider's message.
    #[error("{0}")]
    InvalidCredentials(String),

    /// An administrator tried the regular sign-in form.
    #[error("administrators must use the admin login")]
    UseAdminLogin,

    /// A non-administrator tried the admin sign-in form.
    #[error("unauthorized admin login")]
    UnauthorizedAdminLogin,

    /// Administrator accounts cannot be created through sign-up.
    #[error("administrator accounts cannot sign up")]
    AdminSignupForbidden,

    /// Sign-up for an email that already has an account.
    #[error("an account with this email already exists")]
    UserAlreadyExists,

    /// The auth provider could not be reached.
    #[error("network error: {0}")]
    Network(String),

    /// Any other provider failure.
    #[error("auth provider error: {0}")]
    Provider(ProviderError),

    /// The initial session fetch failed.
    #[error("authentication setup failed: {0}")]
    Setup(ProviderError),

    /// The operation needs a signed-in principal.
    #[error("not signed in")]
    NotSignedIn,

    /// Profile backend failure.
    #[error("profile error: {0}")]
    Profile(#[from] ProfileError),
}

impl From<ProviderError> for AuthError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::InvalidCredentials(message) => Self::InvalidCredentials(message),
            ProviderError::UserAlreadyExists => Self::UserAlreadyExists,
            ProviderError::NoSession => Self::NotSignedIn,
            ProviderError::Network(message) => Self::Network(message),
            other => Self::Provider(other),
        }
    }
}

impl AuthError {
    /// Text suitable for showing to the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidEmail(_) => "Please enter a valid email address".to_string(),
            Self::WeakPassword { min } => {
                format!("Password must be at least {min} characters")
            }
            Self::InvalidCredentials(message) => message.clone(),
            Self::UseAdminLogin => "Please use the admin login page".to_string(),
            Self::UnauthorizedAdminLogin => {
                "This account is not authorized for admin access".to_string()
            }
            Self::AdminSignupForbidden => {
                "Admin accounts cannot be created through sign-up".to_string()
            }
            Self::UserAlreadyExists => "An account with this email already exists".to_string(),
            Self::Network(_) => "Could not reach the server, please try again".to_string(),
            Self::Setup(_) => "Authentication setup failed".to_string(),
            Self::NotSignedIn => "Please sign in to continue".to_string(),
            Self::Provider(_) | Self::Profile(_) => "Something went wrong, please try again".to_string(),
        }
    }

    /// Whether the error is caused by user input rather than a fault.
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidEmail(_)
                | Self::WeakPassword { .. }
                | Self::InvalidCredentials(_)
                | Self::UseAdminLogin
                | Self::UnauthorizedAdminLogin
                | Self::AdminSignupForbidden
                | Self::UserAlreadyExists
                | Self::NotSignedIn
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_mapping() {
        let err: AuthError =
            ProviderError::InvalidCredentials("Invalid login credentials".to_string()).into();
        assert!(matches!(err, AuthError::InvalidCredentials(_)));
        assert_eq!(err.user_message(), "Invalid login credentials");

        let err: AuthError = ProviderError::Network("connection refused".to_string()).into();
        assert!(matches!(err, AuthError::Network(_)));
        assert!(!err.is_user_error());

        let err: AuthError = ProviderError::Api {
            status: 500,
            message: "boom".to_string(),
        }
        .into();
        assert!(matches!(err, AuthError::Provider(_)));
    }

    #[test]
    fn test_precondition_errors_are_user_errors() {
        assert!(AuthError::UseAdminLogin.is_user_error());
        assert!(AuthError::UnauthorizedAdminLogin.is_user_error());
        assert!(AuthError::AdminSignupForbidden.is_user_error());
        assert_eq!(
            AuthError::WeakPassword { min: 8 }.user_message(),
            "Password must be at least 8 characters"
        );
    }
}

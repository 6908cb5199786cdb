//! Session and auth event types.

use chrono::{DateTime, Duration, Utc};
use secrecy::SecretString;

use super::Principal;

/// A provider-issued session.
///
/// Replaced wholesale on every auth event; never patched in place.
#[derive(Debug, Clone)]
pub struct Session {
    /// Bearer token for API calls.
    pub access_token: SecretString,
    /// Token used to obtain a new access token.
    pub refresh_token: SecretString,
    /// When the access token stops being accepted.
    pub expires_at: DateTime<Utc>,
    /// The identity this session belongs to.
    pub principal: Principal,
}

impl Session {
    /// Returns `true` if the access token expires within `margin` of `now`.
    #[must_use]
    pub fn expires_within(&self, margin: Duration, now: DateTime<Utc>) -> bool {
        self.expires_at <= now + margin
    }
}

/// Kind of auth state change reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEventKind {
    /// A session was issued by a sign-in.
    SignedIn,
    /// The session ended.
    SignedOut,
    /// The principal's profile or metadata changed.
    UserUpdated,
    /// The access token was renewed.
    TokenRefreshed,
}

impl std::fmt::Display for AuthEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SignedIn => write!(f, "SIGNED_IN"),
            Self::SignedOut => write!(f, "SIGNED_OUT"),
            Self::UserUpdated => write!(f, "USER_UPDATED"),
            Self::TokenRefreshed => write!(f, "TOKEN_REFRESHED"),
        }
    }
}

/// An auth state change broadcast to subscribers.
#[derive(Debug, Clone)]
pub struct AuthEvent {
    /// What happened.
    pub kind: AuthEventKind,
    /// The session after the change, if any.
    pub session: Option<Session>,
}

impl AuthEvent {
    /// A `SIGNED_IN` event.
    #[must_use]
    pub fn signed_in(session: Session) -> Self {
        Self {
            kind: AuthEventKind::SignedIn,
            session: Some(session),
        }
    }

    /// A `SIGNED_OUT` event.
    #[must_use]
    pub const fn signed_out() -> Self {
        Self {
            kind: AuthEventKind::SignedOut,
            session: None,
        }
    }

    /// A `USER_UPDATED` event.
    #[must_use]
    pub fn user_updated(session: Session) -> Self {
        Self {
            kind: AuthEventKind::UserUpdated,
            session: Some(session),
        }
    }

    /// A `TOKEN_REFRESHED` event.
    #[must_use]
    pub fn token_refreshed(session: Session) -> Self {
        Self {
            kind: AuthEventKind::TokenRefreshed,
            session: Some(session),
        }
    }
}

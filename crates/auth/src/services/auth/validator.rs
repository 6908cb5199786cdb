//! Session validation.
//!
//! A fetched session is only trusted if the validation marker vouches for it.
//! Without the marker the session is forced through a refresh; anything short
//! of a fresh session ends signed out.

use crate::markers::Markers;
use crate::models::Session;
use crate::provider::AuthProvider;

/// Result of validating the initially fetched session.
#[derive(Debug, Clone)]
pub enum Validation {
    /// Marker present, session accepted as fetched.
    Trusted(Session),
    /// Marker absent, refresh succeeded and the marker is now set.
    Refreshed(Session),
    /// Marker absent and the refresh failed or returned nothing.
    Expired,
    /// No session was fetched.
    Absent,
}

impl Validation {
    /// The session to store, if any.
    #[must_use]
    pub fn into_session(self) -> Option<Session> {
        match self {
            Self::Trusted(session) | Self::Refreshed(session) => Some(session),
            Self::Expired | Self::Absent => None,
        }
    }
}

/// Cross-check `fetched` against the validation marker.
///
/// Clears the marker on every outcome that does not yield a session.
pub async fn validate_session<P: AuthProvider>(
    provider: &P,
    markers: &Markers,
    fetched: Option<Session>,
) -> Validation {
    let Some(session) = fetched else {
        markers.clear_validated();
        return Validation::Absent;
    };

    if markers.is_validated() {
        return Validation::Trusted(session);
    }

    tracing::info!(
        principal = %session.principal.id,
        "Session found without validation marker, forcing refresh"
    );
    match provider.refresh_session().await {
        Ok(Some(fresh)) => {
            markers.set_validated();
            Validation::Refreshed(fresh)
        }
        Ok(None) => {
            tracing::info!("Refresh returned no session");
            markers.clear_validated();
            Validation::Expired
        }
        Err(e) => {
            tracing::warn!(error = %e, "Session refresh failed");
            markers.clear_validated();
            Validation::Expired
        }
    }
}

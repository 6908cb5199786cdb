//! Newtype IDs for type-safe entity references.
//!
//! The hosted auth backend issues UUIDs for principals; profile records are
//! keyed by the same value.

use core::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Error returned when a principal ID is not a valid UUID.
#[derive(thiserror::Error, Debug, Clone)]
#[error("invalid principal id: {0}")]
pub struct PrincipalIdError(String);

/// Identifier of an authenticated principal.
///
/// ```
/// use propdesk_core::PrincipalId;
///
/// let id: PrincipalId = "6f1c2a0e-8d1b-4b5e-9a57-0f3c5d2e7b11".parse().unwrap();
/// assert_eq!(id.to_string(), "6f1c2a0e-8d1b-4b5e-9a57-0f3c5d2e7b11");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(Uuid);

impl PrincipalId {
    /// Wrap an existing UUID.
    #[must_use]
    pub const fn new(id: Uuid) -> Self {
        Self(id)
    }

    /// Generate a fresh random ID.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for PrincipalId {
    type Err = PrincipalIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| PrincipalIdError(s.to_owned()))
    }
}

impl From<Uuid> for PrincipalId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

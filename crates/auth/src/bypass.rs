//! Development bypass of the route guards.
//!
//! Lets a developer browse the protected areas without a backend account.
//! The flag is honored only when the runtime environment is explicitly
//! `development` or `local`; it never creates a session, never sets the
//! validation marker and is invisible to sign-in.

use thiserror::Error;

use propdesk_core::Role;

use crate::markers::{BypassFlag, Markers};
use crate::storage::StoreError;

/// Runtime environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Production,
    Staging,
    Development,
    Local,
}

impl Environment {
    /// Whether development conveniences may be honored.
    #[must_use]
    pub const fn allows_bypass(self) -> bool {
        matches!(self, Self::Development | Self::Local)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Production => write!(f, "production"),
            Self::Staging => write!(f, "staging"),
            Self::Development => write!(f, "development"),
            Self::Local => write!(f, "local"),
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "staging" => Ok(Self::Staging),
            "development" | "dev" => Ok(Self::Development),
            "local" => Ok(Self::Local),
            other => Err(format!("unknown environment: {other}")),
        }
    }
}

/// Errors from managing the bypass flag.
#[derive(Debug, Error)]
pub enum BypassError {
    #[error("development bypass is not available in {0}")]
    NotAllowed(Environment),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

/// Reads and writes the bypass flag for a given environment.
#[derive(Clone)]
pub struct DevBypass {
    environment: Environment,
    markers: Markers,
}

impl DevBypass {
    #[must_use]
    pub const fn new(environment: Environment, markers: Markers) -> Self {
        Self {
            environment,
            markers,
        }
    }

    #[must_use]
    pub const fn environment(&self) -> Environment {
        self.environment
    }

    /// The role the route guard should assume, if the bypass is in effect.
    ///
    /// A stored flag outside development is ignored with a warning.
    #[must_use]
    pub fn active_role(&self) -> Option<Role> {
        let flag = self.markers.bypass();
        if !flag.bypass_enabled {
            return None;
        }
        if !self.environment.allows_bypass() {
            tracing::warn!(
                environment = %self.environment,
                "Ignoring development bypass flag outside development"
            );
            return None;
        }
        tracing::debug!(role = %flag.role, "Development bypass in effect");
        Some(flag.role)
    }

    /// Switch the bypass on for `role`.
    ///
    /// # Errors
    ///
    /// Returns `BypassError::NotAllowed` outside development, or a storage error.
    pub fn enable(&self, role: Role) -> Result<(), BypassError> {
        if !self.environment.allows_bypass() {
            return Err(BypassError::NotAllowed(self.environment));
        }
        self.markers.set_bypass(BypassFlag::enabled(role))?;
        tracing::info!(%role, "Development bypass enabled");
        Ok(())
    }

    /// Switch the bypass off. Allowed in every environment.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the flag cannot be removed.
    pub fn disable(&self) -> Result<(), BypassError> {
        self.markers.clear_bypass()?;
        tracing::info!("Development bypass disabled");
        Ok(())
    }

    /// The stored flag, regardless of environment.
    #[must_use]
    pub fn stored(&self) -> BypassFlag {
        self.markers.bypass()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::storage::MemoryStore;

    fn bypass(environment: Environment) -> (Markers, DevBypass) {
        let markers = Markers::new(Arc::new(MemoryStore::new()));
        (markers.clone(), DevBypass::new(environment, markers))
    }

    #[test]
    fn test_parse_environment() {
        assert_eq!("prod".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!("Development".parse::<Environment>().unwrap(), Environment::Development);
        assert_eq!("local".parse::<Environment>().unwrap(), Environment::Local);
        assert!("qa".parse::<Environment>().is_err());
    }

    #[test]
    fn test_enabled_in_development() {
        let (_, bypass) = bypass(Environment::Development);
        assert_eq!(bypass.active_role(), None);
        bypass.enable(Role::Admin).unwrap();
        assert_eq!(bypass.active_role(), Some(Role::Admin));
        bypass.disable().unwrap();
        assert_eq!(bypass.active_role(), None);
    }

    #[test]
    fn test_cannot_enable_in_production() {
        let (markers, bypass) = bypass(Environment::Production);
        assert!(matches!(
            bypass.enable(Role::User),
            Err(BypassError::NotAllowed(Environment::Production))
        ));
        assert!(!markers.bypass().bypass_enabled);
    }

    #[test]
    fn test_stored_flag_is_inert_outside_development() {
        for environment in [Environment::Production, Environment::Staging] {
            let (markers, bypass) = bypass(environment);
            markers.set_bypass(BypassFlag::enabled(Role::Admin)).unwrap();
            assert_eq!(bypass.active_role(), None);
            assert!(bypass.stored().bypass_enabled);
        }
    }
}

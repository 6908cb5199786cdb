//! Typed local markers.
//!
//! Two small records live next to the provider's cached session in the
//! [`KeyValueStore`]: the validation marker and the development bypass flag.
//! They are serialized as JSON under fixed keys and only ever read back
//! through [`Markers`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use propdesk_core::Role;

use crate::storage::{KeyValueStore, StoreError};

/// Storage keys.
pub mod keys {
    /// Key for the session validation marker.
    pub const SESSION_VALIDATED: &str = "propdesk.session-validated";

    /// Key for the development bypass flag.
    pub const DEV_BYPASS: &str = "propdesk.dev-bypass";

    /// Key for the provider's cached session.
    pub const AUTH_SESSION: &str = "propdesk.auth-session";
}

/// Set when the current session has been confirmed valid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationMarker {
    /// Whether the co-located session was confirmed.
    pub validated: bool,
}

/// Local development bypass of the route guards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BypassFlag {
    /// Whether the bypass is switched on.
    pub bypass_enabled: bool,
    /// Role the route guards should assume.
    pub role: Role,
}

impl BypassFlag {
    /// An enabled flag for `role`.
    #[must_use]
    pub const fn enabled(role: Role) -> Self {
        Self {
            bypass_enabled: true,
            role,
        }
    }
}

/// Typed access to the local markers.
///
/// Read failures are treated as "marker absent": an unreadable validation
/// marker forces a refresh, an unreadable bypass flag leaves the bypass off.
#[derive(Clone)]
pub struct Markers {
    store: Arc<dyn KeyValueStore>,
}

impl Markers {
    /// Wrap a key/value store.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Whether the validation marker is present.
    #[must_use]
    pub fn is_validated(&self) -> bool {
        self.read::<ValidationMarker>(keys::SESSION_VALIDATED)
            .is_some_and(|marker| marker.validated)
    }

    /// Record that the current session is confirmed valid.
    pub fn set_validated(&self) {
        if let Err(err) = self.write(keys::SESSION_VALIDATED, &ValidationMarker { validated: true })
        {
            tracing::warn!(error = %err, "Failed to persist session validation marker");
        }
    }

    /// Remove the validation marker.
    pub fn clear_validated(&self) {
        if let Err(err) = self.store.remove(keys::SESSION_VALIDATED) {
            tracing::error!(error = %err, "Failed to clear session validation marker");
        }
    }

    /// The stored bypass flag, or a disabled one.
    #[must_use]
    pub fn bypass(&self) -> BypassFlag {
        self.read(keys::DEV_BYPASS).unwrap_or_default()
    }

    /// Store a bypass flag.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the flag cannot be written.
    pub fn set_bypass(&self, flag: BypassFlag) -> Result<(), StoreError> {
        self.write(keys::DEV_BYPASS, &flag)
    }

    /// Remove the bypass flag.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the flag cannot be removed.
    pub fn clear_bypass(&self) -> Result<(), StoreError> {
        self.store.remove(keys::DEV_BYPASS)
    }

    fn read<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.store.get(key) {
            Ok(raw) => raw?,
            Err(err) => {
                tracing::warn!(key, error = %err, "Failed to read local marker");
                return None;
            }
        };
        serde_json::from_str(&raw)
            .inspect_err(|err| tracing::warn!(key, error = %err, "Ignoring malformed local marker"))
            .ok()
    }

    fn write<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let raw = serde_json::to_string(value)?;
        self.store.set(key, &raw)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn markers() -> (Arc<MemoryStore>, Markers) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), Markers::new(store))
    }

    #[test]
    fn test_validation_marker_lifecycle() {
        let (_, markers) = markers();
        assert!(!markers.is_validated());
        markers.set_validated();
        assert!(markers.is_validated());
        markers.clear_validated();
        assert!(!markers.is_validated());
    }

    #[test]
    fn test_malformed_marker_reads_as_absent() {
        let (store, markers) = markers();
        store.set(keys::SESSION_VALIDATED, "true").unwrap();
        assert!(!markers.is_validated());
        store.set(keys::DEV_BYPASS, "{oops").unwrap();
        assert_eq!(markers.bypass(), BypassFlag::default());
    }

    #[test]
    fn test_bypass_flag_wire_shape() {
        let (store, markers) = markers();
        markers.set_bypass(BypassFlag::enabled(Role::Admin)).unwrap();
        assert_eq!(
            store.get(keys::DEV_BYPASS).unwrap().as_deref(),
            Some(r#"{"bypassEnabled":true,"role":"admin"}"#)
        );
        assert_eq!(markers.bypass(), BypassFlag::enabled(Role::Admin));

        markers.clear_bypass().unwrap();
        assert!(!markers.bypass().bypass_enabled);
    }
}

//! Session store shared across the application.
//!
//! The store is the single source of truth for "who is signed in". Readers
//! take snapshots or subscribe for changes; only the auth listener and the
//! sign-in/sign-up/sign-out operations in this crate may write to it.

use std::sync::Arc;

use tokio::sync::watch;

use crate::models::{Principal, Session};

/// Coarse authentication status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    /// The initial session fetch has not completed.
    Initializing,
    /// No trusted session.
    SignedOut,
    /// A trusted session is stored.
    SignedIn,
}

/// Point-in-time view of the store.
#[derive(Debug, Clone)]
pub struct AuthSnapshot {
    /// Coarse status.
    pub status: AuthStatus,
    /// The trusted session, present iff `status` is `SignedIn`.
    pub session: Option<Session>,
}

impl AuthSnapshot {
    /// The signed-in principal, if any.
    #[must_use]
    pub fn principal(&self) -> Option<&Principal> {
        self.session.as_ref().map(|s| &s.principal)
    }

    /// Returns `true` when a trusted session is stored.
    #[must_use]
    pub const fn is_signed_in(&self) -> bool {
        matches!(self.status, AuthStatus::SignedIn)
    }
}

/// Holds the current session.
///
/// Cheaply cloneable; all clones observe the same state.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<watch::Sender<AuthSnapshot>>,
}

impl SessionStore {
    /// Create a store in the `Initializing` state.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = watch::channel(AuthSnapshot {
            status: AuthStatus::Initializing,
            session: None,
        });
        Self {
            inner: Arc::new(sender),
        }
    }

    /// The current state.
    #[must_use]
    pub fn snapshot(&self) -> AuthSnapshot {
        self.inner.borrow().clone()
    }

    /// The current status.
    #[must_use]
    pub fn status(&self) -> AuthStatus {
        self.inner.borrow().status
    }

    /// Subscribe to state changes.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<AuthSnapshot> {
        self.inner.subscribe()
    }

    /// Replace the stored session. Returns the previous state.
    pub(crate) fn replace(&self, session: Session) -> AuthSnapshot {
        tracing::debug!(principal = %session.principal.id, "Session stored");
        self.inner.send_replace(AuthSnapshot {
            status: AuthStatus::SignedIn,
            session: Some(session),
        })
    }

    /// Replace the stored session only if one is already stored.
    ///
    /// Returns `true` if the store changed.
    pub(crate) fn update(&self, session: Session) -> bool {
        self.inner.send_if_modified(|snapshot| {
            if !snapshot.is_signed_in() {
                return false;
            }
            snapshot.session = Some(session);
            true
        })
    }

    /// Drop the stored session. Returns the previous state.
    pub(crate) fn clear(&self) -> AuthSnapshot {
        self.inner.send_replace(AuthSnapshot {
            status: AuthStatus::SignedOut,
            session: None,
        })
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

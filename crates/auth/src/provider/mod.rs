//! Authentication provider abstraction.
//!
//! PropDesk does not implement authentication itself; a hosted backend
//! issues and refreshes sessions. [`AuthProvider`] is the seam: the
//! production build talks to Supabase ([`SupabaseAuth`]), tests use an
//! in-memory fake.
//!
//! Providers broadcast [`AuthEvent`]s. Consumers receive them through a
//! [`Subscription`], which must exist before the initial session fetch:
//! [`AuthProvider::get_session`] takes the subscription as an argument so an
//! event fired during the fetch cannot be missed.

mod error;
pub mod supabase;

pub use error::ProviderError;
pub use supabase::SupabaseAuth;

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use secrecy::SecretString;
use tokio::sync::broadcast;

use propdesk_core::{Email, EmailError};

use crate::models::{AuthEvent, Principal, Session, UserMetadata};

/// Buffered events per subscriber before the oldest are dropped.
const EVENT_BUFFER: usize = 32;

/// Email and password for a credential operation.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Account email.
    pub email: Email,
    /// Account password.
    pub password: SecretString,
}

impl Credentials {
    /// Build credentials, validating the email.
    ///
    /// # Errors
    ///
    /// Returns `EmailError` if the email is malformed.
    pub fn new(email: &str, password: &str) -> Result<Self, EmailError> {
        Ok(Self {
            email: Email::parse(email)?,
            password: SecretString::from(password.to_owned()),
        })
    }
}

/// Result of a successful sign-up.
#[derive(Debug, Clone)]
pub struct SignUpOutcome {
    /// The created principal.
    pub principal: Principal,
    /// A session, when the backend confirms accounts without email verification.
    pub session: Option<Session>,
}

/// A hosted authentication backend.
///
/// All methods except [`subscribe`](Self::subscribe) are network calls and
/// may complete in any order relative to events already broadcast.
pub trait AuthProvider: Send + Sync + 'static {
    /// Register for auth events.
    fn subscribe(&self) -> Subscription;

    /// Fetch the locally cached session, refreshing it if it has expired.
    ///
    /// Requires a live subscription so that events fired while the fetch is
    /// in flight are delivered.
    fn get_session(
        &self,
        listener: &Subscription,
    ) -> impl Future<Output = Result<Option<Session>, ProviderError>> + Send;

    /// Sign in with email and password. Broadcasts `SIGNED_IN` on success.
    fn sign_in_with_password(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<Session, ProviderError>> + Send;

    /// Create an account. Broadcasts `SIGNED_IN` if a session is issued.
    fn sign_up(
        &self,
        credentials: &Credentials,
        redirect_to: &str,
    ) -> impl Future<Output = Result<SignUpOutcome, ProviderError>> + Send;

    /// End the current session. Broadcasts `SIGNED_OUT`.
    fn sign_out(&self) -> impl Future<Output = Result<(), ProviderError>> + Send;

    /// Force a token refresh. Broadcasts `TOKEN_REFRESHED` on success.
    ///
    /// Returns `Ok(None)` when there is no session to refresh.
    fn refresh_session(
        &self,
    ) -> impl Future<Output = Result<Option<Session>, ProviderError>> + Send;

    /// Merge `metadata` into the principal's metadata. Broadcasts `USER_UPDATED`.
    fn update_user_metadata(
        &self,
        metadata: &UserMetadata,
    ) -> impl Future<Output = Result<Principal, ProviderError>> + Send;
}

/// Fan-out of auth events to subscribers.
#[derive(Debug, Clone)]
pub struct EventHub {
    sender: broadcast::Sender<AuthEvent>,
}

impl EventHub {
    /// Create a hub with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_BUFFER);
        Self { sender }
    }

    /// Register a new subscriber.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        Subscription::new(self.sender.subscribe())
    }

    /// Broadcast an event to every live subscriber.
    pub fn emit(&self, event: AuthEvent) {
        let kind = event.kind;
        match self.sender.send(event) {
            Ok(receivers) => tracing::debug!(%kind, receivers, "Auth event broadcast"),
            Err(_) => tracing::debug!(%kind, "Auth event dropped, no subscribers"),
        }
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

/// A live registration for auth events.
///
/// Dropping the subscription (or calling [`unsubscribe`](Self::unsubscribe))
/// cancels it.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    receiver: broadcast::Receiver<AuthEvent>,
}

impl Subscription {
    fn new(receiver: broadcast::Receiver<AuthEvent>) -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(subscription = id, "Auth listener registered");
        Self { id, receiver }
    }

    /// Identifier for log correlation.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the next event. Returns `None` once the provider is gone.
    pub async fn next(&mut self) -> Option<AuthEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(subscription = self.id, skipped, "Auth listener lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Take the next already-delivered event without waiting.
    pub fn try_next(&mut self) -> Option<AuthEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(subscription = self.id, skipped, "Auth listener lagged");
                }
                Err(
                    broadcast::error::TryRecvError::Empty | broadcast::error::TryRecvError::Closed,
                ) => return None,
            }
        }
    }

    /// Cancel the subscription.
    pub fn unsubscribe(self) {
        tracing::debug!(subscription = self.id, "Auth listener unsubscribed");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::AuthEventKind;
    use crate::testing::session_for;

    #[test]
    fn test_credentials_validate_email() {
        assert!(Credentials::new("tenant@example.com", "hunter22").is_ok());
        assert!(Credentials::new("not-an-email", "hunter22").is_err());
    }

    #[tokio::test]
    async fn test_subscription_receives_events_in_order() {
        let hub = EventHub::new();
        let mut sub = hub.subscribe();

        hub.emit(AuthEvent::signed_in(session_for("tenant@example.com")));
        hub.emit(AuthEvent::signed_out());

        assert_eq!(sub.next().await.unwrap().kind, AuthEventKind::SignedIn);
        assert_eq!(sub.try_next().unwrap().kind, AuthEventKind::SignedOut);
        assert!(sub.try_next().is_none());
    }

    #[test]
    fn test_events_before_subscribe_are_not_delivered() {
        let hub = EventHub::new();
        hub.emit(AuthEvent::signed_out());

        let mut sub = hub.subscribe();
        assert!(sub.try_next().is_none());
    }

    #[test]
    fn test_lagged_subscriber_keeps_newest_events() {
        let hub = EventHub::new();
        let mut sub = hub.subscribe();
        for _ in 0..(EVENT_BUFFER + 5) {
            hub.emit(AuthEvent::signed_out());
        }
        hub.emit(AuthEvent::token_refreshed(session_for("tenant@example.com")));

        let mut last = None;
        while let Some(event) = sub.try_next() {
            last = Some(event.kind);
        }
        assert_eq!(last, Some(AuthEventKind::TokenRefreshed));
    }

    #[tokio::test]
    async fn test_next_returns_none_when_hub_dropped() {
        let hub = EventHub::new();
        let mut sub = hub.subscribe();
        drop(hub);
        assert!(sub.next().await.is_none());
    }
}

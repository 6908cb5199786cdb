//! Integration tests for PropDesk session and role resolution.
//!
//! Every test drives a real [`AuthService`] wired to the in-memory fakes from
//! `propdesk_auth::testing`, so no backend is needed.
//!
//! ```bash
//! cargo test -p propdesk-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `session_lifecycle` - Listener registration, initial fetch and validation
//! - `sign_in` / `sign_up` / `sign_out` - Explicit session transitions
//! - `navigation` - Route guard, storm guard and development bypass
//! - `roles` - Allow-list resolution and metadata sync
//! - `profiles` - Profile loads with retry

#![allow(clippy::missing_panics_doc)]

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use propdesk_auth::bypass::Environment;
use propdesk_auth::provider::Subscription;
use propdesk_auth::retry::RetryPolicy;
use propdesk_auth::roles::AdminAllowList;
use propdesk_auth::storage::MemoryStore;
use propdesk_auth::testing::{FakeMailer, FakeProfiles, FakeProvider, RecordingNavigator, RecordingNotifier};
use propdesk_auth::{AuthDeps, AuthService, AuthSettings, AuthStatus};

/// The only allow-listed administrator.
pub const ADMIN_EMAIL: &str = "admin@example.com";

/// A regular user.
pub const USER_EMAIL: &str = "tenant@example.com";

/// Password used by every seeded account.
pub const PASSWORD: &str = "correct-horse";

/// Storm guard window used by the harness.
pub const GRACE: Duration = Duration::from_millis(1000);

pub type TestService = AuthService<FakeProvider, FakeProfiles, FakeMailer>;

/// A service wired to fakes, plus handles on every fake.
pub struct Harness {
    pub service: Arc<TestService>,
    pub provider: Arc<FakeProvider>,
    pub profiles: FakeProfiles,
    pub mailer: FakeMailer,
    pub navigator: Arc<RecordingNavigator>,
    pub notifier: Arc<RecordingNotifier>,
    pub storage: Arc<MemoryStore>,
    /// Registered at construction, before any session fetch.
    pub listener: Subscription,
}

impl Harness {
    /// A production harness on the landing page.
    #[must_use]
    pub fn new() -> Self {
        Self::build(Environment::Production, "/", Arc::new(FakeProvider::new()), Arc::new(MemoryStore::new()))
    }

    /// A harness in `environment` whose page is `location`.
    #[must_use]
    pub fn at(environment: Environment, location: &str) -> Self {
        Self::build(environment, location, Arc::new(FakeProvider::new()), Arc::new(MemoryStore::new()))
    }

    /// A second application instance sharing this one's backend and local
    /// storage, as after a page reload.
    #[must_use]
    pub fn reload(&self, location: &str) -> Self {
        Self::build(
            self.service.bypass().environment(),
            location,
            Arc::clone(&self.provider),
            Arc::clone(&self.storage),
        )
    }

    fn build(
        environment: Environment,
        location: &str,
        provider: Arc<FakeProvider>,
        storage: Arc<MemoryStore>,
    ) -> Self {
        let profiles = FakeProfiles::new();
        let mailer = FakeMailer::new();
        let navigator = Arc::new(RecordingNavigator::at(location));
        let notifier = Arc::new(RecordingNotifier::new());

        provider.observe_storage(storage.clone());

        let deps = AuthDeps {
            navigator: navigator.clone(),
            notifier: notifier.clone(),
            storage: storage.clone(),
        };
        let settings = AuthSettings {
            allow_list: AdminAllowList::new([ADMIN_EMAIL]),
            environment,
            site_url: Url::parse("https://app.propdesk.test").expect("valid site url"),
            navigation_grace: GRACE,
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(10),
            },
        };

        let service = Arc::new(AuthService::new(
            Arc::clone(&provider),
            profiles.clone(),
            mailer.clone(),
            deps,
            settings,
        ));
        let listener = service.subscribe();

        Self {
            service,
            provider,
            profiles,
            mailer,
            navigator,
            notifier,
            storage,
            listener,
        }
    }

    /// Run the initial fetch and validation.
    pub async fn initialize(&self) -> AuthStatus {
        self.service
            .initialize(&self.listener)
            .await
            .expect("initialization succeeds")
    }

    /// Deliver pending auth events to the service.
    pub fn drain(&mut self) -> usize {
        self.service.drain_events(&mut self.listener)
    }

    /// Wait for background tasks, then deliver the events they produced.
    pub async fn settle(&mut self) {
        self.service.finish_background_tasks().await;
        self.drain();
    }

    /// The navigator's current location.
    #[must_use]
    pub fn location(&self) -> String {
        self.service.navigation().current_route().location().to_owned()
    }

    /// Signed out locally: no stored session and no validation marker.
    #[must_use]
    pub fn is_fully_signed_out(&self) -> bool {
        self.service.store().status() == AuthStatus::SignedOut
            && self.service.session().is_none()
            && !self.service.markers().is_validated()
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

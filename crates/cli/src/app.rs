//! Composition root.

use std::sync::Arc;

use propdesk_auth::notify::TracingNotifier;
use propdesk_auth::provider::{SupabaseAuth, Subscription};
use propdesk_auth::services::mailer::HttpVerificationMailer;
use propdesk_auth::services::profiles::SupabaseProfiles;
use propdesk_auth::storage::{FileStore, KeyValueStore};
use propdesk_auth::{AuthConfig, AuthDeps, AuthError, AuthService, AuthSettings, AuthStatus};

use crate::error::CliError;
use crate::navigator::TerminalNavigator;

pub type Service = AuthService<SupabaseAuth, SupabaseProfiles, HttpVerificationMailer>;

/// Open the local state file under the configured directory.
pub fn open_storage(config: &AuthConfig) -> Result<Arc<dyn KeyValueStore>, CliError> {
    let store = FileStore::open(config.state_dir.join("state.json"))?;
    tracing::debug!(path = %store.path().display(), "Local state opened");
    Ok(Arc::new(store))
}

/// A started auth service with its listener.
pub struct App {
    pub service: Arc<Service>,
    listener: Subscription,
}

impl App {
    /// Assemble the service, register the listener and load the session.
    pub async fn start(config: &AuthConfig) -> Result<Self, CliError> {
        let app = Self::assemble(config)?;
        app.initialize().await?;
        Ok(app)
    }

    /// Assemble the service and register the listener without loading the
    /// session.
    pub fn assemble(config: &AuthConfig) -> Result<Self, CliError> {
        let storage = open_storage(config)?;
        let provider = Arc::new(SupabaseAuth::new(&config.supabase, Arc::clone(&storage))?);
        let profiles = SupabaseProfiles::new(&config.supabase)?;
        let mailer = HttpVerificationMailer::new(config.verification_url.clone(), &config.supabase)?;

        let deps = AuthDeps {
            navigator: Arc::new(TerminalNavigator::new(Arc::clone(&storage))),
            notifier: Arc::new(TracingNotifier),
            storage,
        };
        let service = Arc::new(AuthService::new(
            provider,
            profiles,
            mailer,
            deps,
            AuthSettings::from_config(config),
        ));

        let listener = service.subscribe();
        Ok(Self { service, listener })
    }

    /// Fetch and validate the stored session.
    pub async fn initialize(&self) -> Result<AuthStatus, AuthError> {
        self.service.initialize(&self.listener).await
    }

    /// Apply pending auth events and wait for background work.
    pub async fn finish(mut self) {
        self.service.drain_events(&mut self.listener);
        self.service.finish_background_tasks().await;
        self.service.drain_events(&mut self.listener);
        self.listener.unsubscribe();
    }
}

//! Authentication service.
//!
//! [`AuthService`] owns the session lifecycle: the auth event listener, the
//! initial session fetch and validation, sign-in, sign-up and sign-out. It is
//! the only writer of the [`SessionStore`].
//!
//! Start-up is a two-step sequence whose order the types enforce:
//!
//! ```rust,ignore
//! let listener = service.subscribe();
//! service.initialize(&listener).await?;
//! let task = service.spawn_listener(listener);
//! ```

mod error;
mod validator;

pub use error::AuthError;
pub use validator::{Validation, validate_session};

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use url::Url;

use propdesk_core::{AppRoute, Role};

use crate::bypass::{DevBypass, Environment};
use crate::config::AuthConfig;
use crate::error::{add_breadcrumb, capture_auth_error, clear_sentry_user, set_sentry_user};
use crate::markers::Markers;
use crate::models::{AuthEvent, AuthEventKind, Principal, Session};
use crate::navigation::{Access, Navigation, Navigator, Redirect};
use crate::notify::{Notice, Notifier};
use crate::provider::{AuthProvider, Credentials, ProviderError, Subscription};
use crate::retry::{RetryPolicy, retry};
use crate::roles::{AdminAllowList, RoleResolver};
use crate::services::mailer::{VerificationMailer, VerificationRequest};
use crate::services::profiles::{Profile, ProfileStore};
use crate::state::{AuthStatus, SessionStore};
use crate::storage::KeyValueStore;

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Tunables of the auth service.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    /// Administrator allow-list.
    pub allow_list: AdminAllowList,
    /// Runtime environment, gates the development bypass.
    pub environment: Environment,
    /// Public site URL, target of email links.
    pub site_url: Url,
    /// Storm guard window.
    pub navigation_grace: Duration,
    /// Retry policy for profile loads.
    pub retry: RetryPolicy,
}

impl AuthSettings {
    /// Settings taken from the loaded configuration.
    #[must_use]
    pub fn from_config(config: &AuthConfig) -> Self {
        Self {
            allow_list: config.admin_emails.clone(),
            environment: config.environment,
            site_url: config.site_url.clone(),
            navigation_grace: config.navigation_grace,
            retry: RetryPolicy::default(),
        }
    }
}

/// Collaborators the service drives but does not own.
#[derive(Clone)]
pub struct AuthDeps {
    pub navigator: Arc<dyn Navigator>,
    pub notifier: Arc<dyn Notifier>,
    pub storage: Arc<dyn KeyValueStore>,
}

/// Non-fatal problem during sign-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignUpWarning {
    /// The account exists but its profile row was not written.
    ProfileSetupFailed,
    /// The verification email could not be sent.
    VerificationEmailFailed,
}

/// Outcome of a successful sign-up.
#[derive(Debug, Clone)]
pub struct SignUpReport {
    /// The created principal.
    pub principal: Principal,
    /// Partial failures.
    pub warnings: Vec<SignUpWarning>,
    /// Whether the backend issued a session straight away.
    pub signed_in: bool,
}

/// Session and role resolution.
pub struct AuthService<P, S, M> {
    provider: Arc<P>,
    profiles: S,
    mailer: M,
    store: SessionStore,
    markers: Markers,
    roles: RoleResolver,
    navigation: Navigation,
    bypass: DevBypass,
    notifier: Arc<dyn Notifier>,
    site_url: Url,
    retry: RetryPolicy,
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl<P, S, M> AuthService<P, S, M>
where
    P: AuthProvider,
    S: ProfileStore,
    M: VerificationMailer,
{
    /// Create a new authentication service.
    #[must_use]
    pub fn new(provider: Arc<P>, profiles: S, mailer: M, deps: AuthDeps, settings: AuthSettings) -> Self {
        let markers = Markers::new(deps.storage);
        Self {
            provider,
            profiles,
            mailer,
            store: SessionStore::new(),
            bypass: DevBypass::new(settings.environment, markers.clone()),
            markers,
            roles: RoleResolver::new(settings.allow_list),
            navigation: Navigation::new(deps.navigator, settings.navigation_grace),
            notifier: deps.notifier,
            site_url: settings.site_url,
            retry: settings.retry,
            background: Mutex::new(Vec::new()),
        }
    }

    /// Read-only view of the current session.
    #[must_use]
    pub const fn store(&self) -> &SessionStore {
        &self.store
    }

    #[must_use]
    pub const fn roles(&self) -> &RoleResolver {
        &self.roles
    }

    #[must_use]
    pub const fn navigation(&self) -> &Navigation {
        &self.navigation
    }

    #[must_use]
    pub const fn markers(&self) -> &Markers {
        &self.markers
    }

    #[must_use]
    pub const fn bypass(&self) -> &DevBypass {
        &self.bypass
    }

    #[must_use]
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// The stored session, if any.
    #[must_use]
    pub fn session(&self) -> Option<Session> {
        self.store.snapshot().session
    }

    /// The signed-in principal's role, if any.
    #[must_use]
    pub fn role(&self) -> Option<Role> {
        self.store
            .snapshot()
            .principal()
            .map(|principal| self.roles.resolve(principal))
    }

    /// Access derived from the stored session. Ignores the bypass.
    #[must_use]
    pub fn access(&self) -> Access {
        Access::from_role(self.role())
    }

    fn guard_access(&self) -> Access {
        self.bypass
            .active_role()
            .map_or_else(|| self.access(), Access::from)
    }

    fn redirect_url(&self) -> String {
        self.site_url
            .join(AppRoute::LOGIN.trim_start_matches('/'))
            .map_or_else(|_| self.site_url.to_string(), |url| url.to_string())
    }

    fn reset(&self) -> bool {
        self.markers.clear_validated();
        self.store.clear().is_signed_in()
    }

    fn notify(&self, notice: Notice) {
        self.notifier.notify(notice);
    }

    fn fail(&self, title: &str, err: &AuthError) {
        capture_auth_error(err);
        self.notify(Notice::error(title, err.user_message()));
    }

    // =========================================================================
    // Listener
    // =========================================================================

    /// Register for auth events. Must precede [`initialize`](Self::initialize).
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        self.provider.subscribe()
    }

    /// Fetch, validate and store the initial session.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Setup` if the session could not be fetched; local
    /// state is cleared first.
    pub async fn initialize(&self, listener: &Subscription) -> Result<AuthStatus, AuthError> {
        let fetched = match self.provider.get_session(listener).await {
            Ok(fetched) => fetched,
            Err(e) => {
                tracing::error!(error = %e, "Initial session fetch failed");
                self.reset();
                let err = AuthError::Setup(e);
                self.fail("Authentication error", &err);
                return Err(err);
            }
        };

        let status = match validate_session(self.provider.as_ref(), &self.markers, fetched).await {
            Validation::Trusted(session) | Validation::Refreshed(session) => {
                set_sentry_user(&session.principal);
                self.store.replace(session);
                AuthStatus::SignedIn
            }
            Validation::Expired => {
                self.reset();
                self.notify(Notice::warning("Session expired", "Please sign in again"));
                AuthStatus::SignedOut
            }
            Validation::Absent => {
                self.reset();
                AuthStatus::SignedOut
            }
        };

        tracing::info!(?status, "Auth initialized");
        self.navigation.reconcile_from_event(self.access());
        Ok(status)
    }

    /// Apply one auth event to local state.
    pub fn handle_event(&self, event: AuthEvent) {
        let AuthEvent { kind, session } = event;
        tracing::debug!(%kind, "Auth event received");

        match (kind, session) {
            (AuthEventKind::SignedIn, Some(session)) => {
                let role = self.roles.resolve(&session.principal);
                self.record_sign_in(session, role);
                self.navigation.reconcile_from_event(Access::from(role));
            }
            (AuthEventKind::SignedOut, _) => {
                if self.reset() {
                    add_breadcrumb("auth", "Signed out", None);
                    self.notify(Notice::info("Signed out", "You have been signed out"));
                }
                self.navigation.to_landing();
            }
            (AuthEventKind::UserUpdated | AuthEventKind::TokenRefreshed, Some(session)) => {
                if !self.store.update(session) {
                    tracing::debug!(%kind, "Ignoring session update while signed out");
                }
            }
            (kind, None) => tracing::warn!(%kind, "Auth event without session ignored"),
        }
    }

    /// Handle every event already delivered to `listener`. Returns the count.
    pub fn drain_events(&self, listener: &mut Subscription) -> usize {
        let mut handled = 0;
        while let Some(event) = listener.try_next() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// Handle events until the provider goes away.
    pub async fn run_listener(&self, mut listener: Subscription) {
        while let Some(event) = listener.next().await {
            self.handle_event(event);
        }
        tracing::debug!(subscription = listener.id(), "Auth listener stopped");
    }

    /// Run the listener on the runtime.
    pub fn spawn_listener(self: &Arc<Self>, listener: Subscription) -> JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move { service.run_listener(listener).await })
    }

    // =========================================================================
    // Sign-in
    // =========================================================================

    /// Sign in with email and password through the user or admin form.
    ///
    /// # Errors
    ///
    /// Returns `UseAdminLogin`/`UnauthorizedAdminLogin` before any network
    /// call when the form does not match the allow-list, and again after the
    /// provider answers if the signed-in account's role does not match the
    /// form (the session is revoked first). `InvalidCredentials`
    /// with the provider's message, or `Network` if the provider is down.
    pub async fn sign_in(
        &self,
        email: &str,
        password: &str,
        admin_login: bool,
    ) -> Result<Role, AuthError> {
        let _hold = self.navigation.hold();
        let result = self.sign_in_inner(email, password, admin_login).await;
        if let Err(e) = &result {
            tracing::info!(error = %e, admin_login, "Sign-in failed");
            self.fail("Sign in failed", e);
        }
        result
    }

    async fn sign_in_inner(
        &self,
        email: &str,
        password: &str,
        admin_login: bool,
    ) -> Result<Role, AuthError> {
        check_channel(self.roles.is_admin_email(Some(email)), admin_login)?;

        let credentials = Credentials::new(email, password)?;
        let session = match self.provider.sign_in_with_password(&credentials).await {
            Ok(session) => session,
            Err(ProviderError::InvalidCredentials(message)) if admin_login => {
                self.provision_admin(&credentials, message).await?
            }
            Err(e) => return Err(e.into()),
        };

        // The backend matches emails case-insensitively, so the account it
        // returns can differ from the one typed.
        let role = self.roles.resolve(&session.principal);
        if let Err(e) = check_channel(role == Role::Admin, admin_login) {
            tracing::warn!(
                principal = %session.principal.id,
                %role,
                admin_login,
                "Signed-in account does not match the login form, revoking"
            );
            if let Err(revoke) = self.provider.sign_out().await {
                tracing::warn!(error = %revoke, "Provider sign-out failed after form mismatch");
            }
            self.reset();
            return Err(e);
        }

        Ok(self.complete_sign_in(session))
    }

    /// Create the account of an allow-listed administrator on first login.
    async fn provision_admin(
        &self,
        credentials: &Credentials,
        rejection: String,
    ) -> Result<Session, AuthError> {
        tracing::info!("Provisioning administrator account on first login");
        match self.provider.sign_up(credentials, &self.redirect_url()).await {
            Ok(outcome) => {
                tracing::info!(principal = %outcome.principal.id, "Administrator account created");
                if let Some(session) = outcome.session {
                    return Ok(session);
                }
            }
            Err(ProviderError::UserAlreadyExists) => {
                return Err(AuthError::InvalidCredentials(rejection));
            }
            Err(e) => return Err(e.into()),
        }
        Ok(self.provider.sign_in_with_password(credentials).await?)
    }

    fn complete_sign_in(&self, session: Session) -> Role {
        let role = self.roles.resolve(&session.principal);
        if let Some(task) = self
            .roles
            .spawn_admin_flag_sync(Arc::clone(&self.provider), &session.principal)
        {
            self.background
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(task);
        }

        let principal_id = session.principal.id;
        self.record_sign_in(session, role);

        let target = self.navigation.after_sign_in(role);
        tracing::info!(principal = %principal_id, %role, %target, "Signed in");
        role
    }

    /// Store a signed-in session. Announces it only when the principal changed.
    fn record_sign_in(&self, session: Session, role: Role) {
        self.markers.set_validated();
        set_sentry_user(&session.principal);

        let principal_id = session.principal.id;
        let previous = self.store.replace(session);
        if previous.principal().map(|p| p.id) != Some(principal_id) {
            let role_name = role.to_string();
            add_breadcrumb("auth", "Signed in", Some(&[("role", role_name.as_str())]));
            self.notify(Notice::success("Signed in", "Welcome back"));
        }
    }

    /// Wait for best-effort background work started by sign-in.
    pub async fn finish_background_tasks(&self) {
        let tasks: Vec<_> = std::mem::take(
            &mut *self
                .background
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Background auth task failed");
            }
        }
    }

    // =========================================================================
    // Sign-up
    // =========================================================================

    /// Create a regular user account.
    ///
    /// # Errors
    ///
    /// Returns `AdminSignupForbidden` for allow-listed emails before any other
    /// check, `InvalidEmail`/`WeakPassword` for bad input, or a provider error.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpReport, AuthError> {
        let _hold = self.navigation.hold();
        let result = self.sign_up_inner(email, password).await;
        if let Err(e) = &result {
            tracing::info!(error = %e, "Sign-up failed");
            self.fail("Sign up failed", e);
        }
        result
    }

    async fn sign_up_inner(&self, email: &str, password: &str) -> Result<SignUpReport, AuthError> {
        if self.roles.is_admin_email(Some(email)) {
            return Err(AuthError::AdminSignupForbidden);
        }
        let credentials = Credentials::new(email, password)?;
        validate_password(password)?;

        let redirect_to = self.redirect_url();
        let outcome = self.provider.sign_up(&credentials, &redirect_to).await?;
        let principal = outcome.principal;
        tracing::info!(principal = %principal.id, "Account created");

        let mut warnings = Vec::new();
        let profile = Profile::new(
            principal.id,
            principal.email.clone().or_else(|| Some(credentials.email.clone())),
        );
        if let Err(e) = self
            .profiles
            .insert_profile(&profile, outcome.session.as_ref())
            .await
        {
            tracing::warn!(principal = %principal.id, error = %e, "Profile setup failed");
            warnings.push(SignUpWarning::ProfileSetupFailed);
            self.notify(Notice::warning(
                "Profile setup incomplete",
                "Account created, but profile setup failed",
            ));
        }

        let request = VerificationRequest::signup(credentials.email.as_str(), &redirect_to);
        if let Err(e) = self.mailer.send_verification(&request).await {
            tracing::warn!(principal = %principal.id, error = %e, "Verification email failed");
            warnings.push(SignUpWarning::VerificationEmailFailed);
            self.notify(Notice::warning(
                "Verification email not sent",
                "Account created, but the verification email could not be sent",
            ));
        }

        let signed_in = match outcome.session {
            Some(session) => {
                self.complete_sign_in(session);
                true
            }
            None => {
                self.notify(Notice::success(
                    "Account created",
                    "Check your email to confirm your account",
                ));
                false
            }
        };

        Ok(SignUpReport {
            principal,
            warnings,
            signed_in,
        })
    }

    // =========================================================================
    // Sign-out
    // =========================================================================

    /// Sign out. Always ends signed out on the landing page; provider errors
    /// are logged only.
    pub async fn sign_out(&self) {
        let _hold = self.navigation.hold();
        self.markers.clear_validated();

        if let Err(e) = self.provider.sign_out().await {
            tracing::warn!(error = %e, "Provider sign-out failed, clearing local session anyway");
        }

        let was_signed_in = self.reset();
        clear_sentry_user();
        self.navigation.to_landing();
        if was_signed_in {
            add_breadcrumb("auth", "Signed out", None);
            self.notify(Notice::info("Signed out", "You have been signed out"));
        }
    }

    // =========================================================================
    // Routing & data
    // =========================================================================

    /// Move to `route` and apply the route guard. The development bypass is
    /// consulted here and nowhere else.
    pub fn visit(&self, route: &AppRoute) -> Option<Redirect> {
        self.navigation.visit(route, self.guard_access())
    }

    /// Load the signed-in principal's profile, retrying transient failures.
    ///
    /// # Errors
    ///
    /// Returns `NotSignedIn` without a session, or the last profile error.
    pub async fn load_profile(&self) -> Result<Option<Profile>, AuthError> {
        let session = self.session().ok_or(AuthError::NotSignedIn)?;
        let id = session.principal.id;
        let session = &session;
        let profile = retry(self.retry, |_| self.profiles.fetch_profile(id, session)).await?;
        Ok(profile)
    }
}

/// Validate password length.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword {
            min: MIN_PASSWORD_LENGTH,
        });
    }
    Ok(())
}

/// Allow-listed accounts use the admin form, everyone else the user form.
const fn check_channel(admin_account: bool, admin_login: bool) -> Result<(), AuthError> {
    match (admin_account, admin_login) {
        (true, false) => Err(AuthError::UseAdminLogin),
        (false, true) => Err(AuthError::UnauthorizedAdminLogin),
        _ => Ok(()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_password() {
        assert!(validate_password("12345678").is_ok());
        assert!(matches!(
            validate_password("1234567"),
            Err(AuthError::WeakPassword { min: 8 })
        ));
        assert!(validate_password("pässwörd").is_ok());
    }

    #[test]
    fn test_check_channel() {
        assert!(check_channel(true, true).is_ok());
        assert!(check_channel(false, false).is_ok());
        assert!(matches!(
            check_channel(true, false),
            Err(AuthError::UseAdminLogin)
        ));
        assert!(matches!(
            check_channel(false, true),
            Err(AuthError::UnauthorizedAdminLogin)
        ));
    }
}

//! In-memory fakes of every external collaborator.
//!
//! Available to this crate's tests and, through the `test-support` feature,
//! to downstream test crates.

#![allow(clippy::missing_panics_doc)]

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{Duration, Utc};
use secrecy::{ExposeSecret, SecretString};

use propdesk_core::{AppRoute, Email, PrincipalId};

use crate::markers::keys;
use crate::models::{AuthEvent, Principal, Session, UserMetadata};
use crate::navigation::Navigator;
use crate::notify::{Notice, NoticeLevel, Notifier};
use crate::provider::{
    AuthProvider, Credentials, EventHub, ProviderError, SignUpOutcome, Subscription,
};
use crate::services::mailer::{MailerError, VerificationMailer, VerificationRequest};
use crate::services::profiles::{Profile, ProfileError, ProfileStore};
use crate::storage::KeyValueStore;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A principal with a fresh random id and no metadata.
#[must_use]
pub fn principal_for(email: &str) -> Principal {
    Principal {
        id: PrincipalId::random(),
        email: Email::parse(email).ok(),
        metadata: UserMetadata::default(),
    }
}

/// A one-hour session for `principal`.
#[must_use]
pub fn session_with(principal: Principal) -> Session {
    let token = PrincipalId::random();
    Session {
        access_token: SecretString::from(format!("access-{token}")),
        refresh_token: SecretString::from(format!("refresh-{token}")),
        expires_at: Utc::now() + Duration::hours(1),
        principal,
    }
}

/// A one-hour session for a new principal with `email`.
#[must_use]
pub fn session_for(email: &str) -> Session {
    session_with(principal_for(email))
}

// =============================================================================
// Provider
// =============================================================================

/// A provider call, as recorded by [`FakeProvider`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    GetSession,
    SignIn(String),
    SignUp(String),
    SignOut,
    Refresh,
    UpdateMetadata(Option<bool>),
}

struct Account {
    password: String,
    principal: Principal,
}

#[derive(Default)]
struct FakeProviderState {
    accounts: BTreeMap<String, Account>,
    session: Option<Session>,
    calls: Vec<ProviderCall>,
    network_down: bool,
    fail_get_session: bool,
    fail_refresh: bool,
    refresh_empty: bool,
    fail_sign_out: bool,
    fail_metadata: bool,
    auto_confirm: bool,
    fold_email_case: bool,
    observed: Option<Arc<dyn KeyValueStore>>,
    marker_at_sign_out: Vec<bool>,
}

/// Scriptable in-memory auth backend.
#[derive(Default)]
pub struct FakeProvider {
    events: EventHub,
    state: Mutex<FakeProviderState>,
}

impl FakeProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FakeProviderState> {
        lock(&self.state)
    }

    /// Create an account.
    pub fn register(&self, email: &str, password: &str) -> Principal {
        let principal = principal_for(email);
        self.state().accounts.insert(
            email.to_owned(),
            Account {
                password: password.to_owned(),
                principal: principal.clone(),
            },
        );
        principal
    }

    /// Set the `is_admin` metadata of an existing account.
    pub fn set_admin_metadata(&self, email: &str, is_admin: Option<bool>) {
        if let Some(account) = self.state().accounts.get_mut(email) {
            account.principal.metadata.is_admin = is_admin;
        }
    }

    /// Make `email` the cached session, creating the account if needed.
    pub fn seed_session(&self, email: &str) -> Session {
        let mut state = self.state();
        let principal = state
            .accounts
            .entry(email.to_owned())
            .or_insert_with(|| Account {
                password: String::new(),
                principal: principal_for(email),
            })
            .principal
            .clone();
        let session = session_with(principal);
        state.session = Some(session.clone());
        session
    }

    /// Broadcast an arbitrary event.
    pub fn emit(&self, event: AuthEvent) {
        self.events.emit(event);
    }

    /// The cached session.
    #[must_use]
    pub fn current_session(&self) -> Option<Session> {
        self.state().session.clone()
    }

    /// The principal of a registered account.
    #[must_use]
    pub fn account(&self, email: &str) -> Option<Principal> {
        self.state().accounts.get(email).map(|a| a.principal.clone())
    }

    /// Every call made so far.
    #[must_use]
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.state().calls.clone()
    }

    #[must_use]
    pub fn refresh_calls(&self) -> usize {
        self.count(|call| matches!(call, ProviderCall::Refresh))
    }

    #[must_use]
    pub fn sign_in_calls(&self) -> usize {
        self.count(|call| matches!(call, ProviderCall::SignIn(_)))
    }

    /// The `is_admin` value of every metadata update, in order.
    #[must_use]
    pub fn metadata_updates(&self) -> Vec<Option<bool>> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                ProviderCall::UpdateMetadata(flag) => Some(*flag),
                _ => None,
            })
            .collect()
    }

    fn count(&self, pred: impl Fn(&ProviderCall) -> bool) -> usize {
        self.state().calls.iter().filter(|call| pred(call)).count()
    }

    pub fn set_network_down(&self, down: bool) {
        self.state().network_down = down;
    }

    pub fn fail_get_session(&self, fail: bool) {
        self.state().fail_get_session = fail;
    }

    pub fn fail_refresh(&self, fail: bool) {
        self.state().fail_refresh = fail;
    }

    /// Make refresh report that there is no session to refresh.
    pub fn refresh_returns_nothing(&self, empty: bool) {
        self.state().refresh_empty = empty;
    }

    pub fn fail_sign_out(&self, fail: bool) {
        self.state().fail_sign_out = fail;
    }

    pub fn fail_metadata_updates(&self, fail: bool) {
        self.state().fail_metadata = fail;
    }

    /// Whether sign-up issues a session immediately.
    pub fn set_auto_confirm(&self, auto_confirm: bool) {
        self.state().auto_confirm = auto_confirm;
    }

    /// Match sign-in emails case-insensitively, like GoTrue. The session
    /// carries the account's stored email, not the one typed.
    pub fn fold_email_case(&self, fold: bool) {
        self.state().fold_email_case = fold;
    }

    /// Watch the application's local storage from inside provider calls.
    pub fn observe_storage(&self, storage: Arc<dyn KeyValueStore>) {
        self.state().observed = Some(storage);
    }

    /// For each sign-out call, whether the validation marker was still
    /// stored in the observed storage.
    #[must_use]
    pub fn marker_present_at_sign_out(&self) -> Vec<bool> {
        self.state().marker_at_sign_out.clone()
    }

    fn offline() -> ProviderError {
        ProviderError::Network("connection refused".to_string())
    }
}

impl AuthProvider for FakeProvider {
    fn subscribe(&self) -> Subscription {
        self.events.subscribe()
    }

    async fn get_session(&self, _listener: &Subscription) -> Result<Option<Session>, ProviderError> {
        let mut state = self.state();
        state.calls.push(ProviderCall::GetSession);
        if state.network_down || state.fail_get_session {
            return Err(Self::offline());
        }
        Ok(state.session.clone())
    }

    async fn sign_in_with_password(
        &self,
        credentials: &Credentials,
    ) -> Result<Session, ProviderError> {
        let session = {
            let mut state = self.state();
            let email = credentials.email.as_str().to_owned();
            state.calls.push(ProviderCall::SignIn(email.clone()));
            if state.network_down {
                return Err(Self::offline());
            }
            let key = if state.fold_email_case {
                email.to_lowercase()
            } else {
                email
            };
            let principal = state
                .accounts
                .get(&key)
                .filter(|account| account.password == credentials.password.expose_secret())
                .map(|account| account.principal.clone())
                .ok_or_else(|| {
                    ProviderError::InvalidCredentials("Invalid login credentials".to_string())
                })?;
            let session = session_with(principal);
            state.session = Some(session.clone());
            session
        };
        self.events.emit(AuthEvent::signed_in(session.clone()));
        Ok(session)
    }

    async fn sign_up(
        &self,
        credentials: &Credentials,
        _redirect_to: &str,
    ) -> Result<SignUpOutcome, ProviderError> {
        let outcome = {
            let mut state = self.state();
            let email = credentials.email.as_str().to_owned();
            state.calls.push(ProviderCall::SignUp(email.clone()));
            if state.network_down {
                return Err(Self::offline());
            }
            if state.accounts.contains_key(&email) {
                return Err(ProviderError::UserAlreadyExists);
            }
            let principal = principal_for(&email);
            state.accounts.insert(
                email,
                Account {
                    password: credentials.password.expose_secret().to_owned(),
                    principal: principal.clone(),
                },
            );
            let session = state.auto_confirm.then(|| session_with(principal.clone()));
            state.session.clone_from(&session);
            SignUpOutcome { principal, session }
        };
        if let Some(session) = &outcome.session {
            self.events.emit(AuthEvent::signed_in(session.clone()));
        }
        Ok(outcome)
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        let fail = {
            let mut state = self.state();
            state.calls.push(ProviderCall::SignOut);
            let marker_present = state.observed.as_ref().is_some_and(|storage| {
                matches!(storage.get(keys::SESSION_VALIDATED), Ok(Some(_)))
            });
            state.marker_at_sign_out.push(marker_present);
            state.session = None;
            state.network_down || state.fail_sign_out
        };
        self.events.emit(AuthEvent::signed_out());
        if fail {
            return Err(Self::offline());
        }
        Ok(())
    }

    async fn refresh_session(&self) -> Result<Option<Session>, ProviderError> {
        let fresh = {
            let mut state = self.state();
            state.calls.push(ProviderCall::Refresh);
            if state.network_down {
                return Err(Self::offline());
            }
            if state.fail_refresh {
                state.session = None;
                return Err(ProviderError::Api {
                    status: 400,
                    message: "Invalid Refresh Token: Refresh Token Not Found".to_string(),
                });
            }
            if state.refresh_empty {
                state.session = None;
            }
            let Some(current) = state.session.as_ref() else {
                return Ok(None);
            };
            let fresh = session_with(current.principal.clone());
            state.session = Some(fresh.clone());
            fresh
        };
        self.events.emit(AuthEvent::token_refreshed(fresh.clone()));
        Ok(Some(fresh))
    }

    async fn update_user_metadata(
        &self,
        metadata: &UserMetadata,
    ) -> Result<Principal, ProviderError> {
        let session = {
            let mut state = self.state();
            state
                .calls
                .push(ProviderCall::UpdateMetadata(metadata.is_admin));
            if state.network_down || state.fail_metadata {
                return Err(Self::offline());
            }
            let mut session = state.session.clone().ok_or(ProviderError::NoSession)?;
            if metadata.is_admin.is_some() {
                session.principal.metadata.is_admin = metadata.is_admin;
            }
            for (key, value) in &metadata.extra {
                session
                    .principal
                    .metadata
                    .extra
                    .insert(key.clone(), value.clone());
            }
            if let Some(email) = session.principal.email_str().map(str::to_owned)
                && let Some(account) = state.accounts.get_mut(&email)
            {
                account.principal = session.principal.clone();
            }
            state.session = Some(session.clone());
            session
        };
        let principal = session.principal.clone();
        self.events.emit(AuthEvent::user_updated(session));
        Ok(principal)
    }
}

// =============================================================================
// Profiles & mailer
// =============================================================================

#[derive(Default)]
struct FakeProfilesState {
    rows: HashMap<PrincipalId, Profile>,
    fail_insert: bool,
    failing_fetches: u32,
    fetch_calls: u32,
}

/// In-memory profile table. Clones share state.
#[derive(Clone, Default)]
pub struct FakeProfiles {
    state: Arc<Mutex<FakeProfilesState>>,
}

impl FakeProfiles {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_inserts(&self, fail: bool) {
        lock(&self.state).fail_insert = fail;
    }

    /// Make the next `count` fetches fail.
    pub fn fail_next_fetches(&self, count: u32) {
        lock(&self.state).failing_fetches = count;
    }

    #[must_use]
    pub fn fetch_calls(&self) -> u32 {
        lock(&self.state).fetch_calls
    }

    #[must_use]
    pub fn get(&self, id: PrincipalId) -> Option<Profile> {
        lock(&self.state).rows.get(&id).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.state).rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ProfileStore for FakeProfiles {
    async fn insert_profile(
        &self,
        profile: &Profile,
        _session: Option<&Session>,
    ) -> Result<(), ProfileError> {
        let mut state = lock(&self.state);
        if state.fail_insert {
            return Err(ProfileError::Api {
                status: 403,
                message: "new row violates row-level security policy".to_string(),
            });
        }
        state.rows.insert(profile.id, profile.clone());
        Ok(())
    }

    async fn fetch_profile(
        &self,
        id: PrincipalId,
        _session: &Session,
    ) -> Result<Option<Profile>, ProfileError> {
        let mut state = lock(&self.state);
        state.fetch_calls += 1;
        if state.failing_fetches > 0 {
            state.failing_fetches -= 1;
            return Err(ProfileError::Network("timed out".to_string()));
        }
        Ok(state.rows.get(&id).cloned())
    }
}

#[derive(Default)]
struct FakeMailerState {
    sent: Vec<VerificationRequest>,
    fail: bool,
}

/// Records verification emails. Clones share state.
#[derive(Clone, Default)]
pub struct FakeMailer {
    state: Arc<Mutex<FakeMailerState>>,
}

impl FakeMailer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, fail: bool) {
        lock(&self.state).fail = fail;
    }

    /// Requests that were delivered.
    #[must_use]
    pub fn sent(&self) -> Vec<VerificationRequest> {
        lock(&self.state).sent.clone()
    }
}

impl VerificationMailer for FakeMailer {
    async fn send_verification(&self, request: &VerificationRequest) -> Result<(), MailerError> {
        let mut state = lock(&self.state);
        if state.fail {
            return Err(MailerError::Api {
                status: 500,
                message: "function crashed".to_string(),
            });
        }
        state.sent.push(request.clone());
        Ok(())
    }
}

// =============================================================================
// Navigator & notifier
// =============================================================================

/// Navigator that records every navigation.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    route: Mutex<String>,
    history: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    /// A navigator currently at `location`.
    #[must_use]
    pub fn at(location: &str) -> Self {
        Self {
            route: Mutex::new(location.to_owned()),
            history: Mutex::new(Vec::new()),
        }
    }

    /// Move without recording, as if the page loaded there.
    pub fn set_route(&self, location: &str) {
        *lock(&self.route) = location.to_owned();
    }

    /// Every navigation, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        lock(&self.history).clone()
    }

    /// Forget recorded navigations.
    pub fn clear_history(&self) {
        lock(&self.history).clear();
    }
}

impl Navigator for RecordingNavigator {
    fn current_route(&self) -> AppRoute {
        AppRoute::parse(&lock(&self.route))
    }

    fn navigate(&self, location: &str) {
        *lock(&self.route) = location.to_owned();
        lock(&self.history).push(location.to_owned());
    }
}

/// Notifier that records every notice.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn notices(&self) -> Vec<Notice> {
        lock(&self.notices).clone()
    }

    /// Notices with the given title.
    #[must_use]
    pub fn titled(&self, title: &str) -> Vec<Notice> {
        lock(&self.notices)
            .iter()
            .filter(|notice| notice.title == title)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn count(&self, level: NoticeLevel) -> usize {
        lock(&self.notices)
            .iter()
            .filter(|notice| notice.level == level)
            .count()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        lock(&self.notices).push(notice);
    }
}

//! Supabase GoTrue client.
//!
//! Speaks the GoTrue REST API directly:
//!
//! - `POST /auth/v1/token?grant_type=password` - sign in
//! - `POST /auth/v1/token?grant_type=refresh_token` - refresh
//! - `POST /auth/v1/signup` - create an account
//! - `POST /auth/v1/logout` - revoke the refresh token
//! - `PUT /auth/v1/user` - update user metadata
//!
//! The current session is cached in the [`KeyValueStore`] under
//! [`keys::AUTH_SESSION`] so it survives restarts.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use url::Url;

use propdesk_core::{Email, PrincipalId};

use super::{AuthProvider, Credentials, EventHub, ProviderError, SignUpOutcome, Subscription};
use crate::config::SupabaseConfig;
use crate::markers::keys;
use crate::models::{AuthEvent, Principal, Session, UserMetadata};
use crate::storage::KeyValueStore;

/// Sessions expiring within this window are refreshed before use.
const REFRESH_MARGIN_SECS: i64 = 30;

/// Lifetime assumed when the backend omits both expiry fields.
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Supabase auth client.
#[derive(Clone)]
pub struct SupabaseAuth {
    inner: Arc<SupabaseAuthInner>,
}

struct SupabaseAuthInner {
    client: reqwest::Client,
    base_url: Url,
    storage: Arc<dyn KeyValueStore>,
    events: EventHub,
}

impl SupabaseAuth {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError` if the API key is not a valid header value or
    /// the HTTP client fails to build.
    pub fn new(
        config: &SupabaseConfig,
        storage: Arc<dyn KeyValueStore>,
    ) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "apikey",
            HeaderValue::from_str(config.anon_key())
                .map_err(|e| ProviderError::Parse(format!("Invalid API key format: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            inner: Arc::new(SupabaseAuthInner {
                client,
                base_url: config.url.clone(),
                storage,
                events: EventHub::new(),
            }),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ProviderError> {
        self.inner
            .base_url
            .join(path)
            .map_err(|e| ProviderError::Parse(format!("Invalid endpoint {path}: {e}")))
    }

    fn token_endpoint(&self, grant_type: &str) -> Result<Url, ProviderError> {
        let mut url = self.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", grant_type);
        Ok(url)
    }

    // =========================================================================
    // Session cache
    // =========================================================================

    fn load(&self) -> Result<Option<Session>, ProviderError> {
        let Some(raw) = self.inner.storage.get(keys::AUTH_SESSION)? else {
            return Ok(None);
        };
        match serde_json::from_str::<StoredSession>(&raw) {
            Ok(stored) => Ok(Some(stored.into())),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable cached session");
                self.forget();
                Ok(None)
            }
        }
    }

    fn persist(&self, session: &Session) -> Result<(), ProviderError> {
        let raw = serde_json::to_string(&StoredSession::from(session))
            .map_err(|e| ProviderError::Parse(e.to_string()))?;
        self.inner.storage.set(keys::AUTH_SESSION, &raw)?;
        Ok(())
    }

    fn forget(&self) {
        if let Err(e) = self.inner.storage.remove(keys::AUTH_SESSION) {
            tracing::error!(error = %e, "Failed to remove cached session");
        }
    }

    // =========================================================================
    // Requests
    // =========================================================================

    async fn refresh_with(&self, refresh_token: &SecretString) -> Result<Session, ProviderError> {
        let url = self.token_endpoint("refresh_token")?;
        let response = self
            .inner
            .client
            .post(url)
            .json(&serde_json::json!({ "refresh_token": refresh_token.expose_secret() }))
            .send()
            .await?;
        let session = read_json::<TokenResponse>(response).await?.into_session();
        self.persist(&session)?;
        Ok(session)
    }

    async fn revoke(&self, session: &Session) -> Result<(), ProviderError> {
        let response = self
            .inner
            .client
            .post(self.endpoint("auth/v1/logout")?)
            .bearer_auth(session.access_token.expose_secret())
            .send()
            .await?;
        read_empty(response).await
    }
}

impl AuthProvider for SupabaseAuth {
    fn subscribe(&self) -> Subscription {
        self.inner.events.subscribe()
    }

    async fn get_session(&self, listener: &Subscription) -> Result<Option<Session>, ProviderError> {
        tracing::debug!(subscription = listener.id(), "Loading cached session");
        let Some(session) = self.load()? else {
            return Ok(None);
        };

        if !session.expires_within(Duration::seconds(REFRESH_MARGIN_SECS), Utc::now()) {
            return Ok(Some(session));
        }

        tracing::debug!(principal = %session.principal.id, "Cached session expired, refreshing");
        match self.refresh_with(&session.refresh_token).await {
            Ok(fresh) => {
                self.inner
                    .events
                    .emit(AuthEvent::token_refreshed(fresh.clone()));
                Ok(Some(fresh))
            }
            Err(e) if e.is_rejection() => {
                tracing::info!(error = %e, "Cached session rejected by provider");
                self.forget();
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn sign_in_with_password(
        &self,
        credentials: &Credentials,
    ) -> Result<Session, ProviderError> {
        let url = self.token_endpoint("password")?;
        let response = self
            .inner
            .client
            .post(url)
            .json(&serde_json::json!({
                "email": credentials.email.as_str(),
                "password": credentials.password.expose_secret(),
            }))
            .send()
            .await?;

        let session = read_json::<TokenResponse>(response).await?.into_session();
        self.persist(&session)?;
        self.inner.events.emit(AuthEvent::signed_in(session.clone()));
        Ok(session)
    }

    async fn sign_up(
        &self,
        credentials: &Credentials,
        redirect_to: &str,
    ) -> Result<SignUpOutcome, ProviderError> {
        let mut url = self.endpoint("auth/v1/signup")?;
        url.query_pairs_mut().append_pair("redirect_to", redirect_to);

        let response = self
            .inner
            .client
            .post(url)
            .json(&serde_json::json!({
                "email": credentials.email.as_str(),
                "password": credentials.password.expose_secret(),
            }))
            .send()
            .await?;

        // Auto-confirming projects answer with a session, the rest with the bare user.
        let body = read_json::<serde_json::Value>(response).await?;
        if body.get("access_token").is_some() {
            let session = serde_json::from_value::<TokenResponse>(body)
                .map_err(|e| ProviderError::Parse(e.to_string()))?
                .into_session();
            self.persist(&session)?;
            self.inner.events.emit(AuthEvent::signed_in(session.clone()));
            return Ok(SignUpOutcome {
                principal: session.principal.clone(),
                session: Some(session),
            });
        }

        let user = serde_json::from_value::<UserResponse>(body)
            .map_err(|e| ProviderError::Parse(e.to_string()))?;
        // Existing confirmed accounts come back obfuscated with no identities.
        if user.identities.as_ref().is_some_and(Vec::is_empty) {
            return Err(ProviderError::UserAlreadyExists);
        }
        Ok(SignUpOutcome {
            principal: user.into_principal(),
            session: None,
        })
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        let cached = self.load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Could not read cached session during sign-out");
            None
        });

        let result = match cached {
            Some(session) => self.revoke(&session).await,
            None => Ok(()),
        };

        self.forget();
        self.inner.events.emit(AuthEvent::signed_out());
        result
    }

    async fn refresh_session(&self) -> Result<Option<Session>, ProviderError> {
        let Some(session) = self.load()? else {
            return Ok(None);
        };
        match self.refresh_with(&session.refresh_token).await {
            Ok(fresh) => {
                self.inner
                    .events
                    .emit(AuthEvent::token_refreshed(fresh.clone()));
                Ok(Some(fresh))
            }
            Err(e) => {
                if e.is_rejection() {
                    self.forget();
                }
                Err(e)
            }
        }
    }

    async fn update_user_metadata(
        &self,
        metadata: &UserMetadata,
    ) -> Result<Principal, ProviderError> {
        let mut session = self.load()?.ok_or(ProviderError::NoSession)?;

        let response = self
            .inner
            .client
            .put(self.endpoint("auth/v1/user")?)
            .bearer_auth(session.access_token.expose_secret())
            .json(&serde_json::json!({ "data": metadata }))
            .send()
            .await?;
        let principal = read_json::<UserResponse>(response).await?.into_principal();

        session.principal = principal.clone();
        self.persist(&session)?;
        self.inner.events.emit(AuthEvent::user_updated(session));
        Ok(principal)
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: Option<i64>,
    expires_at: Option<i64>,
    user: UserResponse,
}

impl TokenResponse {
    fn into_session(self) -> Session {
        let expires_at = self
            .expires_at
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .unwrap_or_else(|| {
                Utc::now() + Duration::seconds(self.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS))
            });
        Session {
            access_token: SecretString::from(self.access_token),
            refresh_token: SecretString::from(self.refresh_token),
            expires_at,
            principal: self.user.into_principal(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: PrincipalId,
    email: Option<String>,
    #[serde(default)]
    user_metadata: UserMetadata,
    identities: Option<Vec<serde_json::Value>>,
}

impl UserResponse {
    fn into_principal(self) -> Principal {
        Principal {
            id: self.id,
            // Phone-only identities report an empty string.
            email: self.email.as_deref().and_then(|e| Email::parse(e).ok()),
            metadata: self.user_metadata,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    error_code: Option<String>,
    msg: Option<String>,
    message: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

/// Cached session as written to the key/value store.
#[derive(Serialize, Deserialize)]
struct StoredSession {
    access_token: String,
    refresh_token: String,
    expires_at: DateTime<Utc>,
    user: Principal,
}

impl From<&Session> for StoredSession {
    fn from(session: &Session) -> Self {
        Self {
            access_token: session.access_token.expose_secret().to_owned(),
            refresh_token: session.refresh_token.expose_secret().to_owned(),
            expires_at: session.expires_at,
            user: session.principal.clone(),
        }
    }
}

impl From<StoredSession> for Session {
    fn from(stored: StoredSession) -> Self {
        Self {
            access_token: SecretString::from(stored.access_token),
            refresh_token: SecretString::from(stored.refresh_token),
            expires_at: stored.expires_at,
            principal: stored.user,
        }
    }
}

// =============================================================================
// Response handling
// =============================================================================

async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(format!("Failed to parse response: {e}")));
    }
    Err(parse_error(status.as_u16(), &response.text().await.unwrap_or_default()))
}

async fn read_empty(response: reqwest::Response) -> Result<(), ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    Err(parse_error(status.as_u16(), &response.text().await.unwrap_or_default()))
}

/// Map a GoTrue error response onto [`ProviderError`].
fn parse_error(status: u16, body: &str) -> ProviderError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .msg
        .or(parsed.message)
        .or(parsed.error_description)
        .or_else(|| parsed.error.clone())
        .unwrap_or_else(|| {
            if body.is_empty() {
                "Unknown error".to_string()
            } else {
                body.to_string()
            }
        });

    let code = parsed.error_code.as_deref().or(parsed.error.as_deref());
    match code {
        Some("invalid_credentials") => ProviderError::InvalidCredentials(message),
        Some("invalid_grant") if message.contains("Invalid login credentials") => {
            ProviderError::InvalidCredentials(message)
        }
        Some("user_already_exists" | "email_exists") => ProviderError::UserAlreadyExists,
        _ if message.contains("already registered") => ProviderError::UserAlreadyExists,
        _ => ProviderError::Api { status, message },
    }
}

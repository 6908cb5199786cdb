//! Profile records.
//!
//! Every account has a row in the `profiles` table keyed by the principal id.
//! The row is created right after sign-up and read by the dashboard.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use propdesk_core::{Email, PrincipalId};

use crate::config::SupabaseConfig;
use crate::models::Session;

/// Errors from the profile backend.
#[derive(Debug, Error)]
pub enum ProfileError {
    /// HTTP request failed.
    #[error("network error: {0}")]
    Network(String),

    /// The backend rejected the request.
    #[error("profile API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response.
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for ProfileError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Parse(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// A profile row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: PrincipalId,
    pub email: Option<Email>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Profile {
    /// A new row for a freshly created principal.
    #[must_use]
    pub const fn new(id: PrincipalId, email: Option<Email>) -> Self {
        Self {
            id,
            email,
            full_name: None,
            created_at: None,
        }
    }
}

/// Storage of profile rows.
pub trait ProfileStore: Send + Sync + 'static {
    /// Insert a row. `session` authorizes the write when one exists; without
    /// one the backend's anonymous policy applies.
    fn insert_profile(
        &self,
        profile: &Profile,
        session: Option<&Session>,
    ) -> impl Future<Output = Result<(), ProfileError>> + Send;

    /// Read the row for `id`.
    fn fetch_profile(
        &self,
        id: PrincipalId,
        session: &Session,
    ) -> impl Future<Output = Result<Option<Profile>, ProfileError>> + Send;
}

/// PostgREST-backed profile store.
#[derive(Clone)]
pub struct SupabaseProfiles {
    inner: Arc<SupabaseProfilesInner>,
}

struct SupabaseProfilesInner {
    client: reqwest::Client,
    endpoint: Url,
    anon_key: SecretString,
}

impl SupabaseProfiles {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns `ProfileError` if the client cannot be built.
    pub fn new(config: &SupabaseConfig) -> Result<Self, ProfileError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "apikey",
            HeaderValue::from_str(config.anon_key())
                .map_err(|e| ProfileError::Parse(format!("Invalid API key format: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;
        let endpoint = config
            .url
            .join("rest/v1/profiles")
            .map_err(|e| ProfileError::Parse(e.to_string()))?;

        Ok(Self {
            inner: Arc::new(SupabaseProfilesInner {
                client,
                endpoint,
                anon_key: config.anon_key.clone(),
            }),
        })
    }

    fn bearer<'a>(&'a self, session: Option<&'a Session>) -> &'a str {
        session.map_or_else(
            || self.inner.anon_key.expose_secret(),
            |s| s.access_token.expose_secret(),
        )
    }
}

impl ProfileStore for SupabaseProfiles {
    async fn insert_profile(
        &self,
        profile: &Profile,
        session: Option<&Session>,
    ) -> Result<(), ProfileError> {
        let response = self
            .inner
            .client
            .post(self.inner.endpoint.clone())
            .bearer_auth(self.bearer(session))
            .header("Prefer", "return=minimal")
            .json(profile)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(principal = %profile.id, "Profile created");
            return Ok(());
        }
        Err(ProfileError::Api {
            status: status.as_u16(),
            message: response.text().await.unwrap_or_default(),
        })
    }

    async fn fetch_profile(
        &self,
        id: PrincipalId,
        session: &Session,
    ) -> Result<Option<Profile>, ProfileError> {
        let mut url = self.inner.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("id", &format!("eq.{id}"))
            .append_pair("select", "*");

        let response = self
            .inner
            .client
            .get(url)
            .bearer_auth(self.bearer(Some(session)))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProfileError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let rows: Vec<Profile> = response
            .json()
            .await
            .map_err(|e| ProfileError::Parse(format!("Failed to parse profile: {e}")))?;
        Ok(rows.into_iter().next())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_new_profile_serializes_without_optional_fields() {
        let id: PrincipalId = "6f1c2a0e-8d1b-4b5e-9a57-0f3c5d2e7b11".parse().unwrap();
        let profile = Profile::new(id, Some(Email::parse("tenant@example.com").unwrap()));
        assert_eq!(
            serde_json::to_string(&profile).unwrap(),
            r#"{"id":"6f1c2a0e-8d1b-4b5e-9a57-0f3c5d2e7b11","email":"tenant@example.com"}"#
        );
    }

    #[test]
    fn test_profile_row_parses() {
        let json = r#"[{
            "id": "6f1c2a0e-8d1b-4b5e-9a57-0f3c5d2e7b11",
            "email": "tenant@example.com",
            "full_name": "Ada Lovelace",
            "created_at": "2026-03-01T09:30:00+00:00"
        }]"#;
        let rows: Vec<Profile> = serde_json::from_str(json).unwrap();
        assert_eq!(rows[0].full_name.as_deref(), Some("Ada Lovelace"));
        assert!(rows[0].created_at.is_some());
    }
}

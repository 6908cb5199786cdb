//! Verification email dispatch.
//!
//! The backend's own confirmation email is supplemented by a branded one sent
//! through an edge function. Delivery is best-effort.

use std::future::Future;
use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue};
use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::config::SupabaseConfig;

/// Errors from the verification mailer.
#[derive(Debug, Error)]
pub enum MailerError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("mailer returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("mailer misconfigured: {0}")]
    Config(String),
}

/// Body of a verification email request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRequest {
    pub email: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub redirect_to: String,
}

impl VerificationRequest {
    /// A sign-up verification for `email`.
    #[must_use]
    pub fn signup(email: &str, redirect_to: &str) -> Self {
        Self {
            email: email.to_owned(),
            kind: "signup".to_owned(),
            redirect_to: redirect_to.to_owned(),
        }
    }
}

/// Sends verification emails.
pub trait VerificationMailer: Send + Sync + 'static {
    fn send_verification(
        &self,
        request: &VerificationRequest,
    ) -> impl Future<Output = Result<(), MailerError>> + Send;
}

/// Edge-function backed mailer.
#[derive(Clone)]
pub struct HttpVerificationMailer {
    inner: Arc<HttpVerificationMailerInner>,
}

struct HttpVerificationMailerInner {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpVerificationMailer {
    /// Create a mailer posting to `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns `MailerError` if the client cannot be built.
    pub fn new(endpoint: Url, config: &SupabaseConfig) -> Result<Self, MailerError> {
        let mut headers = HeaderMap::new();
        let key = config.anon_key();
        headers.insert(
            "apikey",
            HeaderValue::from_str(key).map_err(|e| MailerError::Config(e.to_string()))?,
        );
        headers.insert(
            "Authorization",
            HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|e| MailerError::Config(e.to_string()))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            inner: Arc::new(HttpVerificationMailerInner { client, endpoint }),
        })
    }
}

impl VerificationMailer for HttpVerificationMailer {
    async fn send_verification(&self, request: &VerificationRequest) -> Result<(), MailerError> {
        let response = self
            .inner
            .client
            .post(self.inner.endpoint.clone())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(kind = %request.kind, "Verification email sent");
            return Ok(());
        }
        Err(MailerError::Api {
            status: status.as_u16(),
            message: response.text().await.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_shape() {
        let request = VerificationRequest::signup("tenant@example.com", "http://localhost:5173/login");
        assert_eq!(
            serde_json::to_string(&request).unwrap(),
            r#"{"email":"tenant@example.com","type":"signup","redirectTo":"http://localhost:5173/login"}"#
        );
    }
}

//! Auth configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `PROPDESK_SUPABASE_URL` - Base URL of the hosted backend project
//! - `PROPDESK_SUPABASE_ANON_KEY` - Public (anon) API key of the project
//!
//! ## Optional
//! - `PROPDESK_ADMIN_EMAILS` - Comma-separated administrator allow-list
//! - `PROPDESK_ENV` - `production` (default), `staging`, `development`, or `local`
//! - `PROPDESK_SITE_URL` - Public site URL for email links (default: `http://localhost:5173`)
//! - `PROPDESK_VERIFICATION_URL` - Verification email function (default: `<supabase>/functions/v1/send-verification-email`)
//! - `PROPDESK_NAV_GRACE_MS` - Navigation storm guard window in ms (default: 1000)
//! - `PROPDESK_STATE_DIR` - Directory for local markers and the session cache (default: `.propdesk`)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

use crate::bypass::Environment;
use crate::roles::AdminAllowList;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_NAV_GRACE_MS: u64 = 1000;
const MAX_NAV_GRACE_MS: u64 = 10_000;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Auth component configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Hosted backend connection settings
    pub supabase: SupabaseConfig,
    /// Administrator allow-list
    pub admin_emails: AdminAllowList,
    /// Runtime environment (gates the development bypass)
    pub environment: Environment,
    /// Public site URL, used as the target of email links
    pub site_url: Url,
    /// Endpoint of the verification email function
    pub verification_url: Url,
    /// Storm guard window for navigation
    pub navigation_grace: Duration,
    /// Directory holding local state
    pub state_dir: PathBuf,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

/// Hosted backend connection settings.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct SupabaseConfig {
    /// Project base URL, always ending in `/`
    pub url: Url,
    /// Public API key sent with every request
    pub anon_key: SecretString,
}

impl std::fmt::Debug for SupabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseConfig")
            .field("url", &self.url.as_str())
            .field("anon_key", &"[REDACTED]")
            .finish()
    }
}

impl AuthConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid, or
    /// if the API key looks like a placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// See [`from_env`](Self::from_env).
    pub fn from_vars<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let supabase_url = get_url(&var, "PROPDESK_SUPABASE_URL")?;
        let anon_key = get_validated_secret(&var, "PROPDESK_SUPABASE_ANON_KEY")?;
        let supabase = SupabaseConfig {
            url: with_trailing_slash(supabase_url),
            anon_key,
        };

        let admin_emails = var("PROPDESK_ADMIN_EMAILS")
            .map(|raw| AdminAllowList::parse(&raw))
            .unwrap_or_default();

        let environment = get_env_or_default(&var, "PROPDESK_ENV", "production")
            .parse::<Environment>()
            .map_err(|e| ConfigError::InvalidEnvVar("PROPDESK_ENV".to_string(), e))?;

        let site_url = match var("PROPDESK_SITE_URL") {
            Some(_) => get_url(&var, "PROPDESK_SITE_URL")?,
            None => Url::parse("http://localhost:5173").map_err(|e| {
                ConfigError::InvalidEnvVar("PROPDESK_SITE_URL".to_string(), e.to_string())
            })?,
        };

        let verification_url = match var("PROPDESK_VERIFICATION_URL") {
            Some(_) => get_url(&var, "PROPDESK_VERIFICATION_URL")?,
            None => supabase
                .url
                .join("functions/v1/send-verification-email")
                .map_err(|e| {
                    ConfigError::InvalidEnvVar("PROPDESK_SUPABASE_URL".to_string(), e.to_string())
                })?,
        };

        let navigation_grace = match var("PROPDESK_NAV_GRACE_MS") {
            Some(raw) => {
                let ms = raw.parse::<u64>().map_err(|e| {
                    ConfigError::InvalidEnvVar("PROPDESK_NAV_GRACE_MS".to_string(), e.to_string())
                })?;
                Duration::from_millis(validate_grace_ms(ms)?)
            }
            None => Duration::from_millis(DEFAULT_NAV_GRACE_MS),
        };

        let state_dir = PathBuf::from(get_env_or_default(&var, "PROPDESK_STATE_DIR", ".propdesk"));
        let sentry_dsn = var("SENTRY_DSN").filter(|dsn| !dsn.is_empty());

        Ok(Self {
            supabase,
            admin_emails,
            environment,
            site_url,
            verification_url,
            navigation_grace,
            state_dir,
            sentry_dsn,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env<F>(var: &F, key: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    var(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an environment variable with a default value.
fn get_env_or_default<F>(var: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    var(key).unwrap_or_else(|| default.to_string())
}

/// Get a required environment variable as an absolute URL.
fn get_url<F>(var: &F, key: &str) -> Result<Url, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = get_required_env(var, key)?;
    let url = Url::parse(&raw).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be an http(s) URL".to_string(),
        ));
    }
    Ok(url)
}

/// Ensure relative joins append to the base path instead of replacing its last segment.
fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn validate_grace_ms(ms: u64) -> Result<u64, ConfigError> {
    if ms == 0 || ms > MAX_NAV_GRACE_MS {
        return Err(ConfigError::InvalidEnvVar(
            "PROPDESK_NAV_GRACE_MS".to_string(),
            format!("must be between 1 and {MAX_NAV_GRACE_MS}"),
        ));
    }
    Ok(ms)
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Copy the key from the project settings."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret.
fn get_validated_secret<F>(var: &F, key: &str) -> Result<SecretString, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = get_required_env(var, key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

impl SupabaseConfig {
    /// The API key as a header value.
    pub(crate) fn anon_key(&self) -> &str {
        self.anon_key.expose_secret()
    }
}

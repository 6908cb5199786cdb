//! Sentry integration helpers.
//!
//! Auth transitions are recorded as breadcrumbs, the signed-in principal is
//! attached as the Sentry user, and failures the user cannot fix are
//! captured as events.

use crate::models::Principal;
use crate::services::auth::AuthError;

/// Set the Sentry user context from a principal.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(principal: &Principal) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(principal.id.to_string()),
            email: principal.email_str().map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on sign-out to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for an auth transition.
///
/// ```rust,ignore
/// add_breadcrumb("auth", "Signed in", Some(&[("role", "admin")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

/// Report an auth failure to Sentry unless it is an expected user error.
pub fn capture_auth_error(err: &AuthError) {
    if err.is_user_error() {
        return;
    }
    let event_id = sentry::capture_error(err);
    tracing::error!(error = %err, sentry_event_id = %event_id, "Auth operation failed");
}

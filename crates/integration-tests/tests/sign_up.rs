//! Integration tests for account creation.

#![allow(clippy::unwrap_used)]

use propdesk_auth::bypass::Environment;
use propdesk_auth::testing::ProviderCall;
use propdesk_auth::{AuthError, AuthStatus, SignUpWarning};
use propdesk_integration_tests::{ADMIN_EMAIL, Harness, PASSWORD, USER_EMAIL};

async fn on_signup_page() -> Harness {
    let h = Harness::at(Environment::Production, "/signup");
    h.initialize().await;
    h
}

fn sign_up_calls(h: &Harness) -> usize {
    h.provider
        .calls()
        .iter()
        .filter(|call| matches!(call, ProviderCall::SignUp(_)))
        .count()
}

// =============================================================================
// Validation
// =============================================================================

#[tokio::test]
async fn test_admin_email_cannot_sign_up() {
    let h = on_signup_page().await;

    for password in [PASSWORD, "short", ""] {
        let err = h.service.sign_up(ADMIN_EMAIL, password).await.unwrap_err();
        assert!(matches!(err, AuthError::AdminSignupForbidden), "password {password:?}");
    }

    assert_eq!(sign_up_calls(&h), 0);
    assert!(h.provider.account(ADMIN_EMAIL).is_none());
    assert_eq!(h.notifier.titled("Sign up failed").len(), 3);
}

#[tokio::test]
async fn test_invalid_input_is_rejected_locally() {
    let h = on_signup_page().await;

    let email = h.service.sign_up("tenant.example.com", PASSWORD).await.unwrap_err();
    let password = h.service.sign_up(USER_EMAIL, "1234567").await.unwrap_err();

    assert!(matches!(email, AuthError::InvalidEmail(_)));
    assert!(matches!(password, AuthError::WeakPassword { min: 8 }));
    assert_eq!(sign_up_calls(&h), 0);
}

#[tokio::test]
async fn test_existing_account_is_reported() {
    let h = on_signup_page().await;
    h.provider.register(USER_EMAIL, PASSWORD);

    let err = h.service.sign_up(USER_EMAIL, PASSWORD).await.unwrap_err();

    assert!(matches!(err, AuthError::UserAlreadyExists));
    assert!(h.profiles.is_empty());
    assert!(h.mailer.sent().is_empty());
}

// =============================================================================
// Account Creation
// =============================================================================

#[tokio::test]
async fn test_sign_up_creates_profile_and_sends_verification() {
    let h = on_signup_page().await;

    let report = h.service.sign_up(USER_EMAIL, PASSWORD).await.unwrap();

    assert!(report.warnings.is_empty());
    assert!(!report.signed_in);

    let profile = h.profiles.get(report.principal.id).unwrap();
    assert_eq!(profile.email.as_ref().map(|e| e.as_str()), Some(USER_EMAIL));

    let sent = h.mailer.sent();
    assert_eq!(sent.len(), 1);
    let request = sent.first().unwrap();
    assert_eq!(request.email, USER_EMAIL);
    assert_eq!(request.kind, "signup");
    assert_eq!(request.redirect_to, "https://app.propdesk.test/login");

    assert_eq!(h.service.store().status(), AuthStatus::SignedOut);
    assert_eq!(h.notifier.titled("Account created").len(), 1);
    assert_eq!(h.location(), "/signup");
}

#[tokio::test]
async fn test_partial_failures_become_warnings() {
    let h = on_signup_page().await;
    h.profiles.fail_inserts(true);
    h.mailer.fail(true);

    let report = h.service.sign_up(USER_EMAIL, PASSWORD).await.unwrap();

    assert_eq!(
        report.warnings,
        vec![
            SignUpWarning::ProfileSetupFailed,
            SignUpWarning::VerificationEmailFailed
        ]
    );
    assert!(h.provider.account(USER_EMAIL).is_some());
    assert_eq!(h.notifier.titled("Profile setup incomplete").len(), 1);
    assert_eq!(h.notifier.titled("Verification email not sent").len(), 1);
}

#[tokio::test]
async fn test_auto_confirmed_sign_up_signs_in() {
    let mut h = on_signup_page().await;
    h.provider.set_auto_confirm(true);

    let report = h.service.sign_up(USER_EMAIL, PASSWORD).await.unwrap();
    h.settle().await;

    assert!(report.signed_in);
    assert_eq!(h.service.store().status(), AuthStatus::SignedIn);
    assert!(h.service.markers().is_validated());
    assert_eq!(h.location(), "/dashboard");
    assert_eq!(h.notifier.titled("Signed in").len(), 1);
    assert!(h.notifier.titled("Account created").is_empty());
}

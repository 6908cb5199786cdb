//! Integration tests for email/password sign-in through both login forms.

#![allow(clippy::unwrap_used)]

use propdesk_auth::bypass::Environment;
use propdesk_auth::notify::NoticeLevel;
use propdesk_auth::testing::ProviderCall;
use propdesk_auth::{AuthError, AuthStatus};
use propdesk_core::Role;
use propdesk_integration_tests::{ADMIN_EMAIL, Harness, PASSWORD, USER_EMAIL};

async fn on_login_page() -> Harness {
    let h = Harness::at(Environment::Production, "/login");
    h.initialize().await;
    h
}

// =============================================================================
// Channel Enforcement
// =============================================================================

#[tokio::test]
async fn test_admin_email_rejected_on_user_form() {
    let h = on_login_page().await;
    h.provider.register(ADMIN_EMAIL, PASSWORD);

    let err = h.service.sign_in(ADMIN_EMAIL, PASSWORD, false).await.unwrap_err();

    assert!(matches!(err, AuthError::UseAdminLogin));
    assert_eq!(h.provider.sign_in_calls(), 0);
    assert!(h.is_fully_signed_out());
}

#[tokio::test]
async fn test_regular_email_rejected_on_admin_form() {
    let h = on_login_page().await;
    h.provider.register(USER_EMAIL, PASSWORD);

    let err = h.service.sign_in(USER_EMAIL, PASSWORD, true).await.unwrap_err();

    assert!(matches!(err, AuthError::UnauthorizedAdminLogin));
    assert_eq!(h.provider.sign_in_calls(), 0);
    assert!(h.provider.current_session().is_none());
    assert!(h.is_fully_signed_out());
    assert_eq!(h.location(), "/login");
}

#[tokio::test]
async fn test_channel_checks_precede_network() {
    let h = on_login_page().await;
    h.provider.set_network_down(true);

    let admin = h.service.sign_in(ADMIN_EMAIL, "x", false).await.unwrap_err();
    let user = h.service.sign_in(USER_EMAIL, "x", true).await.unwrap_err();

    assert!(matches!(admin, AuthError::UseAdminLogin));
    assert!(matches!(user, AuthError::UnauthorizedAdminLogin));
    assert_eq!(h.provider.calls(), vec![ProviderCall::GetSession]);
}

#[tokio::test]
async fn test_case_variant_admin_email_rejected_on_user_form() {
    let mut h = on_login_page().await;
    h.provider.register(ADMIN_EMAIL, PASSWORD);
    h.provider.fold_email_case(true);

    let err = h
        .service
        .sign_in("Admin@Example.com", PASSWORD, false)
        .await
        .unwrap_err();
    h.drain();

    assert!(matches!(err, AuthError::UseAdminLogin));
    assert_eq!(h.provider.sign_in_calls(), 1);
    assert!(h.provider.current_session().is_none());
    assert!(h.is_fully_signed_out());
    assert_eq!(h.service.role(), None);
    assert_ne!(h.location(), "/admin");
}

// =============================================================================
// Successful Sign-In
// =============================================================================

#[tokio::test]
async fn test_user_sign_in_lands_on_dashboard() {
    let mut h = on_login_page().await;
    h.provider.register(USER_EMAIL, PASSWORD);

    let role = h.service.sign_in(USER_EMAIL, PASSWORD, false).await.unwrap();
    h.settle().await;

    assert_eq!(role, Role::User);
    assert_eq!(h.service.store().status(), AuthStatus::SignedIn);
    assert!(h.service.markers().is_validated());
    assert_eq!(h.location(), "/dashboard");
    assert_eq!(h.navigator.history(), vec!["/dashboard".to_string()]);
}

#[tokio::test]
async fn test_admin_sign_in_lands_on_admin() {
    let mut h = on_login_page().await;
    h.provider.register(ADMIN_EMAIL, PASSWORD);

    let role = h.service.sign_in(ADMIN_EMAIL, PASSWORD, true).await.unwrap();
    h.settle().await;

    assert_eq!(role, Role::Admin);
    assert_eq!(h.service.role(), Some(Role::Admin));
    assert_eq!(h.location(), "/admin");
}

#[tokio::test]
async fn test_sign_in_notifies_once() {
    let mut h = on_login_page().await;
    h.provider.register(USER_EMAIL, PASSWORD);

    h.service.sign_in(USER_EMAIL, PASSWORD, false).await.unwrap();
    h.settle().await;

    assert_eq!(h.notifier.titled("Signed in").len(), 1);
    assert_eq!(h.notifier.count(NoticeLevel::Error), 0);
}

// =============================================================================
// Admin Self-Provisioning
// =============================================================================

#[tokio::test]
async fn test_first_admin_login_provisions_account() {
    let mut h = on_login_page().await;

    let role = h.service.sign_in(ADMIN_EMAIL, PASSWORD, true).await.unwrap();
    h.settle().await;

    assert_eq!(role, Role::Admin);
    assert!(h.provider.account(ADMIN_EMAIL).is_some());
    assert_eq!(
        h.provider
            .calls()
            .into_iter()
            .filter(|call| !matches!(call, ProviderCall::GetSession | ProviderCall::UpdateMetadata(_)))
            .collect::<Vec<_>>(),
        vec![
            ProviderCall::SignIn(ADMIN_EMAIL.to_string()),
            ProviderCall::SignUp(ADMIN_EMAIL.to_string()),
            ProviderCall::SignIn(ADMIN_EMAIL.to_string()),
        ]
    );
    assert_eq!(h.location(), "/admin");
}

#[tokio::test]
async fn test_auto_confirmed_admin_provisioning_signs_in_once() {
    let mut h = on_login_page().await;
    h.provider.set_auto_confirm(true);

    let role = h.service.sign_in(ADMIN_EMAIL, PASSWORD, true).await.unwrap();
    h.settle().await;

    assert_eq!(role, Role::Admin);
    assert_eq!(h.provider.sign_in_calls(), 1);
    assert_eq!(h.notifier.titled("Signed in").len(), 1);
    assert_eq!(h.service.store().status(), AuthStatus::SignedIn);
    assert_eq!(h.location(), "/admin");
}

#[tokio::test]
async fn test_existing_admin_with_wrong_password_is_rejected() {
    let h = on_login_page().await;
    h.provider.register(ADMIN_EMAIL, PASSWORD);

    let err = h
        .service
        .sign_in(ADMIN_EMAIL, "wrong-password", true)
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::InvalidCredentials(ref message) if message == "Invalid login credentials"));
    assert_eq!(h.provider.sign_in_calls(), 1);
    assert!(h.is_fully_signed_out());
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_invalid_credentials_keep_provider_message() {
    let h = on_login_page().await;
    h.provider.register(USER_EMAIL, PASSWORD);

    let err = h
        .service
        .sign_in(USER_EMAIL, "wrong-password", false)
        .await
        .unwrap_err();

    assert_eq!(err.user_message(), "Invalid login credentials");
    assert!(h.is_fully_signed_out());
    let failures = h.notifier.titled("Sign in failed");
    assert_eq!(failures.len(), 1);
    assert_eq!(
        failures.first().map(|notice| notice.message.as_str()),
        Some("Invalid login credentials")
    );
}

#[tokio::test]
async fn test_network_failure_is_reported() {
    let h = on_login_page().await;
    h.provider.register(USER_EMAIL, PASSWORD);
    h.provider.set_network_down(true);

    let err = h.service.sign_in(USER_EMAIL, PASSWORD, false).await.unwrap_err();

    assert!(matches!(err, AuthError::Network(_)));
    assert!(!err.is_user_error());
    assert!(h.is_fully_signed_out());
    assert_eq!(h.location(), "/login");
}

#[tokio::test]
async fn test_malformed_email_is_rejected_locally() {
    let h = on_login_page().await;

    let err = h.service.sign_in("not-an-email", PASSWORD, false).await.unwrap_err();

    assert!(matches!(err, AuthError::InvalidEmail(_)));
    assert_eq!(h.provider.sign_in_calls(), 0);
}

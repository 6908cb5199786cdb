//! Navigation reconciliation.
//!
//! [`reconcile`] is the pure rule table mapping a route and an access level
//! to an optional redirect. [`Navigation`] applies it through a
//! [`Navigator`] and owns the storm guard: a short-lived gate that keeps
//! listener-driven reconciliation from racing the explicit navigation issued
//! by sign-in and sign-out.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use propdesk_core::{AppRoute, Role, RouteKind};

/// Where the application currently is and how to move it.
pub trait Navigator: Send + Sync {
    /// The current location.
    fn current_route(&self) -> AppRoute;

    /// Move to `location` (path plus optional query).
    fn navigate(&self, location: &str);
}

/// What the route guard knows about the visitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// No trusted session.
    Anonymous,
    /// Signed in as a regular user.
    User,
    /// Signed in as an administrator.
    Admin,
}

impl Access {
    /// Access for an optional resolved role.
    #[must_use]
    pub const fn from_role(role: Option<Role>) -> Self {
        match role {
            None => Self::Anonymous,
            Some(Role::User) => Self::User,
            Some(Role::Admin) => Self::Admin,
        }
    }

    /// The signed-in role, if any.
    #[must_use]
    pub const fn role(self) -> Option<Role> {
        match self {
            Self::Anonymous => None,
            Self::User => Some(Role::User),
            Self::Admin => Some(Role::Admin),
        }
    }
}

impl From<Role> for Access {
    fn from(role: Role) -> Self {
        Self::from_role(Some(role))
    }
}

/// A redirect decided by [`reconcile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redirect {
    /// Sign in first, then come back to `return_to`.
    ToLogin {
        /// The location that was requested.
        return_to: String,
    },
    /// Go to a fixed area root.
    To(&'static str),
}

impl Redirect {
    /// The location to navigate to.
    #[must_use]
    pub fn location(&self) -> String {
        match self {
            Self::ToLogin { return_to } => format!(
                "{}?returnTo={}",
                AppRoute::LOGIN,
                urlencoding::encode(return_to)
            ),
            Self::To(path) => (*path).to_owned(),
        }
    }
}

/// Decide whether `route` must be left. First matching rule wins.
#[must_use]
pub fn reconcile(route: &AppRoute, access: Access) -> Option<Redirect> {
    match (access.role(), route.kind()) {
        (None, kind) if kind.is_protected() => Some(Redirect::ToLogin {
            return_to: route.location().to_owned(),
        }),
        (Some(role), RouteKind::AuthPage) => Some(Redirect::To(role.home_route())),
        (Some(Role::User), RouteKind::AdminArea) => Some(Redirect::To(AppRoute::DASHBOARD)),
        (Some(Role::Admin), RouteKind::UserArea) => Some(Redirect::To(AppRoute::ADMIN)),
        _ => None,
    }
}

/// Whether `access` may stay on `route`.
#[must_use]
pub fn permits(route: &AppRoute, access: Access) -> bool {
    reconcile(route, access).is_none()
}

// =============================================================================
// Storm guard
// =============================================================================

#[derive(Debug, Default)]
struct GateState {
    holds: usize,
    until: Option<Instant>,
}

/// Suppresses listener-driven navigation while an explicit transition is in
/// flight and for a grace window afterwards.
#[derive(Debug)]
pub struct NavigationGate {
    grace: Duration,
    state: Mutex<GateState>,
}

impl NavigationGate {
    #[must_use]
    pub fn new(grace: Duration) -> Self {
        Self {
            grace,
            state: Mutex::new(GateState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Arm the gate for the grace window starting now.
    pub fn arm(&self) {
        self.state().until = Some(Instant::now() + self.grace);
    }

    /// Whether listener-driven navigation is currently suppressed.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        let state = self.state();
        state.holds > 0 || state.until.is_some_and(|until| Instant::now() < until)
    }

    /// Keep the gate armed until the returned hold is dropped, then for the
    /// grace window.
    #[must_use]
    pub fn hold(self: &Arc<Self>) -> GateHold {
        self.state().holds += 1;
        GateHold {
            gate: Arc::clone(self),
        }
    }
}

/// Keeps a [`NavigationGate`] armed while alive.
#[derive(Debug)]
pub struct GateHold {
    gate: Arc<NavigationGate>,
}

impl Drop for GateHold {
    fn drop(&mut self) {
        let mut state = self.gate.state();
        state.holds = state.holds.saturating_sub(1);
        state.until = Some(Instant::now() + self.gate.grace);
    }
}

// =============================================================================
// Navigation
// =============================================================================

/// Applies the redirect rules to a [`Navigator`].
pub struct Navigation {
    navigator: Arc<dyn Navigator>,
    gate: Arc<NavigationGate>,
    return_to: Mutex<Option<String>>,
}

impl Navigation {
    #[must_use]
    pub fn new(navigator: Arc<dyn Navigator>, grace: Duration) -> Self {
        Self {
            navigator,
            gate: Arc::new(NavigationGate::new(grace)),
            return_to: Mutex::new(None),
        }
    }

    /// The current location.
    #[must_use]
    pub fn current_route(&self) -> AppRoute {
        self.navigator.current_route()
    }

    /// The storm guard.
    #[must_use]
    pub fn gate(&self) -> &NavigationGate {
        &self.gate
    }

    /// Keep listener-driven navigation suppressed for the lifetime of the hold.
    #[must_use]
    pub fn hold(&self) -> GateHold {
        self.gate.hold()
    }

    /// The remembered post-sign-in destination, if any.
    #[must_use]
    pub fn pending_return(&self) -> Option<String> {
        self.return_slot().clone()
    }

    fn return_slot(&self) -> MutexGuard<'_, Option<String>> {
        self.return_to.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn apply(&self, redirect: &Redirect) {
        if let Redirect::ToLogin { return_to } = redirect {
            *self.return_slot() = Some(return_to.clone());
        }
        let location = redirect.location();
        tracing::debug!(%location, "Redirecting");
        self.navigator.navigate(&location);
    }

    /// Evaluate the guard for a page the visitor moved to. Never suppressed
    /// by the gate.
    pub fn guard(&self, route: &AppRoute, access: Access) -> Option<Redirect> {
        let redirect = reconcile(route, access)?;
        tracing::info!(route = %route, ?access, target = %redirect.location(), "Route guard redirect");
        self.apply(&redirect);
        Some(redirect)
    }

    /// Move to a page at the visitor's request, then evaluate the guard.
    pub fn visit(&self, route: &AppRoute, access: Access) -> Option<Redirect> {
        self.navigator.navigate(route.location());
        self.guard(route, access)
    }

    /// Reconcile the current route after an auth event. Skipped while the
    /// gate is armed.
    pub fn reconcile_from_event(&self, access: Access) -> Option<Redirect> {
        if self.gate.is_armed() {
            tracing::debug!(?access, "Navigation gate armed, skipping reconciliation");
            return None;
        }
        let route = self.navigator.current_route();
        let redirect = reconcile(&route, access)?;
        self.gate.arm();
        self.apply(&redirect);
        Some(redirect)
    }

    /// Navigate after a successful sign-in. Prefers the remembered return
    /// path when `role` may view it. Returns the destination.
    pub fn after_sign_in(&self, role: Role) -> String {
        self.gate.arm();
        let remembered = self.return_slot().take();
        let target = remembered
            .filter(|location| permits(&AppRoute::parse(location), Access::from(role)))
            .unwrap_or_else(|| role.home_route().to_owned());

        if self.navigator.current_route().location() != target {
            self.navigator.navigate(&target);
        }
        target
    }

    /// Navigate to the landing page unless already there. Forgets any
    /// remembered return path.
    pub fn to_landing(&self) {
        self.gate.arm();
        self.return_slot().take();
        if !self.navigator.current_route().is(AppRoute::LANDING) {
            self.navigator.navigate(AppRoute::LANDING);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testing::RecordingNavigator;

    fn route(path: &str) -> AppRoute {
        AppRoute::parse(path)
    }

    #[test]
    fn test_unauthenticated_protected_goes_to_login() {
        let redirect = reconcile(&route("/admin/users"), Access::Anonymous).unwrap();
        assert_eq!(
            redirect,
            Redirect::ToLogin {
                return_to: "/admin/users".to_string()
            }
        );
        assert_eq!(redirect.location(), "/login?returnTo=%2Fadmin%2Fusers");
        assert!(reconcile(&route("/dashboard"), Access::Anonymous).is_some());
    }

    #[test]
    fn test_unauthenticated_public_and_auth_pages_stay() {
        assert_eq!(reconcile(&route("/"), Access::Anonymous), None);
        assert_eq!(reconcile(&route("/login"), Access::Anonymous), None);
        assert_eq!(reconcile(&route("/signup"), Access::Anonymous), None);
        assert_eq!(reconcile(&route("/administrator"), Access::Anonymous), None);
    }

    #[test]
    fn test_authenticated_auth_page_goes_home() {
        assert_eq!(
            reconcile(&route("/login"), Access::Admin),
            Some(Redirect::To("/admin"))
        );
        assert_eq!(
            reconcile(&route("/signup"), Access::User),
            Some(Redirect::To("/dashboard"))
        );
    }

    #[test]
    fn test_role_area_mismatch() {
        assert_eq!(
            reconcile(&route("/admin/users"), Access::User),
            Some(Redirect::To("/dashboard"))
        );
        assert_eq!(
            reconcile(&route("/dashboard/properties"), Access::Admin),
            Some(Redirect::To("/admin"))
        );
    }

    #[test]
    fn test_allowed_pages_never_redirect() {
        assert!(permits(&route("/"), Access::User));
        assert!(permits(&route("/"), Access::Admin));
        assert!(permits(&route("/pricing"), Access::Admin));
        assert!(permits(&route("/dashboard/leases"), Access::User));
        assert!(permits(&route("/admin"), Access::Admin));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gate_grace_window() {
        let gate = Arc::new(NavigationGate::new(Duration::from_millis(1000)));
        assert!(!gate.is_armed());

        gate.arm();
        assert!(gate.is_armed());
        tokio::time::advance(Duration::from_millis(999)).await;
        assert!(gate.is_armed());
        tokio::time::advance(Duration::from_millis(2)).await;
        assert!(!gate.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hold_keeps_gate_armed_until_dropped() {
        let gate = Arc::new(NavigationGate::new(Duration::from_millis(100)));
        let hold = gate.hold();
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(gate.is_armed());

        drop(hold);
        assert!(gate.is_armed());
        tokio::time::advance(Duration::from_millis(101)).await;
        assert!(!gate.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_event_reconciliation_is_suppressed_but_guard_is_not() {
        let navigator = Arc::new(RecordingNavigator::at("/login"));
        let navigation = Navigation::new(navigator.clone(), Duration::from_millis(1000));

        navigation.gate().arm();
        assert!(navigation.reconcile_from_event(Access::User).is_none());
        assert!(navigator.history().is_empty());

        let redirect = navigation.guard(&route("/admin"), Access::User);
        assert_eq!(redirect, Some(Redirect::To("/dashboard")));
        assert_eq!(navigator.history(), vec!["/dashboard".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_event_reconciliation_arms_gate() {
        let navigator = Arc::new(RecordingNavigator::at("/login"));
        let navigation = Navigation::new(navigator.clone(), Duration::from_millis(1000));

        assert!(navigation.reconcile_from_event(Access::Admin).is_some());
        navigator.set_route("/login");
        assert!(navigation.reconcile_from_event(Access::Admin).is_none());
        assert_eq!(navigator.history(), vec!["/admin".to_string()]);
    }

    #[tokio::test]
    async fn test_after_sign_in_uses_permitted_return_path() {
        let navigator = Arc::new(RecordingNavigator::at("/"));
        let navigation = Navigation::new(navigator.clone(), Duration::from_millis(1000));

        navigation.guard(&route("/dashboard/leases?tab=open"), Access::Anonymous);
        assert_eq!(
            navigation.pending_return().as_deref(),
            Some("/dashboard/leases?tab=open")
        );

        let target = navigation.after_sign_in(Role::User);
        assert_eq!(target, "/dashboard/leases?tab=open");
        assert_eq!(navigator.current_route().location(), "/dashboard/leases?tab=open");
        assert!(navigation.pending_return().is_none());
    }

    #[tokio::test]
    async fn test_after_sign_in_ignores_forbidden_return_path() {
        let navigator = Arc::new(RecordingNavigator::at("/"));
        let navigation = Navigation::new(navigator.clone(), Duration::from_millis(1000));

        navigation.guard(&route("/admin/users"), Access::Anonymous);
        assert_eq!(navigation.after_sign_in(Role::User), "/dashboard");
    }

    #[tokio::test]
    async fn test_to_landing_only_navigates_when_needed() {
        let navigator = Arc::new(RecordingNavigator::at("/"));
        let navigation = Navigation::new(navigator.clone(), Duration::from_millis(1000));

        navigation.to_landing();
        assert!(navigator.history().is_empty());

        navigator.set_route("/dashboard");
        navigation.to_landing();
        assert_eq!(navigator.history(), vec!["/".to_string()]);
    }
}

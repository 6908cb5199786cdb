//! Route classification for the navigation guards.
//!
//! The guards never need a routing table, only the class of a path.

use serde::{Deserialize, Serialize};

/// Access class of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteKind {
    /// Marketing pages, including `/`.
    Public,
    /// `/login` and `/signup`.
    AuthPage,
    /// `/dashboard` and everything below it.
    UserArea,
    /// `/admin` and everything below it.
    AdminArea,
}

impl RouteKind {
    /// Returns `true` for routes that need an authenticated principal.
    #[must_use]
    pub const fn is_protected(self) -> bool {
        matches!(self, Self::UserArea | Self::AdminArea)
    }
}

/// A navigation location.
///
/// Keeps the location as requested (query and fragment included) so it can be
/// returned to after sign-in, plus the normalized path used for
/// classification.
///
/// ```
/// use propdesk_core::{AppRoute, RouteKind};
///
/// let route = AppRoute::parse("/admin/users?page=2");
/// assert_eq!(route.path(), "/admin/users");
/// assert_eq!(route.location(), "/admin/users?page=2");
/// assert_eq!(route.kind(), RouteKind::AdminArea);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AppRoute {
    location: String,
    path: String,
}

impl AppRoute {
    /// Public landing page.
    pub const LANDING: &'static str = "/";
    /// Sign-in page.
    pub const LOGIN: &'static str = "/login";
    /// Sign-up page.
    pub const SIGNUP: &'static str = "/signup";
    /// Client dashboard root.
    pub const DASHBOARD: &'static str = "/dashboard";
    /// Admin console root.
    pub const ADMIN: &'static str = "/admin";

    /// Parse a location such as `/dashboard/properties?tab=rent`.
    ///
    /// A missing leading slash is added; a trailing slash is dropped from the
    /// classification path.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let location = if raw.starts_with('/') {
            raw.to_owned()
        } else {
            format!("/{raw}")
        };

        let end = location.find(['?', '#']).unwrap_or(location.len());
        let path = location.get(..end).unwrap_or(Self::LANDING);
        let path = match path.trim_end_matches('/') {
            "" => Self::LANDING.to_owned(),
            trimmed => trimmed.to_owned(),
        };

        Self { location, path }
    }

    /// The normalized path, without query string or fragment.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The location exactly as requested.
    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Classify this route.
    #[must_use]
    pub fn kind(&self) -> RouteKind {
        let path = self.path.as_str();
        if path == Self::LOGIN || path == Self::SIGNUP {
            RouteKind::AuthPage
        } else if is_under(path, Self::ADMIN) {
            RouteKind::AdminArea
        } else if is_under(path, Self::DASHBOARD) {
            RouteKind::UserArea
        } else {
            RouteKind::Public
        }
    }

    /// Returns `true` if this route's path equals `path`.
    #[must_use]
    pub fn is(&self, path: &str) -> bool {
        self.path == path
    }
}

impl std::fmt::Display for AppRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.location)
    }
}

/// Segment-aware prefix test: `/admin/x` is under `/admin`, `/administrator` is not.
fn is_under(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert_eq!(AppRoute::parse("/").kind(), RouteKind::Public);
        assert_eq!(AppRoute::parse("/pricing").kind(), RouteKind::Public);
        assert_eq!(AppRoute::parse("/login").kind(), RouteKind::AuthPage);
        assert_eq!(AppRoute::parse("/signup/").kind(), RouteKind::AuthPage);
        assert_eq!(AppRoute::parse("/dashboard").kind(), RouteKind::UserArea);
        assert_eq!(
            AppRoute::parse("/dashboard/properties").kind(),
            RouteKind::UserArea
        );
        assert_eq!(AppRoute::parse("/admin").kind(), RouteKind::AdminArea);
        assert_eq!(AppRoute::parse("/admin/users").kind(), RouteKind::AdminArea);
    }

    #[test]
    fn test_prefix_is_segment_aware() {
        assert_eq!(AppRoute::parse("/administrator").kind(), RouteKind::Public);
        assert_eq!(AppRoute::parse("/dashboards").kind(), RouteKind::Public);
    }

    #[test]
    fn test_query_and_fragment_ignored_for_classification() {
        let route = AppRoute::parse("/login?returnTo=%2Fadmin#top");
        assert_eq!(route.path(), "/login");
        assert_eq!(route.kind(), RouteKind::AuthPage);
        assert_eq!(route.location(), "/login?returnTo=%2Fadmin#top");
    }

    #[test]
    fn test_missing_leading_slash() {
        let route = AppRoute::parse("dashboard");
        assert_eq!(route.path(), "/dashboard");
        assert!(route.kind().is_protected());
    }

    #[test]
    fn test_root_variants() {
        assert!(AppRoute::parse("").is(AppRoute::LANDING));
        assert!(AppRoute::parse("/?ref=ad").is(AppRoute::LANDING));
        assert!(AppRoute::parse("//").is(AppRoute::LANDING));
    }
}

//! Principal roles.

use serde::{Deserialize, Serialize};

use crate::AppRoute;

/// Role of an authenticated principal.
///
/// Derived from the administrator allow-list, never from profile metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Property owner or tenant using the client dashboard.
    #[default]
    User,
    /// PropDesk staff using the admin console.
    Admin,
}

impl Role {
    /// Returns `true` for [`Role::Admin`].
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }

    /// The landing area for this role after signing in.
    #[must_use]
    pub const fn home_route(self) -> &'static str {
        match self {
            Self::User => AppRoute::DASHBOARD,
            Self::Admin => AppRoute::ADMIN,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("invalid role: {s}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_home_routes() {
        assert_eq!(Role::User.home_route(), "/dashboard");
        assert_eq!(Role::Admin.home_route(), "/admin");
    }

    #[test]
    fn test_from_str_roundtrips_display() {
        for role in [Role::User, Role::Admin] {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn test_serde_snake_case() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
    }
}

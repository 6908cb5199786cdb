//! Principal (signed-in identity) types.

use serde::{Deserialize, Serialize};

use propdesk_core::{Email, PrincipalId};

/// An authenticated identity as reported by the auth provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    /// Provider-issued identifier.
    pub id: PrincipalId,
    /// Email address, absent for identities created without one.
    pub email: Option<Email>,
    /// Mutable, user-editable metadata.
    #[serde(default)]
    pub metadata: UserMetadata,
}

impl Principal {
    /// The email as a string slice, if any.
    #[must_use]
    pub fn email_str(&self) -> Option<&str> {
        self.email.as_ref().map(Email::as_str)
    }
}

/// Free-form metadata attached to a principal.
///
/// `is_admin` is a display convenience kept in sync with the administrator
/// allow-list. It is never read to decide access.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserMetadata {
    /// Mirror of the allow-list decision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_admin: Option<bool>,
    /// Any other keys the provider returned.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl UserMetadata {
    /// A patch that only sets `is_admin`.
    #[must_use]
    pub fn admin_flag(is_admin: bool) -> Self {
        Self {
            is_admin: Some(is_admin),
            extra: serde_json::Map::new(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_keeps_unknown_keys() {
        let json = r#"{"is_admin":false,"full_name":"Ada Lovelace"}"#;
        let metadata: UserMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(metadata.is_admin, Some(false));
        assert_eq!(
            metadata.extra.get("full_name").and_then(|v| v.as_str()),
            Some("Ada Lovelace")
        );
    }

    #[test]
    fn test_admin_flag_patch_serializes_one_key() {
        let json = serde_json::to_string(&UserMetadata::admin_flag(true)).unwrap();
        assert_eq!(json, r#"{"is_admin":true}"#);
    }

    #[test]
    fn test_metadata_defaults_when_missing() {
        let json = r#"{"id":"6f1c2a0e-8d1b-4b5e-9a57-0f3c5d2e7b11","email":null}"#;
        let principal: Principal = serde_json::from_str(json).unwrap();
        assert_eq!(principal.metadata, UserMetadata::default());
        assert_eq!(principal.email_str(), None);
    }
}

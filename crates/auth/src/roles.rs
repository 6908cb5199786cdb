//! Role resolution.
//!
//! A principal is an administrator iff its email is on the static allow-list.
//! The `is_admin` metadata flag is a mirror of that decision, written back on
//! a best-effort basis and never read.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::task::JoinHandle;

use propdesk_core::Role;

use crate::models::{Principal, UserMetadata};
use crate::provider::AuthProvider;

/// Emails granted the administrator role.
///
/// Matching is exact: case-sensitive, no normalisation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminAllowList {
    emails: BTreeSet<String>,
}

impl AdminAllowList {
    /// Build from explicit entries.
    pub fn new<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            emails: emails.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a comma-separated list. Surrounding whitespace is dropped from
    /// each entry, empty entries are skipped.
    #[must_use]
    pub fn parse(csv: &str) -> Self {
        Self::new(
            csv.split(',')
                .map(str::trim)
                .filter(|entry| !entry.is_empty()),
        )
    }

    /// Whether `email` is on the list, byte for byte.
    #[must_use]
    pub fn contains(&self, email: &str) -> bool {
        self.emails.contains(email)
    }

    /// Whether the list has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.emails.len()
    }
}

/// Derives a principal's role from the allow-list.
#[derive(Debug, Clone)]
pub struct RoleResolver {
    allow_list: Arc<AdminAllowList>,
}

impl RoleResolver {
    #[must_use]
    pub fn new(allow_list: AdminAllowList) -> Self {
        Self {
            allow_list: Arc::new(allow_list),
        }
    }

    /// `true` iff `email` is present and on the allow-list.
    #[must_use]
    pub fn is_admin_email(&self, email: Option<&str>) -> bool {
        email.is_some_and(|email| !email.is_empty() && self.allow_list.contains(email))
    }

    /// The principal's role. Ignores `metadata.is_admin`.
    #[must_use]
    pub fn resolve(&self, principal: &Principal) -> Role {
        if self.is_admin_email(principal.email_str()) {
            Role::Admin
        } else {
            Role::User
        }
    }

    /// Whether the metadata mirror disagrees with the resolved role.
    #[must_use]
    pub fn needs_metadata_sync(&self, principal: &Principal) -> bool {
        principal.metadata.is_admin != Some(self.resolve(principal).is_admin())
    }

    /// Spawn a best-effort write of the `is_admin` mirror, if it is stale.
    ///
    /// Returns the task handle so callers (and tests) may await it; dropping
    /// it detaches the task.
    pub fn spawn_admin_flag_sync<P: AuthProvider>(
        &self,
        provider: Arc<P>,
        principal: &Principal,
    ) -> Option<JoinHandle<()>> {
        if !self.needs_metadata_sync(principal) {
            return None;
        }
        let is_admin = self.resolve(principal).is_admin();
        let principal_id = principal.id;
        Some(tokio::spawn(async move {
            sync_admin_flag(provider.as_ref(), is_admin).await;
            tracing::debug!(principal = %principal_id, is_admin, "Admin flag sync finished");
        }))
    }
}

/// Write the `is_admin` mirror. Failures are logged and dropped; the next
/// sign-in re-evaluates the flag.
pub async fn sync_admin_flag<P: AuthProvider>(provider: &P, is_admin: bool) {
    match provider
        .update_user_metadata(&UserMetadata::admin_flag(is_admin))
        .await
    {
        Ok(principal) => {
            tracing::info!(principal = %principal.id, is_admin, "Synced admin metadata flag");
        }
        Err(e) => {
            tracing::warn!(error = %e, is_admin, "Failed to sync admin metadata flag");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testing::{FakeProvider, principal_for};

    fn resolver() -> RoleResolver {
        RoleResolver::new(AdminAllowList::parse("admin@example.com, ops@example.com,,"))
    }

    #[test]
    fn test_parse_trims_entries_and_skips_empty() {
        let list = AdminAllowList::parse(" admin@example.com ,, ops@example.com ");
        assert_eq!(list.len(), 2);
        assert!(list.contains("admin@example.com"));
        assert!(list.contains("ops@example.com"));
    }

    #[test]
    fn test_is_admin_is_exact() {
        let resolver = resolver();
        assert!(resolver.is_admin_email(Some("admin@example.com")));
        assert!(!resolver.is_admin_email(Some("Admin@example.com")));
        assert!(!resolver.is_admin_email(Some(" admin@example.com")));
        assert!(!resolver.is_admin_email(Some("")));
        assert!(!resolver.is_admin_email(None));
    }

    #[test]
    fn test_metadata_flag_is_never_read() {
        let resolver = resolver();

        let mut admin = principal_for("admin@example.com");
        admin.metadata.is_admin = Some(false);
        assert_eq!(resolver.resolve(&admin), Role::Admin);

        let mut user = principal_for("tenant@example.com");
        user.metadata.is_admin = Some(true);
        assert_eq!(resolver.resolve(&user), Role::User);
    }

    #[test]
    fn test_needs_metadata_sync() {
        let resolver = resolver();
        let mut admin = principal_for("admin@example.com");

        admin.metadata.is_admin = None;
        assert!(resolver.needs_metadata_sync(&admin));
        admin.metadata.is_admin = Some(false);
        assert!(resolver.needs_metadata_sync(&admin));
        admin.metadata.is_admin = Some(true);
        assert!(!resolver.needs_metadata_sync(&admin));
    }

    #[tokio::test]
    async fn test_spawned_sync_writes_flag() {
        let provider = Arc::new(FakeProvider::new());
        provider.register("admin@example.com", "correct-horse");
        provider.seed_session("admin@example.com");
        let mut admin = principal_for("admin@example.com");
        admin.metadata.is_admin = Some(false);

        let handle = resolver()
            .spawn_admin_flag_sync(provider.clone(), &admin)
            .unwrap();
        handle.await.unwrap();

        assert_eq!(provider.metadata_updates(), vec![Some(true)]);
    }

    #[tokio::test]
    async fn test_sync_failure_is_swallowed() {
        let provider = FakeProvider::new();
        provider.fail_metadata_updates(true);
        sync_admin_flag(&provider, true).await;
        assert_eq!(provider.metadata_updates(), vec![Some(true)]);
    }

    #[test]
    fn test_no_spawn_when_in_sync() {
        let provider = Arc::new(FakeProvider::new());
        let mut user = principal_for("tenant@example.com");
        user.metadata.is_admin = Some(false);
        assert!(resolver().spawn_admin_flag_sync(provider, &user).is_none());
    }
}

//! Terminal navigator.
//!
//! A terminal has no address bar, so the "current page" is persisted next to
//! the auth state and every navigation is reported on the log.

use std::sync::Arc;

use propdesk_auth::navigation::Navigator;
use propdesk_auth::storage::KeyValueStore;
use propdesk_core::AppRoute;

/// Storage key of the current location.
const ROUTE_KEY: &str = "propdesk.cli-route";

pub struct TerminalNavigator {
    storage: Arc<dyn KeyValueStore>,
}

impl TerminalNavigator {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self { storage }
    }
}

impl Navigator for TerminalNavigator {
    fn current_route(&self) -> AppRoute {
        match self.storage.get(ROUTE_KEY) {
            Ok(Some(location)) => AppRoute::parse(&location),
            Ok(None) => AppRoute::parse(AppRoute::LANDING),
            Err(e) => {
                tracing::warn!(error = %e, "Could not read current route, assuming landing page");
                AppRoute::parse(AppRoute::LANDING)
            }
        }
    }

    fn navigate(&self, location: &str) {
        tracing::info!(%location, "Navigated");
        if let Err(e) = self.storage.set(ROUTE_KEY, location) {
            tracing::warn!(error = %e, "Could not persist current route");
        }
    }
}

use std::sync::Arc;

use anyhow::{bail, Result};
use tracing::{info, warn};

use crate::api::RequestAuthenticator;

use super::navigator::ENTRY_ROUTE;
use super::{Credential, CredentialStore, Navigator, SessionSignal};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Authenticated,
    Anonymous,
}

/// Owns the credential, the default header and the signal as one unit.
///
/// Every write path goes through here so the three never disagree for longer
/// than a single synchronous call. Clone is cheap - clones share all state.
#[derive(Clone)]
pub struct SessionManager {
    store: CredentialStore,
    authenticator: RequestAuthenticator,
    signal: SessionSignal,
    navigator: Arc<dyn Navigator>,
    entry_route: String,
}

impl SessionManager {
    /// Startup: read the store, seed the signal and the default header from it.
    pub fn start(store: CredentialStore, navigator: impl Navigator + 'static) -> Self {
        let signal = SessionSignal::initialize(&store);
        let authenticator = RequestAuthenticator::new();

        if let Err(e) = authenticator.seed(&store) {
            warn!(error = %e, "Stored credential is unusable, discarding it");
            if let Err(e) = store.clear() {
                warn!(error = %e, "Failed to clear stored credential");
            }
            signal.set(false);
        }

        let manager = Self {
            store,
            authenticator,
            signal,
            navigator: Arc::new(navigator),
            entry_route: ENTRY_ROUTE.to_string(),
        };
        info!(state = ?manager.state(), "Session started");
        manager
    }

    /// Route used after teardown (defaults to `/`)
    pub fn with_entry_route(mut self, route: impl Into<String>) -> Self {
        self.entry_route = route.into();
        self
    }

    pub fn state(&self) -> SessionState {
        if self.signal.get() {
            SessionState::Authenticated
        } else {
            SessionState::Anonymous
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.signal.get()
    }

    pub fn signal(&self) -> &SessionSignal {
        &self.signal
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    pub fn authenticator(&self) -> &RequestAuthenticator {
        &self.authenticator
    }

    pub fn entry_route(&self) -> &str {
        &self.entry_route
    }

    /// Anonymous -> Authenticated, after a successful login elsewhere.
    ///
    /// Stores the credential, installs the header, then flips the signal.
    /// Nothing is touched if the credential cannot be used as a header, and
    /// the signal stays false if the store does not read back what was written.
    pub fn establish(&self, credential: &Credential) -> Result<()> {
        RequestAuthenticator::bearer_value(credential)?;
        self.store.set(credential)?;
        if self.store.get().as_ref() != Some(credential) {
            bail!("Credential storage did not keep the credential");
        }
        self.authenticator.install(credential)?;
        self.signal.set(true);
        info!("Session established");
        Ok(())
    }

    /// Authenticated -> Anonymous.
    ///
    /// Store, header and signal are cleared before navigation is requested.
    /// Safe to call repeatedly; later calls only repeat the navigation.
    ///
    /// A store that refuses to clear is retried once. If it still fails the
    /// credential may outlive the session until the next successful clear;
    /// the header and signal are cleared regardless so no request carries it.
    pub fn teardown(&self) {
        let was_authenticated = self.signal.get();

        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear stored credential, retrying");
            if let Err(e) = self.store.clear() {
                warn!(error = %e, "Stored credential could not be cleared");
            }
        }
        self.authenticator.clear();
        self.signal.set(false);

        if was_authenticated {
            info!(route = %self.entry_route, "Session torn down");
        }
        self.navigator.navigate(&self.entry_route);
    }

    /// Explicit logout, same sequence as a server rejection
    pub fn logout(&self) {
        info!("Logging out");
        self.teardown();
    }
}

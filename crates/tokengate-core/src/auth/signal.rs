//! Observable "is authenticated" flag.
//!
//! Backed by a `tokio::sync::watch` channel: writes replace the value and wake
//! every receiver in the same call, readers never block writers.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use super::CredentialStore;

/// Cached view of `CredentialStore::has()`.
/// Clone is cheap - clones observe the same value.
#[derive(Clone, Debug)]
pub struct SessionSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl SessionSignal {
    /// Create the signal seeded from the store's current contents
    pub fn initialize(store: &CredentialStore) -> Self {
        let authenticated = store.has();
        debug!(authenticated, "Session signal initialized");
        let (tx, _rx) = watch::channel(authenticated);
        Self { tx: Arc::new(tx) }
    }

    /// Current value
    pub fn get(&self) -> bool {
        *self.tx.borrow()
    }

    /// Receiver for change notifications
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Overwrite the value and notify subscribers. Only the session manager writes.
    pub(crate) fn set(&self, authenticated: bool) {
        let previous = self.tx.send_replace(authenticated);
        if previous != authenticated {
            debug!(authenticated, "Session signal changed");
        }
    }
}

//! Navigation capability handed to the session manager.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::debug;

/// Route the user is sent to after teardown
pub const ENTRY_ROUTE: &str = "/";

/// Moves the active view to a route. Navigating to the current route again
/// must be harmless.
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: &str);
}

/// A navigation request emitted by `ChannelNavigator`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub route: String,
}

/// Forwards navigation requests to a front end's event loop.
#[derive(Clone)]
pub struct ChannelNavigator {
    tx: mpsc::UnboundedSender<Navigation>,
}

impl ChannelNavigator {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Navigation>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Navigator for ChannelNavigator {
    fn navigate(&self, route: &str) {
        // A closed receiver means nobody is rendering anymore
        if self
            .tx
            .send(Navigation {
                route: route.to_string(),
            })
            .is_err()
        {
            debug!(route, "Navigation receiver dropped");
        }
    }
}

/// Keeps every requested route. Useful in tests and headless embeddings.
#[derive(Clone, Default)]
pub struct RecordingNavigator {
    routes: Arc<Mutex<Vec<String>>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn routes(&self) -> Vec<String> {
        self.routes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: &str) {
        self.routes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(route.to_string());
    }
}

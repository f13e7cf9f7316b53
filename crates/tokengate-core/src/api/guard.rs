//! Response pipeline stage that ends the session on HTTP 401.

use tracing::warn;

use crate::auth::SessionManager;

use super::ApiError;

/// Inspects every outcome coming back from the server.
///
/// This is the only place that decides a session is no longer valid.
#[derive(Clone)]
pub struct ResponseGuard {
    session: SessionManager,
}

impl ResponseGuard {
    pub fn new(session: SessionManager) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Pass successes through untouched. On a delivered 401 tear the session
    /// down first, then hand the original error back to the caller.
    pub fn inspect<T>(&self, outcome: Result<T, ApiError>) -> Result<T, ApiError> {
        if let Err(ref e) = outcome {
            if e.is_authorization_failure() {
                warn!("Server rejected credential, ending session");
                self.session.teardown();
            }
        }
        outcome
    }
}

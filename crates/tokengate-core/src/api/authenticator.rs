//! Default `Authorization` header for every outgoing request.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::RequestBuilder;
use tracing::debug;

use crate::auth::{Credential, CredentialStore};

use super::ApiError;

/// Default header table shared by every clone of an `ApiClient`.
/// Clone is cheap - clones share the same table.
#[derive(Clone, Default)]
pub struct RequestAuthenticator {
    defaults: Arc<RwLock<HeaderMap>>,
}

impl RequestAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the header value for a credential, rejecting anything that
    /// cannot travel in a header.
    pub fn bearer_value(credential: &Credential) -> Result<HeaderValue, ApiError> {
        if credential.as_str().trim().is_empty() {
            return Err(ApiError::InvalidCredential("credential is empty".to_string()));
        }
        let mut value = HeaderValue::from_str(&format!("Bearer {}", credential.as_str()))
            .map_err(|_| {
                ApiError::InvalidCredential("credential contains invalid header characters".to_string())
            })?;
        value.set_sensitive(true);
        Ok(value)
    }

    /// Mirror the store: install the header if a credential is stored,
    /// otherwise make sure none is present.
    pub fn seed(&self, store: &CredentialStore) -> Result<(), ApiError> {
        match store.get() {
            Some(credential) => self.install(&credential)?,
            None => self.clear(),
        }
        Ok(())
    }

    /// Install the header for a credential already in hand
    pub fn install(&self, credential: &Credential) -> Result<(), ApiError> {
        let value = Self::bearer_value(credential)?;
        self.write().insert(header::AUTHORIZATION, value);
        debug!("Authorization header installed");
        Ok(())
    }

    /// Remove the header entry entirely
    pub fn clear(&self) {
        if self.write().remove(header::AUTHORIZATION).is_some() {
            debug!("Authorization header removed");
        }
    }

    /// Current `Authorization` default, if any
    pub fn authorization(&self) -> Option<HeaderValue> {
        self.read().get(header::AUTHORIZATION).cloned()
    }

    pub fn default_headers(&self) -> HeaderMap {
        self.read().clone()
    }

    /// Attach the default headers to a request
    pub fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        request.headers(self.default_headers())
    }

    fn read(&self) -> RwLockReadGuard<'_, HeaderMap> {
        self.defaults.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HeaderMap> {
        self.defaults.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_installs_bearer_header() {
        let store = CredentialStore::in_memory();
        store.set(&Credential::from("abc123")).unwrap();

        let authenticator = RequestAuthenticator::new();
        authenticator.seed(&store).unwrap();
        assert_eq!(authenticator.authorization().unwrap(), "Bearer abc123");
        assert!(authenticator.authorization().unwrap().is_sensitive());
    }

    #[test]
    fn test_seed_without_credential_leaves_no_header() {
        let authenticator = RequestAuthenticator::new();
        authenticator.seed(&CredentialStore::in_memory()).unwrap();
        assert!(authenticator.authorization().is_none());
    }

    #[test]
    fn test_install_replaces_previous_header() {
        let authenticator = RequestAuthenticator::new();
        authenticator.install(&Credential::from("abc123")).unwrap();
        authenticator.install(&Credential::from("def456")).unwrap();
        assert_eq!(authenticator.authorization().unwrap(), "Bearer def456");

        // A rejected credential leaves the current header in place
        assert!(authenticator.install(&Credential::from("")).is_err());
        assert_eq!(authenticator.authorization().unwrap(), "Bearer def456");
    }

    #[test]
    fn test_clear_removes_entry() {
        let store = CredentialStore::in_memory();
        store.set(&Credential::from("abc123")).unwrap();
        let authenticator = RequestAuthenticator::new();
        authenticator.seed(&store).unwrap();

        authenticator.clear();
        assert!(!authenticator.default_headers().contains_key(header::AUTHORIZATION));
        authenticator.clear();
    }

    #[test]
    fn test_clones_share_table() {
        let store = CredentialStore::in_memory();
        store.set(&Credential::from("abc123")).unwrap();
        let authenticator = RequestAuthenticator::new();
        let shared = authenticator.clone();

        authenticator.seed(&store).unwrap();
        assert_eq!(shared.authorization().unwrap(), "Bearer abc123");
    }

    #[test]
    fn test_apply_attaches_header_to_request() {
        let store = CredentialStore::in_memory();
        store.set(&Credential::from("abc123")).unwrap();
        let authenticator = RequestAuthenticator::new();
        authenticator.seed(&store).unwrap();

        let request = authenticator
            .apply(reqwest::Client::new().get("http://localhost/api/plaene/"))
            .build()
            .unwrap();
        assert_eq!(request.headers()[header::AUTHORIZATION], "Bearer abc123");
    }

    #[test]
    fn test_bearer_value_rejects_bad_credentials() {
        assert!(matches!(
            RequestAuthenticator::bearer_value(&Credential::from("  ")),
            Err(ApiError::InvalidCredential(_))
        ));
        assert!(matches!(
            RequestAuthenticator::bearer_value(&Credential::from("abc\n123")),
            Err(ApiError::InvalidCredential(_))
        ));
    }
}

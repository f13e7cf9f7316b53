//! Durable storage for the single bearer credential.
//!
//! `CredentialStore` is the only owner of the credential. The slot itself lives
//! in a `CredentialBackend`: the OS keychain, a JSON file, or process memory.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use keyring::Entry;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Keychain service name
const SERVICE_NAME: &str = "tokengate";

/// Fixed key the credential is stored under
pub const CREDENTIAL_KEY: &str = "accessToken";

/// Credential file name in the data directory
const CREDENTIAL_FILE: &str = "session.json";

/// Opaque bearer token. Debug output never shows the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

impl From<String> for Credential {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl From<&str> for Credential {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

/// What actually sits in the durable slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCredential {
    pub token: String,
    /// When the credential was written. Informational only, never used to expire it.
    #[serde(default)]
    pub stored_at: Option<DateTime<Utc>>,
}

impl StoredCredential {
    fn now(token: &str) -> Self {
        Self {
            token: token.to_string(),
            stored_at: Some(Utc::now()),
        }
    }
}

/// A durable key-value slot holding at most one credential.
///
/// `remove` on an empty slot must succeed.
pub trait CredentialBackend: Send + Sync {
    fn load(&self) -> Result<Option<StoredCredential>>;
    fn store(&self, record: &StoredCredential) -> Result<()>;
    fn remove(&self) -> Result<()>;
}

// ============================================================================
// Backends
// ============================================================================

/// OS keychain slot via the `keyring` crate.
pub struct KeyringBackend {
    service: String,
}

impl KeyringBackend {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(&self.service, CREDENTIAL_KEY).context("Failed to create keyring entry")
    }
}

impl Default for KeyringBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialBackend for KeyringBackend {
    fn load(&self) -> Result<Option<StoredCredential>> {
        match self.entry()?.get_password() {
            // Older entries may hold the bare token rather than a record
            Ok(raw) => Ok(Some(serde_json::from_str(&raw).unwrap_or(StoredCredential {
                token: raw,
                stored_at: None,
            }))),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve credential from keychain"),
        }
    }

    fn store(&self, record: &StoredCredential) -> Result<()> {
        let contents = serde_json::to_string(record)?;
        self.entry()?
            .set_password(&contents)
            .context("Failed to store credential in keychain")
    }

    fn remove(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete credential from keychain"),
        }
    }
}

/// JSON file slot in the data directory.
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path(&self) -> PathBuf {
        self.dir.join(CREDENTIAL_FILE)
    }
}

impl CredentialBackend for FileBackend {
    fn load(&self) -> Result<Option<StoredCredential>> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }
        let contents =
            std::fs::read_to_string(&path).context("Failed to read credential file")?;
        let record = serde_json::from_str(&contents).context("Failed to parse credential file")?;
        Ok(Some(record))
    }

    fn store(&self, record: &StoredCredential) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let contents = serde_json::to_string_pretty(record)?;
        std::fs::write(self.path(), contents).context("Failed to write credential file")?;
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        let path = self.path();
        if path.exists() {
            std::fs::remove_file(path).context("Failed to remove credential file")?;
        }
        Ok(())
    }
}

/// Process-local slot. Does not survive restarts.
#[derive(Default)]
pub struct MemoryBackend {
    slot: Mutex<Option<StoredCredential>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<StoredCredential>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CredentialBackend for MemoryBackend {
    fn load(&self) -> Result<Option<StoredCredential>> {
        Ok(self.slot().clone())
    }

    fn store(&self, record: &StoredCredential) -> Result<()> {
        *self.slot() = Some(record.clone());
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        *self.slot() = None;
        Ok(())
    }
}

// ============================================================================
// Credential Store
// ============================================================================

/// Owner of the single credential.
/// Clone is cheap - clones share the same backend.
#[derive(Clone)]
pub struct CredentialStore {
    backend: Arc<dyn CredentialBackend>,
}

impl CredentialStore {
    pub fn new(backend: impl CredentialBackend + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    /// In-memory store, mostly for tests
    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new())
    }

    /// Read the durable slot. An unreadable slot counts as empty.
    pub fn get(&self) -> Option<Credential> {
        self.record().map(|r| Credential(r.token))
    }

    /// Overwrite the durable slot
    pub fn set(&self, credential: &Credential) -> Result<()> {
        self.backend.store(&StoredCredential::now(credential.as_str()))?;
        debug!("Credential stored");
        Ok(())
    }

    /// Remove the durable slot. Clearing an empty slot is a no-op.
    pub fn clear(&self) -> Result<()> {
        self.backend.remove()?;
        debug!("Credential cleared");
        Ok(())
    }

    pub fn has(&self) -> bool {
        self.get().is_some()
    }

    /// When the current credential was written, if the backend recorded it
    pub fn stored_at(&self) -> Option<DateTime<Utc>> {
        self.record().and_then(|r| r.stored_at)
    }

    fn record(&self) -> Option<StoredCredential> {
        match self.backend.load() {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "Credential storage unavailable, treating as logged out");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenBackend;

    impl CredentialBackend for BrokenBackend {
        fn load(&self) -> Result<Option<StoredCredential>> {
            Err(anyhow::anyhow!("keychain locked"))
        }
        fn store(&self, _: &StoredCredential) -> Result<()> {
            Err(anyhow::anyhow!("keychain locked"))
        }
        fn remove(&self) -> Result<()> {
            Err(anyhow::anyhow!("keychain locked"))
        }
    }

    #[test]
    fn test_memory_store_set_get_clear() {
        let store = CredentialStore::in_memory();
        assert_eq!(store.get(), None);

        store.set(&Credential::from("abc123")).unwrap();
        assert_eq!(store.get(), Some(Credential::from("abc123")));
        assert!(store.stored_at().is_some());

        store.set(&Credential::from("def456")).unwrap();
        assert_eq!(store.get().unwrap().as_str(), "def456");

        store.clear().unwrap();
        assert!(!store.has());
    }

    #[test]
    fn test_clear_is_idempotent() {
        let store = CredentialStore::in_memory();
        store.clear().unwrap();
        store.clear().unwrap();
        assert_eq!(store.get(), None);
    }

    #[test]
    fn test_clones_share_slot() {
        let store = CredentialStore::in_memory();
        let other = store.clone();
        store.set(&Credential::from("abc123")).unwrap();
        assert!(other.has());
    }

    #[test]
    fn test_unavailable_backend_reads_as_absent() {
        let store = CredentialStore::new(BrokenBackend);
        assert_eq!(store.get(), None);
        assert!(store.set(&Credential::from("abc123")).is_err());
    }

    #[test]
    fn test_file_backend_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(FileBackend::new(dir.path().to_path_buf()));
        store.set(&Credential::from("abc123")).unwrap();

        let reopened = CredentialStore::new(FileBackend::new(dir.path().to_path_buf()));
        assert_eq!(reopened.get().unwrap().as_str(), "abc123");

        reopened.clear().unwrap();
        reopened.clear().unwrap();
        assert!(!store.has());
        assert!(!dir.path().join(CREDENTIAL_FILE).exists());
    }

    #[test]
    fn test_corrupt_file_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CREDENTIAL_FILE), "{not json").unwrap();
        let store = CredentialStore::new(FileBackend::new(dir.path().to_path_buf()));
        assert_eq!(store.get(), None);
    }

    #[test]
    #[ignore = "needs an OS keychain"]
    fn test_keyring_backends_share_slot() {
        let service = format!("{}-test-{}", SERVICE_NAME, std::process::id());
        let store = CredentialStore::new(KeyringBackend::with_service(service.clone()));
        store.set(&Credential::from("abc123")).unwrap();

        let reopened = CredentialStore::new(KeyringBackend::with_service(service));
        assert_eq!(reopened.get().unwrap().as_str(), "abc123");

        reopened.clear().unwrap();
        assert!(!store.has());
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let credential = Credential::from("abc123");
        assert_eq!(format!("{:?}", credential), "Credential(***)");
    }
}

//! Authentication module for the client-side session lifecycle.
//!
//! This module provides:
//! - `CredentialStore`: durable storage for the single bearer credential
//! - `SessionSignal`: observable "is authenticated" flag
//! - `SessionManager`: login and teardown as one unit
//! - `Navigator`: where the user is sent after teardown
//!
//! There is no client-side expiry. A session ends on logout or when the
//! server rejects the credential.

pub mod credentials;
pub mod navigator;
pub mod session;
pub mod signal;

pub use credentials::{
    Credential, CredentialBackend, CredentialStore, FileBackend, KeyringBackend, MemoryBackend,
    StoredCredential,
};
pub use navigator::{ChannelNavigator, Navigation, Navigator, RecordingNavigator, ENTRY_ROUTE};
pub use session::{SessionManager, SessionState};
pub use signal::SessionSignal;

//! Client-side bearer session core.
//!
//! A single credential is kept in durable storage, attached to every
//! outgoing request as a default header, and mirrored in an observable
//! signal. When the server answers 401 all three are cleared together and
//! the front end is sent back to the entry route.

pub mod api;
pub mod auth;
pub mod config;

pub use api::{ApiClient, ApiError};
pub use auth::{Credential, CredentialStore, SessionManager, SessionSignal, SessionState};
pub use config::Config;

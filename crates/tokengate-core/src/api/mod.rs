//! Authenticated HTTP access to the plan service API.
//!
//! This module provides the `ApiClient` together with the two pipeline
//! stages it routes every request through: the `RequestAuthenticator`,
//! which holds the default `Authorization: Bearer <token>` header, and the
//! `ResponseGuard`, which ends the session when the server answers 401.

pub mod authenticator;
pub mod client;
pub mod error;
pub mod guard;

pub use authenticator::RequestAuthenticator;
pub use client::ApiClient;
pub use error::ApiError;
pub use guard::ResponseGuard;

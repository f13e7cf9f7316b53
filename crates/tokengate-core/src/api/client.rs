//! API client that carries the session credential.
//!
//! Every request gets the authenticator's default headers and every outcome
//! passes through the `ResponseGuard` before the caller sees it.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::auth::SessionManager;
use crate::config::Config;

use super::{ApiError, RequestAuthenticator, ResponseGuard};

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Clone is cheap - reqwest::Client, the header table and the session are all shared.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    authenticator: RequestAuthenticator,
    guard: ResponseGuard,
    initial_backoff: Duration,
}

impl ApiClient {
    /// Create a client bound to a session, with the default timeout
    pub fn new(base_url: impl Into<String>, session: &SessionManager) -> Result<Self, ApiError> {
        Self::with_timeout(
            base_url,
            session,
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        session: &SessionManager,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            authenticator: session.authenticator().clone(),
            guard: ResponseGuard::new(session.clone()),
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        })
    }

    pub fn from_config(config: &Config, session: &SessionManager) -> Result<Self, ApiError> {
        Self::with_timeout(
            config.api_base_url.clone(),
            session,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn session(&self) -> &SessionManager {
        self.guard.session()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Send one request with the default headers and map non-success statuses.
    async fn execute(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = self.authenticator.apply(request).send().await?;

        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Run a request through the guard, retrying on rate limits.
    /// Authorization failures are never retried.
    async fn send<F>(&self, build: F) -> Result<Response, ApiError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let mut retries = 0;
        let mut backoff = self.initial_backoff;

        loop {
            match self.guard.inspect(self.execute(build(&self.client)).await) {
                Err(ApiError::RateLimited) if retries < MAX_RATE_LIMIT_RETRIES => {
                    retries += 1;
                    warn!(retry = retries, backoff_ms = backoff.as_millis() as u64, "Rate limited, backing off");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2; // Exponential backoff
                }
                outcome => return outcome,
            }
        }
    }

    async fn parse<T: DeserializeOwned>(response: Response, url: &str) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse JSON response from {}: {}", url, e))
        })
    }

    // ===== Request Methods =====

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path);
        debug!(url = %url, "GET");
        let response = self.send(|client| client.get(&url)).await?;
        Self::parse(response, &url).await
    }

    pub async fn get_text(&self, path: &str) -> Result<String, ApiError> {
        let url = self.url(path);
        debug!(url = %url, "GET");
        let response = self.send(|client| client.get(&url)).await?;
        Ok(response.text().await?)
    }

    pub async fn post_json<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = self.url(path);
        debug!(url = %url, "POST");
        let response = self.send(|client| client.post(&url).json(body)).await?;
        Self::parse(response, &url).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        let url = self.url(path);
        debug!(url = %url, "DELETE");
        self.send(|client| client.delete(&url)).await?;
        Ok(())
    }
}

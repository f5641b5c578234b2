//! TAP session configuration and authenticated transport.
//!
//! This module centralizes client construction policy for the archive: the
//! fixed service endpoint, connect timeout, and the `Authorization` header
//! carried by every request the session issues.

use std::time::Duration;

use reqwest::Client;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use tracing::debug;
use url::Url;

use super::error::TapError;

/// Base URL of the APPLAUSE TAP service.
pub const TAP_BASE_URL: &str = "https://www.plate-archive.org/tap";

/// Default HTTP connect timeout (30 seconds).
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default pause between observing a terminal job phase and touching the
/// job again (error check / result fetch).
///
/// The archive has been observed to report COMPLETED slightly before results
/// are actually retrievable, producing spurious HTTP 500s when fetched
/// immediately. The pause is an empirical mitigation, not a readiness check.
pub const DEFAULT_RESULT_DELAY: Duration = Duration::from_millis(500);

/// An authenticated session against the APPLAUSE TAP service.
///
/// The session owns its HTTP transport: the authentication token set here is
/// sent as `Authorization: Token <t>` on every request this session issues,
/// and on nothing else. Callers needing different tokens concurrently should
/// use separate sessions.
///
/// # Example
///
/// ```no_run
/// use applause_query::TapSession;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let session = TapSession::new(Some("my-archive-token".to_string()))?;
/// let table = session
///     .run_async("SELECT TOP 5 * FROM applause_dr3.plate")
///     .await?;
/// println!("{} rows", table.n_rows());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TapSession {
    client: Client,
    base_url: String,
    token: Option<String>,
    result_delay: Duration,
}

impl TapSession {
    /// Creates a session bound to the fixed APPLAUSE endpoint.
    ///
    /// If `token` is non-null the `Authorization: Token <t>` header is
    /// installed on the transport immediately.
    ///
    /// # Errors
    ///
    /// Returns [`TapError::Session`] if the transport cannot be built, e.g.
    /// when the token contains characters not allowed in an HTTP header.
    pub fn new(token: Option<String>) -> Result<Self, TapError> {
        Self::with_endpoint(TAP_BASE_URL, token)
    }

    /// Creates a session against a non-default TAP endpoint.
    ///
    /// Intended for mirror deployments and tests; normal use goes through
    /// [`TapSession::new`].
    ///
    /// # Errors
    ///
    /// Returns [`TapError::InvalidUrl`] if `endpoint` is not a valid URL, or
    /// [`TapError::Session`] if the transport cannot be built.
    pub fn with_endpoint(endpoint: &str, token: Option<String>) -> Result<Self, TapError> {
        Url::parse(endpoint).map_err(|_| TapError::invalid_url(endpoint))?;
        let client = build_client(token.as_deref())?;
        Ok(Self {
            client,
            base_url: endpoint.trim_end_matches('/').to_string(),
            token,
            result_delay: DEFAULT_RESULT_DELAY,
        })
    }

    /// Sets or clears the authentication token.
    ///
    /// A non-null token (re)installs `Authorization: Token <t>` on the
    /// transport. A null token removes the header; removal when no header is
    /// present is a no-op, never an error.
    ///
    /// # Errors
    ///
    /// Returns [`TapError::Session`] if the transport cannot be rebuilt with
    /// the new header.
    pub fn set_token(&mut self, token: Option<String>) -> Result<(), TapError> {
        if token.is_none() && self.token.is_none() {
            return Ok(());
        }
        debug!(cleared = token.is_none(), "updating session token");
        self.client = build_client(token.as_deref())?;
        self.token = token;
        Ok(())
    }

    /// Returns the last stored token value.
    ///
    /// This reflects client-side intent (what was passed to [`Self::new`] or
    /// [`Self::set_token`]) rather than being re-derived from the transport.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Returns the `Authorization` header value the transport sends, if any.
    #[must_use]
    pub fn authorization(&self) -> Option<String> {
        self.token.as_ref().map(|t| format!("Token {t}"))
    }

    /// Sets the pause applied between a terminal job phase and the outcome
    /// check (default 500 ms, see [`DEFAULT_RESULT_DELAY`]).
    pub fn set_result_delay(&mut self, delay: Duration) {
        self.result_delay = delay;
    }

    /// Returns the configured post-wait pause.
    #[must_use]
    pub fn result_delay(&self) -> Duration {
        self.result_delay
    }

    /// Base URL of the TAP service this session talks to (no trailing slash).
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn client(&self) -> &Client {
        &self.client
    }
}

/// Builds the session transport, installing the token as a default header.
fn build_client(token: Option<&str>) -> Result<Client, TapError> {
    let mut headers = HeaderMap::new();
    if let Some(token) = token {
        let value = HeaderValue::from_str(&format!("Token {token}")).map_err(|_| {
            TapError::session("token contains characters not allowed in an HTTP header")
        })?;
        headers.insert(AUTHORIZATION, value);
    }
    Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .gzip(true)
        .default_headers(headers)
        .build()
        .map_err(|e| TapError::session(format!("failed to build HTTP client: {e}")))
}

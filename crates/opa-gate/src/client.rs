// crates/opa-gate/src/client.rs
// ============================================================================
// Module: Decision Client
// Description: Posts authorization queries to the external decision service.
// Purpose: Obtain decision results with bounded time and size.
// Dependencies: async-trait, reqwest, serde_json, opa-gate-config
// ============================================================================

//! ## Overview
//! The decision client serializes `{ "input": <query> }`, POSTs it to the
//! configured endpoint, and parses `{ "result": { ... } }` from the response.
//! Any transport failure, timeout, non-2xx status, oversized or malformed
//! response yields a [`DecisionError`]; callers treat every one of them as a
//! deny. A missing or `null` `result` parses to an empty mapping.
//!
//! One [`reqwest::Client`] is built per gate and shared by all request tasks.
//! Dropping the future returned by [`DecisionService::decide`] aborts the
//! in-flight call.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use opa_gate_config::DecisionClientConfig;
use reqwest::Client;
use reqwest::Response;
use reqwest::Url;
use reqwest::redirect::Policy;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

use crate::canonical::AuthorizationQuery;

// ============================================================================
// SECTION: Public Types
// ============================================================================

/// Decision result mapping read from the response `result` key.
pub type DecisionResult = Map<String, Value>;

/// Decision service interface.
#[async_trait]
pub trait DecisionService: Send + Sync {
    /// Requests a decision for the query.
    ///
    /// # Errors
    ///
    /// Returns [`DecisionError`] when no decision could be obtained.
    async fn decide(&self, query: &AuthorizationQuery) -> Result<DecisionResult, DecisionError>;
}

/// HTTP JSON decision service client.
///
/// # Invariants
/// - Redirects are not followed.
/// - Response bodies larger than `max_response_bytes` fail closed.
pub struct HttpDecisionClient {
    /// Decision service endpoint.
    url: Url,
    /// Shared HTTP client configured with timeouts.
    client: Client,
    /// Maximum accepted response body size.
    max_response_bytes: usize,
}

impl HttpDecisionClient {
    /// Builds a decision client for the endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`DecisionError::Client`] when the URL is invalid or the HTTP
    /// client cannot be built.
    pub fn new(url: &str, config: &DecisionClientConfig) -> Result<Self, DecisionError> {
        let url = Url::parse(url).map_err(|err| DecisionError::Client(err.to_string()))?;
        let client = Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .redirect(Policy::none())
            .build()
            .map_err(|err| DecisionError::Client(err.to_string()))?;
        Ok(Self {
            url,
            client,
            max_response_bytes: config.max_response_bytes,
        })
    }

    /// Returns the decision service endpoint.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl DecisionService for HttpDecisionClient {
    async fn decide(&self, query: &AuthorizationQuery) -> Result<DecisionResult, DecisionError> {
        let payload = DecisionRequest {
            input: query,
        };
        let response = self
            .client
            .post(self.url.clone())
            .json(&payload)
            .send()
            .await
            .map_err(map_transport_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(DecisionError::Status(status.as_u16()));
        }
        let body = read_response_limited(response, self.max_response_bytes).await?;
        let decoded: DecisionResponse =
            serde_json::from_slice(&body).map_err(|err| DecisionError::Decode(err.to_string()))?;
        Ok(decoded.result.unwrap_or_default())
    }
}

// ============================================================================
// SECTION: Wire Types
// ============================================================================

/// Request envelope posted to the decision service.
#[derive(Serialize)]
struct DecisionRequest<'a> {
    /// Canonical authorization query.
    input: &'a AuthorizationQuery,
}

/// Response envelope returned by the decision service.
#[derive(Deserialize)]
struct DecisionResponse {
    /// Decision result mapping; absent or `null` means empty.
    #[serde(default)]
    result: Option<DecisionResult>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Decision unavailable failures.
///
/// # Invariants
/// - Every variant is treated as a deny by the gate.
/// - Variants are stable for error classification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecisionError {
    /// Client construction failed.
    #[error("decision client error: {0}")]
    Client(String),
    /// Connection or protocol failure.
    #[error("decision service unreachable: {0}")]
    Transport(String),
    /// Call exceeded the configured timeout.
    #[error("decision service timed out")]
    Timeout,
    /// Decision service returned a non-2xx status.
    #[error("decision service returned status {0}")]
    Status(u16),
    /// Response exceeded the size limit.
    #[error("decision response exceeds {0} bytes")]
    TooLarge(usize),
    /// Response was not a valid decision document.
    #[error("decision response malformed: {0}")]
    Decode(String),
}

impl DecisionError {
    /// Returns a stable label for the error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Client(_) => "client",
            Self::Transport(_) => "transport",
            Self::Timeout => "timeout",
            Self::Status(_) => "status",
            Self::TooLarge(_) => "too_large",
            Self::Decode(_) => "decode",
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Maps a reqwest failure to a decision error.
fn map_transport_error(err: reqwest::Error) -> DecisionError {
    if err.is_timeout() {
        DecisionError::Timeout
    } else {
        DecisionError::Transport(err.to_string())
    }
}

/// Reads the response body while enforcing a byte limit.
async fn read_response_limited(
    mut response: Response,
    max_bytes: usize,
) -> Result<Vec<u8>, DecisionError> {
    if let Some(expected) = response.content_length()
        && usize::try_from(expected).ok().is_none_or(|expected| expected > max_bytes)
    {
        return Err(DecisionError::TooLarge(max_bytes));
    }
    let mut buf = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(map_transport_error)? {
        if buf.len().saturating_add(chunk.len()) > max_bytes {
            return Err(DecisionError::TooLarge(max_bytes));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

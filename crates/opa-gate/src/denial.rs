// crates/opa-gate/src/denial.rs
// ============================================================================
// Module: Denial Response
// Description: Builds the configured response written when a request is denied.
// Purpose: Apply headers, forced content type, status, and encoded body.
// Dependencies: axum, bytes, opa-gate-config
// ============================================================================

//! ## Overview
//! The denial response is computed once from [`ErrorResponseConfig`] when the
//! gate is built; each denial clones it. Configured headers are applied first,
//! then `Content-Type` is set to the configured content type, so the
//! `contentType` field always wins over a `Content-Type` entry in the headers
//! map. When the configured body cannot be encoded, the encoder's error text
//! becomes the body. Without a configured body the response body is empty.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::body::Body;
use axum::http::HeaderMap;
use axum::http::HeaderName;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::Response;
use bytes::Bytes;
use opa_gate_config::ErrorResponseConfig;

use crate::encoder::encode_body;
use crate::error::GateError;

// ============================================================================
// SECTION: Denial Response
// ============================================================================

/// Precomputed denial response.
///
/// # Invariants
/// - `headers` carries exactly one `Content-Type`, the configured one.
/// - `body` is `None` when no body was configured.
#[derive(Debug, Clone)]
pub struct DenialResponse {
    /// Denial status code.
    status: StatusCode,
    /// Denial headers, including the forced content type.
    headers: HeaderMap,
    /// Encoded body, or the encoder error text.
    body: Option<Bytes>,
}

impl DenialResponse {
    /// Builds the denial response from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Config`] when the settings fail validation or are
    /// not valid HTTP.
    pub fn from_config(config: &ErrorResponseConfig) -> Result<Self, GateError> {
        config.validate()?;
        let status = StatusCode::from_u16(config.status_code).map_err(|_| {
            GateError::Config(format!("invalid denial status code {}", config.status_code))
        })?;
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| GateError::Config(format!("invalid denial header name: {name}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| GateError::Config(format!("invalid denial header value: {name}")))?;
            headers.insert(name, value);
        }
        let content_type = HeaderValue::from_str(&config.content_type)
            .map_err(|_| GateError::Config("invalid denial content type".to_string()))?;
        headers.insert(CONTENT_TYPE, content_type);
        let body = config.body.as_ref().map(|value| {
            encode_body(value, &config.content_type)
                .unwrap_or_else(|err| Bytes::from(err.to_string()))
        });
        Ok(Self {
            status,
            headers,
            body,
        })
    }

    /// Returns the denial status code.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the denial headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the denial body bytes, if a body is configured.
    #[must_use]
    pub const fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Builds a fresh HTTP response.
    #[must_use]
    pub fn to_response(&self) -> Response {
        let body = self.body.clone().map_or_else(Body::empty, Body::from);
        let mut response = Response::new(body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers.clone();
        response
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

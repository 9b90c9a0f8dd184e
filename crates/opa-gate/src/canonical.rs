// crates/opa-gate/src/canonical.rs
// ============================================================================
// Module: Request Canonicalizer
// Description: Maps inbound HTTP requests to authorization query documents.
// Purpose: Produce the structured `input` sent to the decision service.
// Dependencies: axum, bytes, http-body-util, urlencoding, url, base64
// ============================================================================

//! ## Overview
//! Canonicalization is purely structural: no validation, no size limits, no
//! content-type checks. The request body is drained into memory because HTTP
//! bodies are single-read streams; the request handed back to the caller is
//! rebuilt around the buffered bytes so it can still be forwarded unchanged.
//! Memory use is proportional to body size and bounded only by limits the
//! host enforces upstream.
//!
//! Path segmentation drops the first segment produced by splitting on `/`:
//! `/a/b` becomes `["a", "b"]`, `/` becomes `[""]`, and an empty path becomes
//! `[]`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use axum::body::Body;
use axum::http::HeaderMap;
use axum::http::Request;
use axum::http::Uri;
use axum::http::header::HOST;
use axum::http::request::Parts;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use http_body_util::BodyExt;
use serde::Serialize;
use serde::Serializer;
use serde_json::value::RawValue;

use crate::error::GateError;

// ============================================================================
// SECTION: Query Document
// ============================================================================

/// Canonical authorization query derived from one request.
///
/// # Invariants
/// - `body` is empty (never absent) when the request carried no body.
/// - Multi-valued headers and query parameters keep their received order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizationQuery {
    /// Request host, including a port when one was received.
    pub host: String,
    /// Path segments with the leading segment dropped.
    pub path: Vec<String>,
    /// Request method token.
    pub method: String,
    /// Header values keyed by canonical header name.
    pub headers: BTreeMap<String, Vec<String>>,
    /// Query parameter values keyed by parameter name.
    pub query: BTreeMap<String, Vec<String>>,
    /// Raw request body bytes.
    #[serde(serialize_with = "serialize_body")]
    pub body: Bytes,
}

impl AuthorizationQuery {
    /// Builds a query from request parts and already-buffered body bytes.
    #[must_use]
    pub fn from_parts(parts: &Parts, body: Bytes) -> Self {
        Self {
            host: request_host(&parts.uri, &parts.headers),
            path: split_path(parts.uri.path()),
            method: parts.method.as_str().to_string(),
            headers: collect_headers(&parts.headers),
            query: parse_query(parts.uri.query()),
            body,
        }
    }
}

// ============================================================================
// SECTION: Canonicalization
// ============================================================================

/// Drains the request body and builds the authorization query.
///
/// Returns the query together with a request rebuilt around the buffered body
/// so it can be forwarded unmodified.
///
/// # Errors
///
/// Returns [`GateError::RequestBody`] when the body stream fails.
pub async fn canonicalize(
    request: Request<Body>,
) -> Result<(AuthorizationQuery, Request<Body>), GateError> {
    let (parts, body) = request.into_parts();
    let bytes = body
        .collect()
        .await
        .map_err(|err| GateError::RequestBody(err.to_string()))?
        .to_bytes();
    let query = AuthorizationQuery::from_parts(&parts, bytes.clone());
    Ok((query, Request::from_parts(parts, Body::from(bytes))))
}

/// Splits a URL path on `/`, discarding the first segment.
///
/// The path is percent-decoded before splitting, so an encoded `%2F` splits
/// like a literal slash.
#[must_use]
pub fn split_path(path: &str) -> Vec<String> {
    let bytes = urlencoding::decode_binary(path.as_bytes());
    let decoded = String::from_utf8_lossy(&bytes);
    decoded.split('/').skip(1).map(str::to_string).collect()
}

/// Returns the request host: URI authority first, then the `Host` header.
#[must_use]
pub fn request_host(uri: &Uri, headers: &HeaderMap) -> String {
    if let Some(authority) = uri.authority() {
        return authority.as_str().to_string();
    }
    headers
        .get(HOST)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
        .unwrap_or_default()
}

/// Collects headers into a multi-valued map keyed by canonical name.
#[must_use]
pub fn collect_headers(headers: &HeaderMap) -> BTreeMap<String, Vec<String>> {
    let mut collected: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in headers {
        collected
            .entry(canonical_header_name(name.as_str()))
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    collected
}

/// Renders a header name in canonical MIME form (`x-request-id` becomes
/// `X-Request-Id`).
#[must_use]
pub fn canonical_header_name(name: &str) -> String {
    let mut upper = true;
    name.chars()
        .map(|ch| {
            let out = if upper { ch.to_ascii_uppercase() } else { ch.to_ascii_lowercase() };
            upper = ch == '-';
            out
        })
        .collect()
}

/// Parses a query string into a multi-valued map using form-urlencoded rules.
#[must_use]
pub fn parse_query(query: Option<&str>) -> BTreeMap<String, Vec<String>> {
    let mut parsed: BTreeMap<String, Vec<String>> = BTreeMap::new();
    if let Some(query) = query {
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            parsed.entry(key.into_owned()).or_default().push(value.into_owned());
        }
    }
    parsed
}

// ============================================================================
// SECTION: Body Wire Encoding
// ============================================================================

/// Serializes body bytes: valid JSON is embedded as-is, UTF-8 text becomes a
/// JSON string, anything else a base64 string.
fn serialize_body<S: Serializer>(body: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
    if let Ok(raw) = serde_json::from_slice::<&RawValue>(body) {
        return raw.serialize(serializer);
    }
    match std::str::from_utf8(body) {
        Ok(text) => serializer.serialize_str(text),
        Err(_) => serializer.serialize_str(&STANDARD.encode(body)),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

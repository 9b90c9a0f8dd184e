// crates/opa-gate/src/encoder.rs
// ============================================================================
// Module: Response Body Encoder
// Description: Encodes configured denial bodies for a target content type.
// Purpose: Turn a generic configured value into response bytes.
// Dependencies: bytes, serde_json
// ============================================================================

//! ## Overview
//! Denial bodies are configured as generic values. The encoder picks a body
//! format from the content type: the JSON family serializes the value as JSON,
//! the `text/*` family stringifies it. `text/*` is the only text family:
//! other non-JSON types such as `application/xml` or
//! `application/octet-stream` are rejected rather than guessed, and callers
//! surface the error text as the body.

// ============================================================================
// SECTION: Imports
// ============================================================================

use bytes::Bytes;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Body Formats
// ============================================================================

/// Body format selected from a content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFormat {
    /// JSON text (`application/json`, `*/*+json`, other JSON media types).
    Json,
    /// Plain text (`text/*`).
    Text,
}

impl BodyFormat {
    /// Selects the body format for a content type.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::UnsupportedContentType`] when the media type is
    /// malformed or outside the JSON and text families.
    pub fn from_content_type(content_type: &str) -> Result<Self, EncodeError> {
        let media_type = media_type(content_type);
        let Some((kind, subtype)) = media_type.split_once('/') else {
            return Err(EncodeError::UnsupportedContentType(content_type.to_string()));
        };
        if kind.is_empty() || subtype.is_empty() {
            return Err(EncodeError::UnsupportedContentType(content_type.to_string()));
        }
        if media_type.contains("json") {
            return Ok(Self::Json);
        }
        if kind == "text" {
            return Ok(Self::Text);
        }
        Err(EncodeError::UnsupportedContentType(content_type.to_string()))
    }
}

// ============================================================================
// SECTION: Encoding
// ============================================================================

/// Encodes a configured body value for the given content type.
///
/// # Errors
///
/// Returns [`EncodeError`] when the content type is unsupported or the value
/// cannot be serialized.
pub fn encode_body(value: &Value, content_type: &str) -> Result<Bytes, EncodeError> {
    match BodyFormat::from_content_type(content_type)? {
        BodyFormat::Json => serde_json::to_vec(value)
            .map(Bytes::from)
            .map_err(|err| EncodeError::Serialization(err.to_string())),
        BodyFormat::Text => stringify(value).map(Bytes::from),
    }
}

/// Best-effort string conversion for text bodies.
fn stringify(value: &Value) -> Result<String, EncodeError> {
    match value {
        Value::String(text) => Ok(text.clone()),
        Value::Null => Ok(String::new()),
        Value::Bool(flag) => Ok(flag.to_string()),
        Value::Number(number) => Ok(number.to_string()),
        Value::Array(_) | Value::Object(_) => {
            serde_json::to_string(value).map_err(|err| EncodeError::Serialization(err.to_string()))
        }
    }
}

/// Extracts the lowercase media type without parameters.
fn media_type(content_type: &str) -> String {
    content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase()
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Body encoding failures.
///
/// # Invariants
/// - Display text is written verbatim as a fallback response body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// Content type is not in a supported family.
    #[error("unsupported content type: {0}")]
    UnsupportedContentType(String),
    /// Value could not be serialized.
    #[error("body serialization failed: {0}")]
    Serialization(String),
}

// ============================================================================
// SECTION: Tests
// ============================================================================

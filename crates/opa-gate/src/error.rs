// crates/opa-gate/src/error.rs
// ============================================================================
// Module: Gate Errors
// Description: Error types for gate construction and request handling.
// Purpose: Provide stable error classification for gate failures.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! [`GateError`] covers failures that happen outside the decision call:
//! invalid configuration at construction time, outbound client setup, audit
//! sink setup, and unreadable request bodies. Request-time variants never
//! escape the gate; they are converted into denials.

// ============================================================================
// SECTION: Imports
// ============================================================================

use opa_gate_config::ConfigError;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Gate construction and request handling failures.
///
/// # Invariants
/// - Variants are stable for error classification.
#[derive(Debug, Error)]
pub enum GateError {
    /// Configuration is invalid.
    #[error("gate config invalid: {0}")]
    Config(String),
    /// Decision client could not be created.
    #[error("decision client unavailable: {0}")]
    Client(String),
    /// Audit sink could not be opened.
    #[error("audit sink unavailable: {0}")]
    Audit(String),
    /// Request body could not be read.
    #[error("request body unreadable: {0}")]
    RequestBody(String),
}

impl GateError {
    /// Returns a stable label for the error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Client(_) => "client",
            Self::Audit(_) => "audit",
            Self::RequestBody(_) => "request_body",
        }
    }
}

impl From<ConfigError> for GateError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

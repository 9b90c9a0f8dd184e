// crates/opa-gate/src/decision.rs
// ============================================================================
// Module: Decision Interpretation
// Description: Typed extraction of the allow verdict from a decision result.
// Purpose: Resolve every ambiguous decision shape to an explicit outcome.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! The decision result has no fixed schema; the verdict is read from the
//! configured allow field. Only a present boolean `true` allows. A `false`
//! value, a missing field, and a non-boolean value all deny, each with its own
//! [`DenyReason`] so audit output can tell them apart.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde_json::Value;

use crate::client::DecisionResult;

// ============================================================================
// SECTION: Verdict
// ============================================================================

/// Gate verdict for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowVerdict {
    /// Request may be forwarded.
    Allowed,
    /// Request must be denied.
    Denied(DenyReason),
}

impl AllowVerdict {
    /// Reads the verdict from `result[allow_field]`.
    #[must_use]
    pub fn from_result(result: &DecisionResult, allow_field: &str) -> Self {
        match result.get(allow_field) {
            Some(Value::Bool(true)) => Self::Allowed,
            Some(Value::Bool(false)) => Self::Denied(DenyReason::PolicyDenied),
            None => Self::Denied(DenyReason::AllowFieldMissing),
            Some(other) => Self::Denied(DenyReason::AllowFieldTypeMismatch {
                found: json_kind(other),
            }),
        }
    }

    /// Returns true when the verdict allows the request.
    #[must_use]
    pub const fn is_allowed(self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Why a request was denied.
///
/// # Invariants
/// - Labels are stable for audit and metrics output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// Allow field was present and `false`.
    PolicyDenied,
    /// Allow field was absent from the result.
    AllowFieldMissing,
    /// Allow field was present but not a boolean.
    AllowFieldTypeMismatch {
        /// JSON type found in place of a boolean.
        found: &'static str,
    },
    /// Decision service could not produce a decision.
    DecisionUnavailable,
    /// Inbound request body could not be read.
    RequestBody,
}

impl DenyReason {
    /// Returns a stable label for the reason.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::PolicyDenied => "policy_denied",
            Self::AllowFieldMissing => "allow_field_missing",
            Self::AllowFieldTypeMismatch {
                ..
            } => "allow_field_type_mismatch",
            Self::DecisionUnavailable => "decision_unavailable",
            Self::RequestBody => "request_body",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PolicyDenied => f.write_str("denied by policy"),
            Self::AllowFieldMissing => f.write_str("allow field missing from decision"),
            Self::AllowFieldTypeMismatch {
                found,
            } => write!(f, "allow field is {found}, expected boolean"),
            Self::DecisionUnavailable => f.write_str("decision unavailable"),
            Self::RequestBody => f.write_str("request body unreadable"),
        }
    }
}

/// Returns the JSON type name of a value.
const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

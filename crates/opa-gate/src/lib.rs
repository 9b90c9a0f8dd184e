// crates/opa-gate/src/lib.rs
// ============================================================================
// Module: OPA Gate
// Description: HTTP request authorization gate backed by a decision service.
// Purpose: Forward or deny requests based on an external policy decision.
// Dependencies: opa-gate-config, axum, tower, reqwest, serde_json
// ============================================================================

//! ## Overview
//! OPA Gate sits in front of a downstream handler. For every request it builds
//! a canonical authorization query, posts it to an external decision service,
//! and either forwards the untouched request or answers with the configured
//! denial response. Every failure path denies: an unreachable decision service
//! never results in an allow.
//!
//! The gate is exposed as a [`tower::Layer`] ([`OpaGateLayer`]) so it can wrap
//! an `axum::Router` or any other tower service stack. Hosts that are not
//! tower-based can call [`PolicyGate::authorize`] directly.
//!
//! Security posture: inbound requests and decision responses are untrusted;
//! all ambiguity resolves to deny.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod canonical;
pub mod client;
pub mod decision;
pub mod denial;
pub mod encoder;
pub mod error;
pub mod gate;
pub mod telemetry;


// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::GateAuditEvent;
pub use audit::GateAuditSink;
pub use audit::GateFileAuditSink;
pub use audit::GateNoopAuditSink;
pub use audit::GateStderrAuditSink;
pub use canonical::AuthorizationQuery;
pub use canonical::canonicalize;
pub use client::DecisionError;
pub use client::DecisionResult;
pub use client::DecisionService;
pub use client::HttpDecisionClient;
pub use decision::AllowVerdict;
pub use decision::DenyReason;
pub use denial::DenialResponse;
pub use encoder::EncodeError;
pub use encoder::encode_body;
pub use error::GateError;
pub use gate::GateOutcome;
pub use gate::OpaGate;
pub use gate::OpaGateLayer;
pub use gate::PolicyGate;
pub use opa_gate_config::GateConfig;
pub use telemetry::GATE_LATENCY_BUCKETS_MS;
pub use telemetry::GateDecision;
pub use telemetry::GateMetricEvent;
pub use telemetry::GateMetrics;
pub use telemetry::NoopGateMetrics;

// crates/opa-gate/src/telemetry.rs
// ============================================================================
// Module: Gate Telemetry
// Description: Observability hooks for gate decisions.
// Purpose: Provide metric events and latency buckets without hard deps.
// Dependencies: opa-gate
// ============================================================================

//! ## Overview
//! A thin metrics interface for decision counters and latency histograms.
//! Deployments plug in their own exporter by implementing [`GateMetrics`].
//! Labels carry decision and deny reason only; request data is never used as
//! a label.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use crate::decision::DenyReason;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default latency buckets in milliseconds for gate decision histograms.
pub const GATE_LATENCY_BUCKETS_MS: &[u64] =
    &[1, 2, 5, 10, 25, 50, 100, 250, 500, 1_000, 2_500, 5_000, 10_000, 30_000];

// ============================================================================
// SECTION: Metric Labels
// ============================================================================

/// Gate decision classification.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateDecision {
    /// Request forwarded downstream.
    Allow,
    /// Request answered with the denial response.
    Deny,
}

impl GateDecision {
    /// Returns a stable label for the decision.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
        }
    }
}

/// Gate decision metric event payload.
///
/// # Invariants
/// - `reason` is `Some` exactly when `decision` is [`GateDecision::Deny`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateMetricEvent {
    /// Gate decision.
    pub decision: GateDecision,
    /// Deny reason when denied.
    pub reason: Option<DenyReason>,
}

impl GateMetricEvent {
    /// Builds an allow event.
    #[must_use]
    pub const fn allow() -> Self {
        Self {
            decision: GateDecision::Allow,
            reason: None,
        }
    }

    /// Builds a deny event.
    #[must_use]
    pub const fn deny(reason: DenyReason) -> Self {
        Self {
            decision: GateDecision::Deny,
            reason: Some(reason),
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Metrics sink for gate decisions and latencies.
pub trait GateMetrics: Send + Sync {
    /// Records a decision counter event.
    fn record_decision(&self, event: GateMetricEvent);
    /// Records the time spent reaching the decision.
    fn record_latency(&self, event: GateMetricEvent, latency: Duration);
}

/// No-op metrics sink.
///
/// # Invariants
/// - Metrics are intentionally discarded.
pub struct NoopGateMetrics;

impl GateMetrics for NoopGateMetrics {
    fn record_decision(&self, _event: GateMetricEvent) {}

    fn record_latency(&self, _event: GateMetricEvent, _latency: Duration) {}
}

// crates/opa-gate/src/audit.rs
// ============================================================================
// Module: Gate Audit Logging
// Description: Structured audit events for gate decisions.
// Purpose: Emit one JSON line per decision without hard dependencies.
// Dependencies: serde, serde_json, opa-gate-config
// ============================================================================

//! ## Overview
//! Every request that passes through the gate produces one
//! [`GateAuditEvent`]. Events record the method, host, and path of the
//! request together with the decision and deny reason. Headers, query values,
//! and bodies are never logged. Sinks write JSON lines to stderr or to an
//! append-only file, or discard events entirely.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use opa_gate_config::AuditConfig;
use serde::Serialize;

use crate::decision::DenyReason;
use crate::error::GateError;
use crate::telemetry::GateDecision;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Gate decision audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct GateAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Request method.
    pub method: String,
    /// Request host, empty when unknown.
    pub host: String,
    /// Request path without the query string.
    pub path: String,
    /// Gate decision.
    pub decision: GateDecision,
    /// Deny reason label when denied.
    pub reason: Option<&'static str>,
    /// Failure detail when the decision service was unavailable.
    pub detail: Option<String>,
    /// Denial status code when denied.
    pub status: Option<u16>,
    /// Time spent reaching the decision in milliseconds.
    pub latency_ms: u128,
}

/// Inputs for building a [`GateAuditEvent`].
pub struct GateAuditEventParams {
    /// Request method.
    pub method: String,
    /// Request host.
    pub host: String,
    /// Request path without the query string.
    pub path: String,
    /// Gate decision.
    pub decision: GateDecision,
    /// Deny reason when denied.
    pub reason: Option<DenyReason>,
    /// Failure detail.
    pub detail: Option<String>,
    /// Denial status code when denied.
    pub status: Option<u16>,
    /// Time spent reaching the decision in milliseconds.
    pub latency_ms: u128,
}

impl GateAuditEvent {
    /// Creates a new audit event with a consistent timestamp.
    #[must_use]
    pub fn new(params: GateAuditEventParams) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self {
            event: "opa_gate_decision",
            timestamp_ms,
            method: params.method,
            host: params.host,
            path: params.path,
            decision: params.decision,
            reason: params.reason.map(DenyReason::label),
            detail: params.detail,
            status: params.status,
            latency_ms: params.latency_ms,
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for gate decision events.
pub trait GateAuditSink: Send + Sync {
    /// Record an audit event.
    fn record(&self, event: &GateAuditEvent);
}

/// Audit sink that logs JSON lines to stderr.
pub struct GateStderrAuditSink;

impl GateAuditSink for GateStderrAuditSink {
    fn record(&self, event: &GateAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct GateFileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl GateFileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl GateAuditSink for GateFileAuditSink {
    fn record(&self, event: &GateAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// No-op audit sink.
pub struct GateNoopAuditSink;

impl GateAuditSink for GateNoopAuditSink {
    fn record(&self, _event: &GateAuditEvent) {}
}

// ============================================================================
// SECTION: Construction
// ============================================================================

/// Builds the audit sink selected by configuration.
///
/// # Errors
///
/// Returns [`GateError::Audit`] when the audit file cannot be opened.
pub fn audit_sink_from_config(config: &AuditConfig) -> Result<Arc<dyn GateAuditSink>, GateError> {
    if !config.enabled {
        return Ok(Arc::new(GateNoopAuditSink));
    }
    match &config.path {
        Some(path) => {
            let sink = GateFileAuditSink::new(Path::new(path))
                .map_err(|err| GateError::Audit(format!("{path}: {err}")))?;
            Ok(Arc::new(sink))
        }
        None => Ok(Arc::new(GateStderrAuditSink)),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

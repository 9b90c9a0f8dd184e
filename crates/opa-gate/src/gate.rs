// crates/opa-gate/src/gate.rs
// ============================================================================
// Module: Policy Gate
// Description: Per-request authorization flow and tower middleware.
// Purpose: Forward allowed requests and answer denied ones.
// Dependencies: axum, tower, opa-gate-config
// ============================================================================

//! ## Overview
//! [`PolicyGate`] owns everything built once from configuration: the decision
//! client, the precomputed denial response, and the audit and metrics sinks.
//! [`PolicyGate::authorize`] runs the per-request flow: canonicalize the
//! request, ask the decision service, read the verdict, and either return the
//! untouched request for forwarding or a fresh denial response.
//!
//! [`OpaGateLayer`] wraps any tower service with the gate. The wrapped service
//! is only called for allowed requests; denied requests never reach it.
//!
//! Security posture: fail closed. A request is forwarded only when the
//! decision result holds a boolean `true` under the allow field.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;
use std::time::Instant;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use opa_gate_config::GateConfig;
use tower::Layer;
use tower::Service;

use crate::audit::GateAuditEvent;
use crate::audit::GateAuditEventParams;
use crate::audit::GateAuditSink;
use crate::audit::audit_sink_from_config;
use crate::canonical::canonicalize;
use crate::canonical::request_host;
use crate::client::DecisionService;
use crate::client::HttpDecisionClient;
use crate::decision::AllowVerdict;
use crate::decision::DenyReason;
use crate::denial::DenialResponse;
use crate::error::GateError;
use crate::telemetry::GateMetricEvent;
use crate::telemetry::GateMetrics;
use crate::telemetry::NoopGateMetrics;

// ============================================================================
// SECTION: Gate
// ============================================================================

/// Result of authorizing one request.
#[derive(Debug)]
pub enum GateOutcome {
    /// Request may be forwarded; the body is intact.
    Allowed(Request<Body>),
    /// Request was denied.
    Denied {
        /// Why the request was denied.
        reason: DenyReason,
        /// Denial response to return to the caller.
        response: Response,
    },
}

/// Authorization gate built from configuration.
///
/// # Invariants
/// - Shared read-only across concurrent requests.
/// - Every request yields exactly one audit event and one metric event.
pub struct PolicyGate {
    /// Key looked up in the decision result.
    allow_field: String,
    /// Decision service used for every request.
    decisions: Arc<dyn DecisionService>,
    /// Precomputed denial response.
    denial: DenialResponse,
    /// Audit sink for decision events.
    audit: Arc<dyn GateAuditSink>,
    /// Metrics sink for decision events.
    metrics: Arc<dyn GateMetrics>,
}

impl PolicyGate {
    /// Builds a gate that calls the configured HTTP decision service.
    ///
    /// # Errors
    ///
    /// Returns [`GateError`] when the configuration is invalid, the decision
    /// client cannot be built, or the audit sink cannot be opened.
    pub fn from_config(config: &GateConfig) -> Result<Self, GateError> {
        config.validate()?;
        let url = config.require_url()?;
        let client = HttpDecisionClient::new(url, &config.client)
            .map_err(|err| GateError::Client(err.to_string()))?;
        Self::with_decision_service(config, Arc::new(client))
    }

    /// Builds a gate around an existing decision service.
    ///
    /// The configured `url` is not required; the endpoint is owned by
    /// `decisions`.
    ///
    /// # Errors
    ///
    /// Returns [`GateError`] when the denial response is invalid or the audit
    /// sink cannot be opened.
    pub fn with_decision_service(
        config: &GateConfig,
        decisions: Arc<dyn DecisionService>,
    ) -> Result<Self, GateError> {
        if config.allow_field.is_empty() {
            return Err(GateError::Config("allowField must be non-empty".to_string()));
        }
        let denial = DenialResponse::from_config(&config.error_response)?;
        let audit = audit_sink_from_config(&config.audit)?;
        Ok(Self {
            allow_field: config.allow_field.clone(),
            decisions,
            denial,
            audit,
            metrics: Arc::new(NoopGateMetrics),
        })
    }

    /// Replaces the audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn GateAuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Replaces the metrics sink.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn GateMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Returns the precomputed denial response.
    #[must_use]
    pub const fn denial(&self) -> &DenialResponse {
        &self.denial
    }

    /// Returns the configured allow field.
    #[must_use]
    pub fn allow_field(&self) -> &str {
        &self.allow_field
    }

    /// Authorizes one request.
    ///
    /// Never fails: every error path resolves to [`GateOutcome::Denied`].
    pub async fn authorize(&self, request: Request<Body>) -> GateOutcome {
        let started = Instant::now();
        let target = RequestTarget::from_request(&request);
        let (outcome, detail) = match canonicalize(request).await {
            Err(err) => (self.deny(DenyReason::RequestBody), Some(err.to_string())),
            Ok((query, request)) => match self.decisions.decide(&query).await {
                Err(err) => (self.deny(DenyReason::DecisionUnavailable), Some(err.to_string())),
                Ok(result) => match AllowVerdict::from_result(&result, &self.allow_field) {
                    AllowVerdict::Allowed => (GateOutcome::Allowed(request), None),
                    AllowVerdict::Denied(
                        reason @ DenyReason::AllowFieldTypeMismatch {
                            ..
                        },
                    ) => (self.deny(reason), Some(reason.to_string())),
                    AllowVerdict::Denied(reason) => (self.deny(reason), None),
                },
            },
        };
        self.record(&outcome, target, detail, started);
        outcome
    }

    /// Builds a denied outcome.
    fn deny(&self, reason: DenyReason) -> GateOutcome {
        GateOutcome::Denied {
            reason,
            response: self.denial.to_response(),
        }
    }

    /// Emits the audit and metric events for an outcome.
    fn record(
        &self,
        outcome: &GateOutcome,
        target: RequestTarget,
        detail: Option<String>,
        started: Instant,
    ) {
        let latency = started.elapsed();
        let (event, status) = match outcome {
            GateOutcome::Allowed(_) => (GateMetricEvent::allow(), None),
            GateOutcome::Denied {
                reason,
                response,
            } => (GateMetricEvent::deny(*reason), Some(response.status().as_u16())),
        };
        self.metrics.record_decision(event);
        self.metrics.record_latency(event, latency);
        self.audit.record(&GateAuditEvent::new(GateAuditEventParams {
            method: target.method,
            host: target.host,
            path: target.path,
            decision: event.decision,
            reason: event.reason,
            detail,
            status,
            latency_ms: latency.as_millis(),
        }));
    }
}

/// Request fields captured for audit before the request is consumed.
struct RequestTarget {
    /// Request method.
    method: String,
    /// Request host.
    host: String,
    /// Request path without the query.
    path: String,
}

impl RequestTarget {
    /// Captures audit fields from a request.
    fn from_request(request: &Request<Body>) -> Self {
        Self {
            method: request.method().as_str().to_string(),
            host: request_host(request.uri(), request.headers()),
            path: request.uri().path().to_string(),
        }
    }
}

// ============================================================================
// SECTION: Tower Middleware
// ============================================================================

/// Tower layer that places a [`PolicyGate`] in front of a service.
#[derive(Clone)]
pub struct OpaGateLayer {
    /// Shared gate.
    gate: Arc<PolicyGate>,
}

impl OpaGateLayer {
    /// Creates a layer from a built gate.
    #[must_use]
    pub fn new(gate: PolicyGate) -> Self {
        Self {
            gate: Arc::new(gate),
        }
    }

    /// Builds the gate from configuration and wraps it in a layer.
    ///
    /// # Errors
    ///
    /// Returns [`GateError`] when the gate cannot be built.
    pub fn from_config(config: &GateConfig) -> Result<Self, GateError> {
        PolicyGate::from_config(config).map(Self::new)
    }
}

impl<S> Layer<S> for OpaGateLayer {
    type Service = OpaGate<S>;

    fn layer(&self, inner: S) -> Self::Service {
        OpaGate {
            inner,
            gate: Arc::clone(&self.gate),
        }
    }
}

/// Service produced by [`OpaGateLayer`].
#[derive(Clone)]
pub struct OpaGate<S> {
    /// Downstream service for allowed requests.
    inner: S,
    /// Shared gate.
    gate: Arc<PolicyGate>,
}

impl<S> Service<Request<Body>> for OpaGate<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let gate = Arc::clone(&self.gate);
        Box::pin(async move {
            match gate.authorize(request).await {
                GateOutcome::Allowed(request) => inner.call(request).await,
                GateOutcome::Denied {
                    response, ..
                } => Ok(response),
            }
        })
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;

// crates/opa-gate/src/gate/tests.rs
// ============================================================================
// Module: Policy Gate Tests
// Description: Unit tests for the per-request authorization flow.
// Purpose: Validate fail-closed outcomes, audit events, and metric events.
// Dependencies: opa-gate, axum, tower, tokio
// ============================================================================

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    reason = "Test-only assertions use unwrap/expect/panic for clarity."
)]

use std::convert::Infallible;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use axum::http::StatusCode;
use axum::response::Response;
use http_body_util::BodyExt;
use opa_gate_config::AuditConfig;
use opa_gate_config::GateConfig;
use serde_json::Value;
use serde_json::json;
use tower::ServiceExt;
use tower::service_fn;

use super::GateOutcome;
use super::OpaGateLayer;
use super::PolicyGate;
use crate::audit::GateAuditEvent;
use crate::audit::GateAuditSink;
use crate::canonical::AuthorizationQuery;
use crate::client::DecisionError;
use crate::client::DecisionResult;
use crate::client::DecisionService;
use crate::decision::DenyReason;
use crate::telemetry::GATE_LATENCY_BUCKETS_MS;
use crate::telemetry::GateDecision;
use crate::telemetry::GateMetricEvent;
use crate::telemetry::GateMetrics;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

struct FixedDecision {
    response: Result<Value, DecisionError>,
    seen: Mutex<Vec<AuthorizationQuery>>,
}

impl FixedDecision {
    fn result(value: Value) -> Arc<Self> {
        Arc::new(Self {
            response: Ok(value),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn error(err: DecisionError) -> Arc<Self> {
        Arc::new(Self {
            response: Err(err),
            seen: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl DecisionService for FixedDecision {
    async fn decide(&self, query: &AuthorizationQuery) -> Result<DecisionResult, DecisionError> {
        self.seen.lock().unwrap().push(query.clone());
        match &self.response {
            Ok(Value::Object(map)) => Ok(map.clone()),
            Ok(_) => Ok(DecisionResult::new()),
            Err(err) => Err(err.clone()),
        }
    }
}

#[derive(Default)]
struct RecordingAudit {
    events: Mutex<Vec<GateAuditEvent>>,
}

impl GateAuditSink for RecordingAudit {
    fn record(&self, event: &GateAuditEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

#[derive(Default)]
struct RecordingMetrics {
    decisions: Mutex<Vec<GateMetricEvent>>,
    latencies: Mutex<Vec<Duration>>,
}

impl GateMetrics for RecordingMetrics {
    fn record_decision(&self, event: GateMetricEvent) {
        self.decisions.lock().unwrap().push(event);
    }

    fn record_latency(&self, _event: GateMetricEvent, latency: Duration) {
        self.latencies.lock().unwrap().push(latency);
    }
}

fn quiet_config() -> GateConfig {
    GateConfig {
        audit: AuditConfig {
            enabled: false,
            path: None,
        },
        ..GateConfig::default()
    }
}

fn gate_with(decisions: Arc<dyn DecisionService>) -> PolicyGate {
    PolicyGate::with_decision_service(&quiet_config(), decisions).unwrap()
}

fn request() -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/orders/42?expand=items")
        .header("host", "shop.example")
        .body(Body::from("payload"))
        .unwrap()
}

fn denied_reason(outcome: GateOutcome) -> DenyReason {
    match outcome {
        GateOutcome::Denied {
            reason, ..
        } => reason,
        GateOutcome::Allowed(_) => panic!("expected denial"),
    }
}

// ============================================================================
// SECTION: Authorization Flow
// ============================================================================

#[tokio::test]
async fn allow_true_forwards_request_with_body() {
    let gate = gate_with(FixedDecision::result(json!({"allow": true})));
    let GateOutcome::Allowed(forwarded) = gate.authorize(request()).await else {
        panic!("expected allow");
    };
    assert_eq!(forwarded.uri(), "/orders/42?expand=items");
    let bytes = forwarded.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(bytes.as_ref(), b"payload");
}

#[tokio::test]
async fn decision_service_sees_canonical_query() {
    let decisions = FixedDecision::result(json!({"allow": true}));
    let gate = gate_with(decisions.clone());
    let _ = gate.authorize(request()).await;
    let seen = decisions.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].host, "shop.example");
    assert_eq!(seen[0].path, vec!["orders", "42"]);
    assert_eq!(seen[0].query["expand"], vec!["items"]);
}

#[tokio::test]
async fn ambiguous_verdicts_deny() {
    let cases = [
        (json!({"allow": false}), DenyReason::PolicyDenied),
        (json!({}), DenyReason::AllowFieldMissing),
        (
            json!({"allow": "true"}),
            DenyReason::AllowFieldTypeMismatch {
                found: "string",
            },
        ),
    ];
    for (result, expected) in cases {
        let gate = gate_with(FixedDecision::result(result));
        assert_eq!(denied_reason(gate.authorize(request()).await), expected);
    }
}

#[tokio::test]
async fn unavailable_decision_denies() {
    let gate = gate_with(FixedDecision::error(DecisionError::Timeout));
    assert_eq!(denied_reason(gate.authorize(request()).await), DenyReason::DecisionUnavailable);
}

#[tokio::test]
async fn custom_allow_field_is_used() {
    let config = GateConfig {
        allow_field: "permit".to_string(),
        ..quiet_config()
    };
    let decisions = FixedDecision::result(json!({"allow": false, "permit": true}));
    let gate = PolicyGate::with_decision_service(&config, decisions).unwrap();
    assert_eq!(gate.allow_field(), "permit");
    assert!(matches!(gate.authorize(request()).await, GateOutcome::Allowed(_)));
}

#[tokio::test]
async fn denial_uses_configured_response() {
    let mut config = quiet_config();
    config.error_response.status_code = 403;
    config.error_response.content_type = "text/plain".to_string();
    config.error_response.body = Some(json!("forbidden"));
    let gate =
        PolicyGate::with_decision_service(&config, FixedDecision::result(json!({}))).unwrap();
    let GateOutcome::Denied {
        response, ..
    } = gate.authorize(request()).await
    else {
        panic!("expected denial");
    };
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(gate.denial().status(), StatusCode::FORBIDDEN);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(bytes.as_ref(), b"forbidden");
}

#[test]
fn empty_allow_field_is_rejected() {
    let config = GateConfig {
        allow_field: String::new(),
        ..quiet_config()
    };
    let err = PolicyGate::with_decision_service(&config, FixedDecision::result(json!({})))
        .err()
        .expect("config error");
    assert_eq!(err.kind(), "config");
}

#[test]
fn from_config_requires_url() {
    let err = PolicyGate::from_config(&quiet_config()).err().expect("config error");
    assert_eq!(err.kind(), "config");
}

// ============================================================================
// SECTION: Audit and Metrics
// ============================================================================

#[tokio::test]
async fn every_request_emits_one_audit_and_metric_event() {
    let audit = Arc::new(RecordingAudit::default());
    let metrics = Arc::new(RecordingMetrics::default());
    let gate = gate_with(FixedDecision::error(DecisionError::Status(503)))
        .with_audit(audit.clone())
        .with_metrics(metrics.clone());
    let _ = gate.authorize(request()).await;
    let events = audit.events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].decision, GateDecision::Deny);
    assert_eq!(events[0].reason, Some("decision_unavailable"));
    assert_eq!(events[0].detail.as_deref(), Some("decision service returned status 503"));
    assert_eq!(events[0].status, Some(401));
    assert_eq!(events[0].path, "/orders/42");
    assert_eq!(events[0].host, "shop.example");
    assert_eq!(
        *metrics.decisions.lock().unwrap(),
        vec![GateMetricEvent::deny(DenyReason::DecisionUnavailable)]
    );
    assert_eq!(metrics.latencies.lock().unwrap().len(), 1);
}

#[test]
fn metric_labels_are_stable() {
    assert_eq!(GateDecision::Allow.as_str(), "allow");
    assert_eq!(GateDecision::Deny.as_str(), "deny");
    assert!(GATE_LATENCY_BUCKETS_MS.windows(2).all(|pair| pair[0] < pair[1]));
}

#[tokio::test]
async fn type_mismatch_denial_records_found_type() {
    let audit = Arc::new(RecordingAudit::default());
    let gate = gate_with(FixedDecision::result(json!({"allow": "yes"}))).with_audit(audit.clone());
    let _ = gate.authorize(request()).await;
    let events = audit.events.lock().unwrap();
    assert_eq!(events[0].reason, Some("allow_field_type_mismatch"));
    assert_eq!(events[0].detail.as_deref(), Some("allow field is string, expected boolean"));
}

#[tokio::test]
async fn policy_denial_has_no_detail() {
    let audit = Arc::new(RecordingAudit::default());
    let gate = gate_with(FixedDecision::result(json!({"allow": false}))).with_audit(audit.clone());
    let _ = gate.authorize(request()).await;
    let events = audit.events.lock().unwrap();
    assert_eq!(events[0].reason, Some("policy_denied"));
    assert!(events[0].detail.is_none());
}

#[test]
fn out_of_range_denial_status_is_rejected() {
    let mut config = quiet_config();
    config.error_response.status_code = 999;
    let err = PolicyGate::with_decision_service(&config, FixedDecision::result(json!({})))
        .err()
        .expect("config error");
    assert_eq!(err.kind(), "config");
}

#[tokio::test]
async fn allowed_request_is_audited_without_reason() {
    let audit = Arc::new(RecordingAudit::default());
    let gate = gate_with(FixedDecision::result(json!({"allow": true}))).with_audit(audit.clone());
    let _ = gate.authorize(request()).await;
    let events = audit.events.lock().unwrap();
    assert_eq!(events[0].decision, GateDecision::Allow);
    assert!(events[0].reason.is_none());
    assert!(events[0].status.is_none());
}

// ============================================================================
// SECTION: Tower Middleware
// ============================================================================

#[tokio::test]
async fn layer_calls_inner_service_only_when_allowed() {
    let calls = Arc::new(Mutex::new(0_u32));
    let counter = Arc::clone(&calls);
    let inner = service_fn(move |_request: Request<Body>| {
        let counter = Arc::clone(&counter);
        async move {
            *counter.lock().unwrap() += 1;
            Ok::<Response, Infallible>(Response::new(Body::from("downstream")))
        }
    });

    let allow = OpaGateLayer::new(gate_with(FixedDecision::result(json!({"allow": true}))));
    let response = tower::Layer::layer(&allow, inner.clone()).oneshot(request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let deny = OpaGateLayer::new(gate_with(FixedDecision::result(json!({"allow": false}))));
    let response = tower::Layer::layer(&deny, inner).oneshot(request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    assert_eq!(*calls.lock().unwrap(), 1);
}

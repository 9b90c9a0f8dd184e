// crates/opa-gate/tests/common/mod.rs
// =============================================================================
// Module: Gate Test Helpers
// Description: Mock decision service and downstream app for gate tests.
// Purpose: Drive the gate end to end over real HTTP decision calls.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    reason = "Test-only helpers use unwrap/expect for clarity."
)]

use std::sync::Arc;
use std::sync::Mutex;

use axum::Router;
use axum::body::Body;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::Method;
use axum::http::Request;
use axum::http::StatusCode;
use axum::http::Uri;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::post;
use http_body_util::BodyExt;
use opa_gate::OpaGateLayer;
use opa_gate::PolicyGate;
use opa_gate_config::AuditConfig;
use opa_gate_config::GateConfig;
use serde_json::Value;
use tokio::sync::oneshot;
use tower::ServiceExt;

/// Path the mock decision service listens on.
pub const DECISION_PATH: &str = "/v1/data/http/authz";

/// Running mock decision service.
pub struct MockDecisionService {
    /// Full decision endpoint URL.
    pub url: String,
    /// Decoded `input` documents received, in order.
    pub inputs: Arc<Mutex<Vec<Value>>>,
    /// Shutdown trigger.
    shutdown: Option<oneshot::Sender<()>>,
}

impl Drop for MockDecisionService {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

/// Canned decision response.
struct Canned {
    status: StatusCode,
    body: String,
    inputs: Arc<Mutex<Vec<Value>>>,
}

async fn decision_handler(State(state): State<Arc<Canned>>, body: Bytes) -> Response {
    if let Ok(payload) = serde_json::from_slice::<Value>(&body) {
        state.inputs.lock().unwrap().push(payload["input"].clone());
    }
    (state.status, [(CONTENT_TYPE, "application/json")], state.body.clone()).into_response()
}

/// Spawns a decision service answering every call with `status` and `body`.
pub async fn spawn_decision_service(
    status: StatusCode,
    body: impl Into<String>,
) -> MockDecisionService {
    let inputs = Arc::new(Mutex::new(Vec::new()));
    let state = Arc::new(Canned {
        status,
        body: body.into(),
        inputs: Arc::clone(&inputs),
    });
    let app = Router::new().route(DECISION_PATH, post(decision_handler)).with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await;
    });
    MockDecisionService {
        url: format!("http://{addr}{DECISION_PATH}"),
        inputs,
        shutdown: Some(shutdown_tx),
    }
}

/// Returns a URL on a port with nothing listening.
pub async fn unreachable_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    format!("http://{addr}{DECISION_PATH}")
}

/// Returns a config for `url` with audit output disabled.
pub fn gate_config(url: &str) -> GateConfig {
    let mut config = GateConfig::for_url(url);
    config.audit = AuditConfig {
        enabled: false,
        path: None,
    };
    config.client.timeout_ms = 1_000;
    config
}

/// Downstream handler echoing method, URI, and body.
async fn echo(method: Method, uri: Uri, body: Bytes) -> String {
    format!("{method} {uri} {}", String::from_utf8_lossy(&body))
}

/// Builds a downstream app wrapped by the gate.
pub fn gated_app(config: &GateConfig) -> Router {
    let gate = PolicyGate::from_config(config).expect("gate");
    Router::new().fallback(echo).layer(OpaGateLayer::new(gate))
}

/// Sends one request through the app and returns status, headers, and body.
pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Bytes) {
    let response = app.oneshot(request).await.expect("infallible");
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.expect("body").to_bytes();
    (status, headers, body)
}

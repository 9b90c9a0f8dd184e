// crates/opa-gate-config/tests/common/mod.rs
// =============================================================================
// Module: Config Test Helpers
// Description: Shared helpers for config validation tests.
// Purpose: Reduce duplication across integration tests for opa-gate-config.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use opa_gate_config::ConfigError;
use opa_gate_config::ConfigFormat;
use opa_gate_config::GateConfig;

/// Result type shared by config test suites.
pub type TestResult = Result<(), String>;

/// Parses a TOML string into a `GateConfig` for tests.
pub fn config_from_toml(toml_str: &str) -> Result<GateConfig, ConfigError> {
    GateConfig::parse(toml_str, ConfigFormat::Toml)
}

/// Returns a minimal valid config pointing at a local decision service.
pub fn minimal_config() -> Result<GateConfig, ConfigError> {
    config_from_toml("url = \"http://127.0.0.1:8181/v1/data/http/authz\"")
}

/// Asserts that validation failed with a message containing `needle`.
pub fn assert_invalid(result: Result<(), ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(()) => Err("expected invalid config".to_string()),
    }
}

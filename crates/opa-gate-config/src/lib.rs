// crates/opa-gate-config/src/lib.rs
// ============================================================================
// Module: OPA Gate Config Library
// Description: Canonical gate configuration model and validation.
// Purpose: Single source of truth for route-scoped gate settings.
// Dependencies: serde, serde_json, toml, url
// ============================================================================

//! ## Overview
//! `opa-gate-config` defines the configuration attached to a gated route: the
//! decision service endpoint, the allow field read from decisions, the denial
//! response, outbound client limits, and audit output. Validation is strict
//! and fails closed.
//!
//! Security posture: config inputs are untrusted until validated.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;

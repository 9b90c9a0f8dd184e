// crates/opa-gate-config/src/config.rs
// ============================================================================
// Module: OPA Gate Configuration
// Description: Configuration loading and validation for the OPA gate.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: serde, serde_json, toml, url
// ============================================================================

//! ## Overview
//! A [`GateConfig`] is created once when a route is attached and never mutated
//! afterwards. Every field is optional on the wire; defaults match the
//! documented shape (`allowField = "allow"`, status 401, `text/plain`).
//! Configuration may be loaded from TOML or JSON files with strict size and
//! path limits. Missing or invalid configuration fails closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default decision result field holding the verdict.
pub const DEFAULT_ALLOW_FIELD: &str = "allow";
/// Default denial status code (401 Unauthorized).
pub const DEFAULT_STATUS_CODE: u16 = 401;
/// Default denial content type.
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain";
/// Default outbound user agent.
pub const DEFAULT_USER_AGENT: &str = "opa-gate/0.1";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum number of configured denial headers.
pub(crate) const MAX_ERROR_HEADERS: usize = 64;
/// Maximum length of the allow field name.
pub(crate) const MAX_ALLOW_FIELD_LENGTH: usize = 256;
/// Default decision service connect timeout in milliseconds.
pub(crate) const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 500;
/// Default decision service request timeout in milliseconds.
pub(crate) const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 2_000;
/// Minimum decision service connect timeout in milliseconds.
pub(crate) const MIN_CONNECT_TIMEOUT_MS: u64 = 100;
/// Maximum decision service connect timeout in milliseconds.
pub(crate) const MAX_CONNECT_TIMEOUT_MS: u64 = 10_000;
/// Minimum decision service request timeout in milliseconds.
pub(crate) const MIN_REQUEST_TIMEOUT_MS: u64 = 100;
/// Maximum decision service request timeout in milliseconds.
pub(crate) const MAX_REQUEST_TIMEOUT_MS: u64 = 30_000;
/// Default maximum decision response size in bytes.
pub(crate) const DEFAULT_MAX_RESPONSE_BYTES: usize = 1024 * 1024;
/// Maximum allowed decision response size limit in bytes.
pub(crate) const MAX_MAX_RESPONSE_BYTES: usize = 16 * 1024 * 1024;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Route-scoped gate configuration.
///
/// # Invariants
/// - Immutable after [`GateConfig::validate`] succeeds.
/// - `url` must be present for a gate to be built.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GateConfig {
    /// Decision service endpoint.
    #[serde(default)]
    pub url: Option<String>,
    /// Decision result field holding the boolean verdict.
    #[serde(default = "default_allow_field")]
    pub allow_field: String,
    /// Response written when a request is denied.
    #[serde(default)]
    pub error_response: ErrorResponseConfig,
    /// Outbound decision client settings.
    #[serde(default)]
    pub client: DecisionClientConfig,
    /// Audit logging settings.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            url: None,
            allow_field: default_allow_field(),
            error_response: ErrorResponseConfig::default(),
            client: DecisionClientConfig::default(),
            audit: AuditConfig::default(),
        }
    }
}

impl GateConfig {
    /// Builds a default configuration targeting the given decision service.
    #[must_use]
    pub fn for_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Loads configuration from disk. Files ending in `.json` are parsed as
    /// JSON, everything else as TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        validate_path(path)?;
        let bytes = fs::read(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let config = Self::parse(content, ConfigFormat::from_path(path))?;
        config.validate()?;
        Ok(config)
    }

    /// Parses configuration text without validating it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the text is malformed.
    pub fn parse(content: &str, format: ConfigFormat) -> Result<Self, ConfigError> {
        match format {
            ConfigFormat::Toml => {
                toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))
            }
            ConfigFormat::Json => {
                serde_json::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))
            }
        }
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let Some(url) = &self.url else {
            return Err(ConfigError::Invalid("url is required".to_string()));
        };
        validate_decision_url(url)?;
        if self.allow_field.is_empty() {
            return Err(ConfigError::Invalid("allowField must be non-empty".to_string()));
        }
        if self.allow_field.len() > MAX_ALLOW_FIELD_LENGTH {
            return Err(ConfigError::Invalid("allowField too long".to_string()));
        }
        self.error_response.validate()?;
        self.client.validate()?;
        self.audit.validate()?;
        Ok(())
    }

    /// Returns the decision service URL, or an error when it is unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when `url` is absent.
    pub fn require_url(&self) -> Result<&str, ConfigError> {
        self.url.as_deref().ok_or_else(|| ConfigError::Invalid("url is required".to_string()))
    }
}

/// Configuration file formats accepted by [`GateConfig::load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML document.
    Toml,
    /// JSON document.
    Json,
}

impl ConfigFormat {
    /// Selects a format from a file extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Toml,
        }
    }
}

/// Denial response settings.
///
/// # Invariants
/// - When `body` is `None`, no body bytes are written.
/// - `content_type` always wins over a `Content-Type` entry in `headers`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ErrorResponseConfig {
    /// Headers applied verbatim to the denial response.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Denial status code.
    #[serde(default = "default_status_code")]
    pub status_code: u16,
    /// Denial content type.
    #[serde(default = "default_content_type")]
    pub content_type: String,
    /// Optional body value, encoded per `content_type`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl Default for ErrorResponseConfig {
    fn default() -> Self {
        Self {
            headers: BTreeMap::new(),
            status_code: default_status_code(),
            content_type: default_content_type(),
            body: None,
        }
    }
}

impl ErrorResponseConfig {
    /// Validates the denial response settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the status, content type, or a
    /// header is out of bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(100..=599).contains(&self.status_code) {
            return Err(ConfigError::Invalid(format!(
                "errorResponse.statusCode must be between 100 and 599, got {}",
                self.status_code
            )));
        }
        if self.content_type.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "errorResponse.contentType must be non-empty".to_string(),
            ));
        }
        if !is_header_value(&self.content_type) {
            return Err(ConfigError::Invalid(
                "errorResponse.contentType is not a valid header value".to_string(),
            ));
        }
        if self.headers.len() > MAX_ERROR_HEADERS {
            return Err(ConfigError::Invalid("too many errorResponse.headers".to_string()));
        }
        for (name, value) in &self.headers {
            if !is_header_name(name) {
                return Err(ConfigError::Invalid(format!(
                    "errorResponse.headers has invalid header name: {name}"
                )));
            }
            if !is_header_value(value) {
                return Err(ConfigError::Invalid(format!(
                    "errorResponse.headers.{name} is not a valid header value"
                )));
            }
        }
        Ok(())
    }
}

/// Outbound decision client settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DecisionClientConfig {
    /// Connect timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Total request timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub timeout_ms: u64,
    /// Maximum decision response body size in bytes.
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
    /// User agent sent to the decision service.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for DecisionClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            timeout_ms: default_request_timeout_ms(),
            max_response_bytes: default_max_response_bytes(),
            user_agent: default_user_agent(),
        }
    }
}

impl DecisionClientConfig {
    /// Validates client timeouts and limits.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_timeout_range(
            "client.connectTimeoutMs",
            self.connect_timeout_ms,
            MIN_CONNECT_TIMEOUT_MS,
            MAX_CONNECT_TIMEOUT_MS,
        )?;
        validate_timeout_range(
            "client.timeoutMs",
            self.timeout_ms,
            MIN_REQUEST_TIMEOUT_MS,
            MAX_REQUEST_TIMEOUT_MS,
        )?;
        if self.max_response_bytes == 0 || self.max_response_bytes > MAX_MAX_RESPONSE_BYTES {
            return Err(ConfigError::Invalid(format!(
                "client.maxResponseBytes must be between 1 and {MAX_MAX_RESPONSE_BYTES}"
            )));
        }
        if !is_header_value(&self.user_agent) {
            return Err(ConfigError::Invalid(
                "client.userAgent is not a valid header value".to_string(),
            ));
        }
        Ok(())
    }
}

/// Audit logging configuration for gate decisions.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AuditConfig {
    /// Enable structured audit logging.
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,
    /// Optional audit log path (JSON lines). Stderr when absent.
    #[serde(default)]
    pub path: Option<String>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
            path: None,
        }
    }
}

impl AuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            validate_path_string("audit.path", path)?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML or JSON parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Validates the decision service URL.
fn validate_decision_url(value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value).map_err(|_| ConfigError::Invalid("url is invalid".to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ConfigError::Invalid(format!("url scheme not supported: {other}")));
        }
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(ConfigError::Invalid("url credentials are not allowed".to_string()));
    }
    if url.host_str().is_none() {
        return Err(ConfigError::Invalid("url host required".to_string()));
    }
    Ok(())
}

/// Validates the config file path.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let path_str = path.to_string_lossy();
    if path_str.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        if component.as_os_str().to_string_lossy().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a configured path string.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().to_string_lossy().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates a timeout against an inclusive range.
fn validate_timeout_range(
    field: &str,
    value_ms: u64,
    min_ms: u64,
    max_ms: u64,
) -> Result<(), ConfigError> {
    if value_ms < min_ms || value_ms > max_ms {
        return Err(ConfigError::Invalid(format!(
            "{field} must be between {min_ms} and {max_ms} milliseconds",
        )));
    }
    Ok(())
}

/// Returns true when the string is a valid HTTP header name token.
fn is_header_name(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(is_token_byte)
}

/// Returns true when the byte is an RFC 9110 `tchar`.
const fn is_token_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric()
        || matches!(
            byte,
            b'!' | b'#'
                | b'$'
                | b'%'
                | b'&'
                | b'\''
                | b'*'
                | b'+'
                | b'-'
                | b'.'
                | b'^'
                | b'_'
                | b'`'
                | b'|'
                | b'~'
        )
}

/// Returns true when the string can be used as an HTTP header value.
fn is_header_value(value: &str) -> bool {
    value.bytes().all(|byte| byte == b'\t' || (byte >= 0x20 && byte != 0x7f))
}

/// Default allow field name.
fn default_allow_field() -> String {
    DEFAULT_ALLOW_FIELD.to_string()
}

/// Default denial status code.
const fn default_status_code() -> u16 {
    DEFAULT_STATUS_CODE
}

/// Default denial content type.
fn default_content_type() -> String {
    DEFAULT_CONTENT_TYPE.to_string()
}

/// Default connect timeout.
const fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

/// Default request timeout.
const fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

/// Default decision response size limit.
const fn default_max_response_bytes() -> usize {
    DEFAULT_MAX_RESPONSE_BYTES
}

/// Default outbound user agent.
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

/// Default audit logging enabled.
const fn default_audit_enabled() -> bool {
    true
}

// ============================================================================
// SECTION: Tests
// ============================================================================

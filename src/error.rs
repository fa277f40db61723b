//! Error Normalization
//!
//! Every failure an admission check can raise, and any unclassified failure
//! bubbling up from deeper layers, funnels through this module exactly once
//! and leaves as the same wire shape:
//!
//! ```json
//! { "success": false, "error": { "message": "...", "code": "...", "details": [...] } }
//! ```
//!
//! Only `code`, `message`, and the optional `details` vary by failure kind;
//! the envelope never does. Classification follows a fixed priority order so
//! a failure matching an earlier rule is never reclassified by a later one:
//!
//! 1. schema validation failure        -> 400 `VALIDATION_ERROR` (+ details)
//! 2. malformed identifier/reference   -> 400 `INVALID_ID`
//! 3. uniqueness conflict              -> 409 `DUPLICATE_KEY` (names the field)
//! 4. token malformed or forged        -> 401 `INVALID_TOKEN`
//! 5. token expired                    -> 401 `TOKEN_EXPIRED`
//! 6. anything else                    -> 500 `INTERNAL_ERROR`
//!
//! Each normalized failure is logged once. Internal source chains appear in
//! logs and response bodies only under a development configuration; in
//! production the body carries a generic message and the log carries the
//! sanitized summary.

use std::fmt;
use std::sync::OnceLock;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::config::Environment;
use crate::credential::CredentialError;
use crate::schema::{SchemaError, Violations};
use crate::store::StoreError;
use crate::token::TokenError;

// ============================================================================
// Render Mode
// ============================================================================

// Set once at startup; read-only afterwards. Defaults to production so an
// uninitialized process never leaks internal detail.
static RENDER_MODE: OnceLock<Environment> = OnceLock::new();

/// Set the render mode once at startup.
///
/// ```ignore
/// portcullis::error::init(config.environment());
/// ```
pub fn init(environment: Environment) {
    let _ = RENDER_MODE.set(environment);
}

/// The active render mode. Production unless [`init`] said otherwise.
pub fn render_mode() -> Environment {
    RENDER_MODE.get().copied().unwrap_or(Environment::Production)
}

// ============================================================================
// Error Type
// ============================================================================

/// Every failure kind admission can emit, one variant per taxonomy entry.
///
/// The closed set is deliberate: the normalizer matches exhaustively, so a
/// new kind cannot silently fall through to the generic 500 arm the way a
/// misspelled string check would.
#[derive(Debug)]
pub enum AdmissionError {
    /// Schema rule violations; recoverable by the caller resubmitting
    Validation(Violations),
    /// A reference (path id, foreign key) that does not parse
    InvalidId { message: String },
    /// A write collided with an existing unique value
    Duplicate { field: String },
    /// Token malformed or signature mismatch; treated as hostile
    InvalidToken,
    /// Token past its embedded expiry; prompt re-login
    TokenExpired,
    /// Anything unclassified from deeper layers
    Internal {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Request context attached to the failure log record.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Request path
    pub path: String,
    /// HTTP method
    pub method: String,
}

impl AdmissionError {
    /// A malformed reference, with a caller-supplied description.
    pub fn invalid_id(message: impl Into<String>) -> Self {
        Self::InvalidId {
            message: message.into(),
        }
    }

    /// An unclassified failure without a source error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// An unclassified failure wrapping its source error.
    pub fn internal_from(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Stable machine-readable code for client-side branching.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidId { .. } => "INVALID_ID",
            Self::Duplicate { .. } => "DUPLICATE_KEY",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// HTTP status for the normalized response.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::InvalidId { .. } => StatusCode::BAD_REQUEST,
            Self::Duplicate { .. } => StatusCode::CONFLICT,
            Self::InvalidToken => StatusCode::UNAUTHORIZED,
            Self::TokenExpired => StatusCode::UNAUTHORIZED,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Produce the wire response for the active render mode.
    pub fn normalize(&self) -> NormalizedError {
        self.normalize_for(render_mode())
    }

    /// Produce the wire response for an explicit render mode.
    ///
    /// Pure: no logging, no state. Calling it twice on the same failure
    /// yields the same classification and body.
    pub fn normalize_for(&self, mode: Environment) -> NormalizedError {
        let (message, details) = match self {
            Self::Validation(violations) => (
                "Request validation failed".to_string(),
                Some(
                    violations
                        .iter()
                        .map(|v| FieldDetail {
                            field: v.field.clone(),
                            message: v.message.clone(),
                        })
                        .collect(),
                ),
            ),
            Self::InvalidId { message } => (message.clone(), None),
            Self::Duplicate { field } => {
                (format!("A record with this {} already exists", field), None)
            }
            Self::InvalidToken => ("Invalid session token".to_string(), None),
            Self::TokenExpired => {
                ("Session expired, please sign in again".to_string(), None)
            }
            Self::Internal { message, source } => {
                if mode.is_production() {
                    ("An internal error occurred".to_string(), None)
                } else {
                    let message = match source {
                        Some(source) => format!("{}: {}", message, source),
                        None => message.clone(),
                    };
                    (message, None)
                }
            }
        };

        NormalizedError {
            status: self.status(),
            body: ErrorBody {
                success: false,
                error: ErrorDetail {
                    message,
                    code: self.code().to_string(),
                    details,
                },
            },
        }
    }

    /// Log this failure once, with request context when available.
    ///
    /// Internal failures log at error level with their source chain in
    /// development mode only; token rejections log at warn; client-side
    /// failures at debug.
    pub fn log(&self, context: Option<&RequestContext>) {
        let path = context.map(|c| c.path.as_str()).unwrap_or("-");
        let method = context.map(|c| c.method.as_str()).unwrap_or("-");

        match self {
            Self::Internal { message, source } => {
                if render_mode().is_production() {
                    tracing::error!(
                        code = self.code(),
                        path = path,
                        method = method,
                        message = %message,
                        "Unclassified failure"
                    );
                } else {
                    let source = source
                        .as_ref()
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "none".to_string());
                    tracing::error!(
                        code = self.code(),
                        path = path,
                        method = method,
                        message = %message,
                        source = %source,
                        "Unclassified failure"
                    );
                }
            }
            Self::InvalidToken | Self::TokenExpired => {
                tracing::warn!(
                    code = self.code(),
                    path = path,
                    method = method,
                    "Token rejected"
                );
            }
            _ => {
                tracing::debug!(
                    code = self.code(),
                    path = path,
                    method = method,
                    message = %self,
                    "Request rejected"
                );
            }
        }
    }
}

impl fmt::Display for AdmissionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(violations) => write!(f, "validation failed: {}", violations),
            Self::InvalidId { message } => write!(f, "{}", message),
            Self::Duplicate { field } => write!(f, "duplicate value for '{}'", field),
            Self::InvalidToken => write!(f, "invalid session token"),
            Self::TokenExpired => write!(f, "session token expired"),
            Self::Internal { message, .. } => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for AdmissionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Internal { source, .. } => source.as_ref().map(|s| s.as_ref() as _),
            _ => None,
        }
    }
}

// ============================================================================
// Wire Shape
// ============================================================================

/// A classified failure ready to send: status plus body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedError {
    /// HTTP status to respond with
    #[serde(skip)]
    pub status: StatusCode,
    /// JSON body
    #[serde(flatten)]
    pub body: ErrorBody,
}

/// The envelope: fixed shape for every failure kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    /// Always `false`
    pub success: bool,
    /// The varying part
    pub error: ErrorDetail,
}

/// The varying part of the envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorDetail {
    /// Human-readable message
    pub message: String,
    /// Stable machine-readable code
    pub code: String,
    /// Field-level details, present for validation failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldDetail>>,
}

/// One field-level detail entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDetail {
    /// Violated field
    pub field: String,
    /// What the field violated
    pub message: String,
}

impl IntoResponse for AdmissionError {
    fn into_response(self) -> Response {
        self.log(None);
        let normalized = self.normalize();
        (normalized.status, Json(normalized.body)).into_response()
    }
}

impl IntoResponse for NormalizedError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

// ============================================================================
// Conversions
// ============================================================================

impl From<Violations> for AdmissionError {
    fn from(violations: Violations) -> Self {
        Self::Validation(violations)
    }
}

impl From<SchemaError> for AdmissionError {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::Invalid(violations) => Self::Validation(violations),
            // unregistered schema or rule is caller wiring, not client input
            other => Self::internal(other.to_string()),
        }
    }
}

impl From<TokenError> for AdmissionError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => Self::TokenExpired,
            TokenError::Malformed | TokenError::SignatureInvalid => Self::InvalidToken,
            TokenError::Signing(detail) => Self::internal(format!("token signing failed: {}", detail)),
        }
    }
}

impl From<StoreError> for AdmissionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateIdentity { field } => Self::Duplicate { field },
            StoreError::Backend(detail) => Self::internal(format!("credential store failure: {}", detail)),
        }
    }
}

impl From<CredentialError> for AdmissionError {
    fn from(err: CredentialError) -> Self {
        Self::internal(err.to_string())
    }
}

// ============================================================================
// Result Alias
// ============================================================================

/// Result alias for admission operations.
pub type Result<T> = std::result::Result<T, AdmissionError>;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Violation, ViolationCode};

    fn violations() -> Violations {
        let mut v = Violations::new();
        v.push(Violation::new("title", ViolationCode::Required, "field is required"));
        v.push(Violation::new("due", ViolationCode::Required, "field is required"));
        v
    }

    #[test]
    fn classification_table() {
        assert_eq!(
            AdmissionError::Validation(violations()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AdmissionError::invalid_id("Invalid task id").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AdmissionError::Duplicate { field: "email".into() }.status(),
            StatusCode::CONFLICT
        );
        assert_eq!(AdmissionError::InvalidToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AdmissionError::TokenExpired.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AdmissionError::internal("boom").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(AdmissionError::Validation(violations()).code(), "VALIDATION_ERROR");
        assert_eq!(AdmissionError::invalid_id("x").code(), "INVALID_ID");
        assert_eq!(
            AdmissionError::Duplicate { field: "email".into() }.code(),
            "DUPLICATE_KEY"
        );
        assert_eq!(AdmissionError::InvalidToken.code(), "INVALID_TOKEN");
        assert_eq!(AdmissionError::TokenExpired.code(), "TOKEN_EXPIRED");
        assert_eq!(AdmissionError::internal("x").code(), "INTERNAL_ERROR");
    }

    #[test]
    fn validation_body_carries_field_details() {
        let err = AdmissionError::Validation(violations());
        let normalized = err.normalize_for(Environment::Production);

        assert_eq!(normalized.status, StatusCode::BAD_REQUEST);
        assert!(!normalized.body.success);
        assert_eq!(normalized.body.error.code, "VALIDATION_ERROR");

        let details = normalized.body.error.details.unwrap();
        assert_eq!(details.len(), 2);
        assert_eq!(details[0].field, "title");
        assert_eq!(details[1].field, "due");
    }

    #[test]
    fn duplicate_message_names_the_field() {
        let err = AdmissionError::Duplicate { field: "email".into() };
        let normalized = err.normalize_for(Environment::Production);

        assert_eq!(normalized.status, StatusCode::CONFLICT);
        assert!(normalized.body.error.message.contains("email"));
    }

    #[test]
    fn expired_and_invalid_tokens_render_distinct_messages() {
        let invalid = AdmissionError::InvalidToken.normalize_for(Environment::Production);
        let expired = AdmissionError::TokenExpired.normalize_for(Environment::Production);

        assert_eq!(invalid.status, StatusCode::UNAUTHORIZED);
        assert_eq!(expired.status, StatusCode::UNAUTHORIZED);
        assert_ne!(invalid.body.error.message, expired.body.error.message);
    }

    #[test]
    fn internal_detail_withheld_in_production() {
        let io = std::io::Error::other("connection refused to db-primary:27017");
        let err = AdmissionError::internal_from("store write failed", io);

        let body = err.normalize_for(Environment::Production).body;
        assert_eq!(body.error.message, "An internal error occurred");
        assert!(!body.error.message.contains("27017"));
        assert!(body.error.details.is_none());
    }

    #[test]
    fn internal_detail_exposed_in_development() {
        let io = std::io::Error::other("connection refused");
        let err = AdmissionError::internal_from("store write failed", io);

        let body = err.normalize_for(Environment::Development).body;
        assert!(body.error.message.contains("store write failed"));
        assert!(body.error.message.contains("connection refused"));
    }

    #[test]
    fn normalization_is_idempotent() {
        let err = AdmissionError::Validation(violations());
        let first = err.normalize_for(Environment::Production);
        let second = err.normalize_for(Environment::Production);
        assert_eq!(first, second);
    }

    #[test]
    fn envelope_shape_is_fixed() {
        for err in [
            AdmissionError::Validation(violations()),
            AdmissionError::invalid_id("bad id"),
            AdmissionError::Duplicate { field: "email".into() },
            AdmissionError::InvalidToken,
            AdmissionError::TokenExpired,
            AdmissionError::internal("boom"),
        ] {
            let body = err.normalize_for(Environment::Production).body;
            let json = serde_json::to_value(&body).unwrap();

            assert_eq!(json["success"], false);
            assert!(json["error"]["message"].is_string());
            assert!(json["error"]["code"].is_string());
        }
    }

    #[test]
    fn token_error_conversion() {
        assert!(matches!(
            AdmissionError::from(TokenError::Expired),
            AdmissionError::TokenExpired
        ));
        assert!(matches!(
            AdmissionError::from(TokenError::Malformed),
            AdmissionError::InvalidToken
        ));
        assert!(matches!(
            AdmissionError::from(TokenError::SignatureInvalid),
            AdmissionError::InvalidToken
        ));
        assert!(matches!(
            AdmissionError::from(TokenError::Signing("bad key".into())),
            AdmissionError::Internal { .. }
        ));
    }

    #[test]
    fn store_error_conversion() {
        assert!(matches!(
            AdmissionError::from(StoreError::DuplicateIdentity { field: "email".into() }),
            AdmissionError::Duplicate { .. }
        ));
        assert!(matches!(
            AdmissionError::from(StoreError::Backend("down".into())),
            AdmissionError::Internal { .. }
        ));
    }

    #[test]
    fn schema_error_conversion() {
        let err = AdmissionError::from(SchemaError::UnknownSchema("ghost".into()));
        assert!(matches!(err, AdmissionError::Internal { .. }));

        let err = AdmissionError::from(SchemaError::Invalid(violations()));
        assert!(matches!(err, AdmissionError::Validation(_)));
    }
}

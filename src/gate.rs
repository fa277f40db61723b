//! Admission Facade
//!
//! [`Gate`] is the single entry point route handlers call: it bundles the
//! process configuration, the schema registry, the token service, and the
//! injected credential store, and funnels every failure into
//! [`AdmissionError`] so the response shape is uniform no matter which check
//! rejected the request.
//!
//! Hashing and verification are deliberately slow, CPU-bound operations; the
//! facade runs them on the blocking pool so one registration never stalls
//! unrelated requests on the async executor. Validation, normalization, and
//! token math run inline.
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use portcullis::config::AdmissionConfig;
//! use portcullis::gate::{AuthDecision, Gate};
//! use portcullis::store::MemoryStore;
//!
//! let gate = Gate::new(AdmissionConfig::from_env()?, registry, Arc::new(MemoryStore::new()));
//!
//! // in a login handler
//! let clean = gate.validate("auth.login", &body)?;
//! match gate.authenticate(clean["email"].as_str().unwrap(), password).await? {
//!     AuthDecision::Granted { token, .. } => { /* respond with the token */ }
//!     AuthDecision::Denied => { /* respond 401 invalid credentials */ }
//! }
//! ```

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::config::AdmissionConfig;
use crate::credential;
use crate::error::{AdmissionError, Result};
use crate::events::SecurityEvent;
use crate::schema::{is_valid_identifier, SchemaRegistry};
use crate::security_event;
use crate::store::CredentialStore;
use crate::token::TokenService;

// ============================================================================
// Authentication Outcome
// ============================================================================

/// Outcome of a credential check.
///
/// A wrong password or unknown identity is a *decision*, not an error: the
/// caller renders its own invalid-credentials response. Only infrastructure
/// failures (store down, hasher rejected) surface as [`AdmissionError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision {
    /// Credentials verified; a session token was issued
    Granted {
        /// Subject the credentials map to
        subject_id: String,
        /// Freshly issued session token
        token: String,
    },
    /// Unknown identity or credential mismatch; the two are indistinguishable
    /// to the caller by design
    Denied,
}

// ============================================================================
// Gate
// ============================================================================

/// The admission facade. Construct once at startup and share.
pub struct Gate {
    config: AdmissionConfig,
    registry: Arc<SchemaRegistry>,
    tokens: TokenService,
    store: Arc<dyn CredentialStore>,
}

impl Gate {
    /// Assemble the facade from its parts.
    ///
    /// Also fixes the error render mode to the configured environment, so
    /// normalized responses and the configuration always agree.
    pub fn new(
        config: AdmissionConfig,
        registry: SchemaRegistry,
        store: Arc<dyn CredentialStore>,
    ) -> Self {
        crate::error::init(config.environment());
        let tokens = TokenService::new(config.secret(), config.token_ttl());
        Self {
            config,
            registry: Arc::new(registry),
            tokens,
            store,
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &AdmissionConfig {
        &self.config
    }

    /// The schema registry.
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    // ========================================================================
    // Validation
    // ========================================================================

    /// Validate raw input against a named schema.
    ///
    /// Returns the sanitized, coerced record on success; on failure, every
    /// violated rule at once, normalized to `VALIDATION_ERROR`.
    pub fn validate(&self, schema_name: &str, input: &Value) -> Result<Map<String, Value>> {
        self.registry.validate(schema_name, input).map_err(|err| {
            let err = AdmissionError::from(err);
            if matches!(err, AdmissionError::Validation(_)) {
                security_event!(
                    SecurityEvent::ValidationRejected,
                    schema = schema_name,
                    "Input rejected by schema"
                );
            }
            err
        })
    }

    /// Check a reference identifier (path id, foreign key) for shape.
    ///
    /// Malformed identifiers normalize to `INVALID_ID`, distinct from
    /// field-level validation failures.
    pub fn parse_identifier(&self, raw: &str) -> Result<String> {
        if is_valid_identifier(raw) {
            Ok(raw.to_string())
        } else {
            Err(AdmissionError::invalid_id("Invalid identifier"))
        }
    }

    // ========================================================================
    // Credentials
    // ========================================================================

    /// Hash a plaintext secret on the blocking pool.
    pub async fn hash_password(&self, plaintext: &str) -> Result<String> {
        let plaintext = plaintext.to_string();
        tokio::task::spawn_blocking(move || credential::hash(&plaintext))
            .await
            .map_err(|e| AdmissionError::internal(format!("hash task failed: {}", e)))?
            .map_err(AdmissionError::from)
    }

    /// Verify a plaintext secret against a stored record on the blocking
    /// pool. Never errors; anything unverifiable is `false`.
    pub async fn verify_password(&self, plaintext: &str, stored: &str) -> bool {
        let plaintext = plaintext.to_string();
        let stored = stored.to_string();
        tokio::task::spawn_blocking(move || credential::verify(&plaintext, &stored))
            .await
            .unwrap_or(false)
    }

    // ========================================================================
    // Tokens
    // ========================================================================

    /// Issue a session token for a subject using the configured ttl.
    pub fn issue_token(&self, subject_id: &str) -> Result<String> {
        let token = self.tokens.issue(subject_id, None)?;
        security_event!(
            SecurityEvent::TokenIssued,
            subject_id = %subject_id,
            "Session token issued"
        );
        Ok(token)
    }

    /// Verify a session token and return the subject it asserts.
    pub fn verify_token(&self, token: &str) -> Result<String> {
        match self.tokens.verify(token) {
            Ok(claims) => Ok(claims.sub),
            Err(err) => {
                security_event!(
                    SecurityEvent::TokenRejected,
                    reason = %err,
                    "Session token rejected"
                );
                Err(err.into())
            }
        }
    }

    // ========================================================================
    // Admission Flows
    // ========================================================================

    /// Create a credential record for a new identity.
    ///
    /// Returns the generated subject id. A collision with an existing
    /// identity normalizes to `DUPLICATE_KEY` naming the unique field.
    pub async fn register(&self, identity: &str, password: &str) -> Result<String> {
        let record = self.hash_password(password).await?;
        let subject_id = uuid::Uuid::new_v4().to_string();

        self.store
            .create_identity(identity, &subject_id, &record)
            .await?;

        security_event!(
            SecurityEvent::CredentialCreated,
            identity = %identity,
            subject_id = %subject_id,
            "Credential record created"
        );
        Ok(subject_id)
    }

    /// Verify a login attempt and, on success, issue a session token.
    ///
    /// An unknown identity and a wrong password both come back as
    /// [`AuthDecision::Denied`]; the caller must not distinguish them.
    pub async fn authenticate(&self, identity: &str, password: &str) -> Result<AuthDecision> {
        let Some(found) = self.store.find_identity(identity).await? else {
            security_event!(
                SecurityEvent::AuthenticationFailure,
                identity = %identity,
                reason = "unknown_identity",
                "Authentication failed"
            );
            return Ok(AuthDecision::Denied);
        };

        if !self.verify_password(password, &found.credential).await {
            security_event!(
                SecurityEvent::AuthenticationFailure,
                identity = %identity,
                reason = "credential_mismatch",
                "Authentication failed"
            );
            return Ok(AuthDecision::Denied);
        }

        let token = self.issue_token(&found.subject_id)?;
        security_event!(
            SecurityEvent::AuthenticationSuccess,
            identity = %identity,
            subject_id = %found.subject_id,
            "Credentials verified"
        );
        Ok(AuthDecision::Granted {
            subject_id: found.subject_id,
            token,
        })
    }
}

impl std::fmt::Debug for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gate")
            .field("registry", &self.registry)
            .field("tokens", &self.tokens)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use crate::schema::{FieldRule, Schema};
    use crate::store::MemoryStore;
    use serde_json::json;

    fn test_gate() -> Gate {
        let config = AdmissionConfig::builder()
            .secret("kV8#mQ2pL9@wX4tR7!zN3cF6hJ1bY5dG0sA8eU2iO7&nM4xK")
            .environment(Environment::Development)
            .build()
            .unwrap();

        let mut registry = SchemaRegistry::new();
        registry.register(
            Schema::builder("auth.register")
                .strict()
                .field(FieldRule::email("email").required())
                .field(FieldRule::text("password").required().min_len(12).max_len(128))
                .field(FieldRule::text("confirm").required())
                .cross_field(crate::schema::CrossFieldRule::equals("confirm", "password"))
                .build(),
        );

        Gate::new(config, registry, Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn register_then_authenticate() {
        let gate = test_gate();

        let subject = gate
            .register("grace@example.com", "a long passphrase")
            .await
            .unwrap();

        let decision = gate
            .authenticate("grace@example.com", "a long passphrase")
            .await
            .unwrap();

        let AuthDecision::Granted { subject_id, token } = decision else {
            panic!("expected granted");
        };
        assert_eq!(subject_id, subject);

        // the issued token verifies back to the same subject
        assert_eq!(gate.verify_token(&token).unwrap(), subject);
    }

    #[tokio::test]
    async fn wrong_password_is_denied() {
        let gate = test_gate();
        gate.register("grace@example.com", "a long passphrase")
            .await
            .unwrap();

        let decision = gate
            .authenticate("grace@example.com", "not the passphrase")
            .await
            .unwrap();
        assert_eq!(decision, AuthDecision::Denied);
    }

    #[tokio::test]
    async fn unknown_identity_is_denied_identically() {
        let gate = test_gate();
        let decision = gate
            .authenticate("nobody@example.com", "whatever")
            .await
            .unwrap();
        assert_eq!(decision, AuthDecision::Denied);
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() {
        let gate = test_gate();
        gate.register("grace@example.com", "a long passphrase")
            .await
            .unwrap();

        let err = gate
            .register("grace@example.com", "another passphrase")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "DUPLICATE_KEY");
        assert!(err.normalize_for(Environment::Production).body.error.message.contains("email"));
    }

    #[tokio::test]
    async fn hash_and_verify_through_the_blocking_pool() {
        let gate = test_gate();

        let record = gate.hash_password("a long passphrase").await.unwrap();
        assert!(gate.verify_password("a long passphrase", &record).await);
        assert!(!gate.verify_password("wrong", &record).await);
        assert!(!gate.verify_password("a long passphrase", "").await);
    }

    #[tokio::test]
    async fn validate_funnels_to_the_taxonomy() {
        let gate = test_gate();

        let err = gate.validate("auth.register", &json!({})).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");

        let err = gate.validate("no.such.schema", &json!({})).unwrap_err();
        assert_eq!(err.code(), "INTERNAL_ERROR");

        let clean = gate
            .validate(
                "auth.register",
                &json!({
                    "email": "grace@example.com",
                    "password": "a long passphrase",
                    "confirm": "a long passphrase"
                }),
            )
            .unwrap();
        assert_eq!(clean["email"], "grace@example.com");
    }

    #[tokio::test]
    async fn token_verification_failures_classify() {
        let gate = test_gate();

        let err = gate.verify_token("garbage").unwrap_err();
        assert_eq!(err.code(), "INVALID_TOKEN");
    }

    #[tokio::test]
    async fn identifier_parsing() {
        let gate = test_gate();

        assert_eq!(
            gate.parse_identifier("64db1f2a9c8b7e6d5a4f3e2d").unwrap(),
            "64db1f2a9c8b7e6d5a4f3e2d"
        );

        let err = gate.parse_identifier("not-an-id").unwrap_err();
        assert_eq!(err.code(), "INVALID_ID");
    }
}

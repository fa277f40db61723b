//! Session Token Issuance and Verification
//!
//! Stateless, signed, time-bounded proof of identity. A token embeds the
//! subject identifier, issue time, and expiry, signed with the process-wide
//! secret; the server stores nothing per session. A token stops verifying
//! the instant its expiry passes or the signing secret rotates.
//!
//! Verification failures come in three flavors because callers render them
//! differently: an expired token prompts a fresh sign-in, while a malformed
//! or forged one is treated as hostile and logged as such.
//!
//! # Usage
//!
//! ```ignore
//! use portcullis::token::TokenService;
//! use std::time::Duration;
//!
//! let tokens = TokenService::new(secret, Duration::from_secs(30 * 60));
//! let token = tokens.issue("user-123", None)?;
//! let claims = tokens.verify(&token)?;
//! assert_eq!(claims.sub, "user-123");
//! ```

use std::fmt;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

// ============================================================================
// Claims
// ============================================================================

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject identifier (user id)
    pub sub: String,
    /// Issued-at, seconds since the epoch
    pub iat: i64,
    /// Expiry, seconds since the epoch
    pub exp: i64,
    /// Token id, for audit correlation only; nothing is revoked by it
    pub jti: String,
}

impl SessionClaims {
    /// Subject the token asserts.
    pub fn subject(&self) -> &str {
        &self.sub
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Why a token failed to issue or verify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// The string does not parse as a token at all
    Malformed,
    /// The signature does not match the current signing secret
    SignatureInvalid,
    /// The embedded expiry has passed
    Expired,
    /// Issuance itself failed (key or serialization problem)
    Signing(String),
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => write!(f, "token is malformed"),
            Self::SignatureInvalid => write!(f, "token signature is invalid"),
            Self::Expired => write!(f, "token has expired"),
            Self::Signing(detail) => write!(f, "token signing failed: {}", detail),
        }
    }
}

impl std::error::Error for TokenError {}

// ============================================================================
// Token Service
// ============================================================================

/// Issues and verifies session tokens against the process-wide secret.
///
/// Construct once at startup and share; the keys are read-only afterwards.
/// Signature math is fast and safe to run inline on the request path.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    default_ttl: Duration,
}

impl TokenService {
    /// Build a service from the signing secret and the default time-to-live
    /// applied when [`Self::issue`] is called without an explicit ttl.
    pub fn new(secret: &str, default_ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            default_ttl,
        }
    }

    /// Default time-to-live for issued tokens.
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Issue a signed token for a subject.
    ///
    /// Expiry is issue time plus `ttl` (or the service default). Issuance is
    /// synchronous and atomic; there is no pending state.
    pub fn issue(&self, subject: &str, ttl: Option<Duration>) -> Result<String, TokenError> {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let now = Utc::now();
        let claims = SessionClaims {
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: now.timestamp() + ttl.as_secs() as i64,
            jti: uuid::Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verify a token and return its claims.
    ///
    /// No clock-skew leeway: a token is invalid the second its expiry
    /// passes. Tampering anywhere in the token surfaces as either
    /// [`TokenError::SignatureInvalid`] (payload or signature edits) or
    /// [`TokenError::Malformed`] (structural damage); both mean the token
    /// cannot be trusted.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        decode::<SessionClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => TokenError::SignatureInvalid,
                _ => TokenError::Malformed,
            })
    }
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // keys are secret material and stay out of debug output
        f.debug_struct("TokenService")
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "unit-test-signing-secret-0123456789abcdef";

    fn service() -> TokenService {
        TokenService::new(SECRET, Duration::from_secs(1800))
    }

    #[test]
    fn issue_then_verify_round_trips_the_subject() {
        let tokens = service();
        let token = tokens.issue("user-123", None).unwrap();
        let claims = tokens.verify(&token).unwrap();

        assert_eq!(claims.sub, "user-123");
        assert_eq!(claims.exp - claims.iat, 1800);
        assert!(!claims.jti.is_empty());
    }

    #[test]
    fn explicit_ttl_overrides_default() {
        let tokens = service();
        let token = tokens
            .issue("user-123", Some(Duration::from_secs(60)))
            .unwrap();
        let claims = tokens.verify(&token).unwrap();
        assert_eq!(claims.exp - claims.iat, 60);
    }

    #[test]
    fn expired_token_is_distinguished() {
        let tokens = service();
        let token = tokens.issue("user-123", Some(Duration::ZERO)).unwrap();

        // exp == iat and leeway is zero, so the token is already stale
        std::thread::sleep(Duration::from_millis(1100));
        assert_eq!(tokens.verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn tampered_token_is_rejected() {
        let tokens = service();
        let token = tokens.issue("user-123", None).unwrap();

        // flip one character of the payload segment
        let mut bytes = token.into_bytes();
        let mid = bytes.len() / 2;
        bytes[mid] = if bytes[mid] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(bytes).unwrap();

        let err = tokens.verify(&tampered).unwrap_err();
        assert!(
            matches!(err, TokenError::SignatureInvalid | TokenError::Malformed),
            "tampering must never verify: {:?}",
            err
        );
    }

    #[test]
    fn garbage_is_malformed() {
        let tokens = service();
        assert_eq!(tokens.verify(""), Err(TokenError::Malformed));
        assert_eq!(tokens.verify("not.a.token"), Err(TokenError::Malformed));
        assert_eq!(tokens.verify("single-segment"), Err(TokenError::Malformed));
    }

    #[test]
    fn rotated_secret_invalidates_outstanding_tokens() {
        let old = service();
        let token = old.issue("user-123", None).unwrap();

        let rotated = TokenService::new("a-completely-different-secret-value!", old.default_ttl());
        assert_eq!(rotated.verify(&token), Err(TokenError::SignatureInvalid));
    }

    #[test]
    fn tokens_for_the_same_subject_differ() {
        let tokens = service();
        let first = tokens.issue("user-123", None).unwrap();
        let second = tokens.issue("user-123", None).unwrap();
        // jti is fresh per token even when iat/exp coincide
        assert_ne!(first, second);
    }
}

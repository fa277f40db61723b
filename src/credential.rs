//! Credential Hashing and Verification
//!
//! One-way storage for user secrets. A credential record is the Argon2id PHC
//! string (`$argon2id$v=19$m=...,t=...,p=...$salt$digest`); the plaintext is
//! never stored, logged, or returned.
//!
//! # Contract
//!
//! - [`hash`] accepts any string, the empty string included, and draws a
//!   fresh random salt on every call. Hashing the same plaintext twice
//!   produces two different records.
//! - [`verify`] never panics and never returns an error: a malformed, empty,
//!   or truncated stored record simply verifies `false`. The recomputed
//!   digest is compared against the stored digest in constant time, so a
//!   mismatch does not leak where it occurred.
//!
//! Both operations are CPU-bound by design (the cost parameters are tuned to
//! be slow). Async callers should go through [`crate::gate::Gate`], which
//! runs them on the blocking pool.
//!
//! # Usage
//!
//! ```ignore
//! use portcullis::credential;
//!
//! let record = credential::hash("correct horse battery staple")?;
//! assert!(credential::verify("correct horse battery staple", &record));
//! assert!(!credential::verify("wrong guess", &record));
//! ```

use std::fmt;

use argon2::password_hash::{PasswordHash, SaltString};
use argon2::{Algorithm, Argon2, Params, PasswordHasher, Version};
use rand::rngs::OsRng;

use crate::crypto::constant_time_eq;

/// Upper bound on digest length in a parsable PHC string.
const MAX_DIGEST_LEN: usize = 64;

/// Upper bound on decoded salt length in a parsable PHC string.
const MAX_SALT_LEN: usize = 64;

/// Failure while producing a credential record.
///
/// Verification deliberately has no error type; it answers `false` instead.
#[derive(Debug, Clone)]
pub enum CredentialError {
    /// The hasher rejected its inputs or parameters
    Hashing(String),
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hashing(detail) => write!(f, "credential hashing failed: {}", detail),
        }
    }
}

impl std::error::Error for CredentialError {}

/// Hashes a plaintext secret into a storable credential record.
///
/// Uses Argon2id with the library's default cost parameters and a salt drawn
/// from the operating system RNG. Every call salts freshly, so identical
/// plaintexts never produce identical records.
///
/// Input size is bounded by the admission schemas upstream; this function
/// itself accepts anything, the empty string included.
pub fn hash(plaintext: &str) -> Result<String, CredentialError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| CredentialError::Hashing(e.to_string()))
}

/// Verifies a plaintext secret against a stored credential record.
///
/// Returns `true` only when the record parses as a PHC string and the digest
/// recomputed with the record's own salt and parameters matches the stored
/// digest exactly. Everything else, including an empty or garbled record,
/// returns `false`.
///
/// The final digest comparison runs in constant time.
pub fn verify(plaintext: &str, stored: &str) -> bool {
    let parsed = match PasswordHash::new(stored) {
        Ok(p) => p,
        Err(_) => return false,
    };

    let expected = match &parsed.hash {
        Some(h) => h,
        None => return false,
    };

    let salt = match parsed.salt {
        Some(s) => s,
        None => return false,
    };

    let algorithm = match Algorithm::try_from(parsed.algorithm) {
        Ok(a) => a,
        Err(_) => return false,
    };

    let version = match parsed.version {
        Some(v) => match Version::try_from(v) {
            Ok(v) => v,
            Err(_) => return false,
        },
        None => Version::default(),
    };

    let params = match Params::try_from(&parsed) {
        Ok(p) => p,
        Err(_) => return false,
    };

    let mut salt_buf = [0u8; MAX_SALT_LEN];
    let salt_bytes = match salt.decode_b64(&mut salt_buf) {
        Ok(b) => b,
        Err(_) => return false,
    };

    let digest_len = expected.as_bytes().len();
    if digest_len > MAX_DIGEST_LEN {
        return false;
    }

    let mut computed = [0u8; MAX_DIGEST_LEN];
    let hasher = Argon2::new(algorithm, version, params);
    if hasher
        .hash_password_into(plaintext.as_bytes(), salt_bytes, &mut computed[..digest_len])
        .is_err()
    {
        return false;
    }

    constant_time_eq(&computed[..digest_len], expected.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_verifies() {
        let record = hash("a sufficiently long passphrase").unwrap();
        assert!(verify("a sufficiently long passphrase", &record));
    }

    #[test]
    fn fresh_salt_per_call() {
        let first = hash("same input").unwrap();
        let second = hash("same input").unwrap();
        assert_ne!(first, second);

        // both records still verify
        assert!(verify("same input", &first));
        assert!(verify("same input", &second));
    }

    #[test]
    fn wrong_plaintext_fails() {
        let record = hash("the real secret").unwrap();
        assert!(!verify("not the secret", &record));
    }

    #[test]
    fn case_difference_fails() {
        let record = hash("CaseSensitive").unwrap();
        assert!(!verify("casesensitive", &record));
    }

    #[test]
    fn empty_plaintext_hashes_and_verifies() {
        let record = hash("").unwrap();
        assert!(verify("", &record));
        assert!(!verify("anything", &record));
    }

    #[test]
    fn malformed_record_verifies_false() {
        assert!(!verify("secret", ""));
        assert!(!verify("secret", "not-a-phc-string"));
        assert!(!verify("secret", "$argon2id$v=19$garbage"));
        assert!(!verify("secret", "$md5$trivial$hash"));
    }

    #[test]
    fn truncated_record_verifies_false() {
        let record = hash("secret").unwrap();
        let truncated = &record[..record.len() - 10];
        assert!(!verify("secret", truncated));
    }
}

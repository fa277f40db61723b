//! Credential Store Boundary
//!
//! The persistence seam the admission layer talks through. The application
//! owns the real backend (document database, SQL, whatever); admission only
//! needs two operations: look up a credential record by unique identity, and
//! create one, with uniqueness conflicts surfaced as a typed error so they
//! can be normalized to the duplicate-key response.
//!
//! Stores are constructed by the application and passed in; there are no
//! module-level connection globals. [`MemoryStore`] ships for tests and
//! single-process demos.

use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use async_trait::async_trait;

// ============================================================================
// Records and Errors
// ============================================================================

/// What a lookup returns: the subject the identity maps to and the stored
/// credential record (an opaque hash string, never a plaintext).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredIdentity {
    /// Stable subject identifier used in session tokens
    pub subject_id: String,
    /// Opaque credential record produced by the hasher
    pub credential: String,
}

/// Failures crossing the store boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A write collided with an existing identity; `field` names the unique
    /// field that conflicted
    DuplicateIdentity { field: String },
    /// The backend itself failed
    Backend(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateIdentity { field } => {
                write!(f, "value for '{}' is already registered", field)
            }
            Self::Backend(detail) => write!(f, "credential store failure: {}", detail),
        }
    }
}

impl std::error::Error for StoreError {}

// ============================================================================
// Store Trait
// ============================================================================

/// Storage backend for credential records.
///
/// Implement this with your database of choice; admission never sees
/// connection details, only these two calls.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look up the record registered under a unique identity (email,
    /// username). `Ok(None)` means the identity is unknown, which callers
    /// must treat identically to a credential mismatch.
    async fn find_identity(&self, identity: &str) -> Result<Option<StoredIdentity>, StoreError>;

    /// Create a record for a new identity. Returns
    /// [`StoreError::DuplicateIdentity`] when the identity already exists.
    async fn create_identity(
        &self,
        identity: &str,
        subject_id: &str,
        credential: &str,
    ) -> Result<(), StoreError>;
}

// ============================================================================
// In-Memory Store
// ============================================================================

/// In-memory [`CredentialStore`] for tests and single-process demos.
#[derive(Debug)]
pub struct MemoryStore {
    identity_field: String,
    records: RwLock<HashMap<String, StoredIdentity>>,
}

impl MemoryStore {
    /// Create an empty store whose unique field reports as `email`.
    pub fn new() -> Self {
        Self::with_identity_field("email")
    }

    /// Create an empty store naming a different unique field in conflicts.
    pub fn with_identity_field(field: impl Into<String>) -> Self {
        Self {
            identity_field: field.into(),
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored identities.
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    /// True when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_identity(&self, identity: &str) -> Result<Option<StoredIdentity>, StoreError> {
        let records = self
            .records
            .read()
            .map_err(|_| StoreError::Backend("store lock poisoned".to_string()))?;
        Ok(records.get(identity).cloned())
    }

    async fn create_identity(
        &self,
        identity: &str,
        subject_id: &str,
        credential: &str,
    ) -> Result<(), StoreError> {
        let mut records = self
            .records
            .write()
            .map_err(|_| StoreError::Backend("store lock poisoned".to_string()))?;

        if records.contains_key(identity) {
            return Err(StoreError::DuplicateIdentity {
                field: self.identity_field.clone(),
            });
        }

        records.insert(
            identity.to_string(),
            StoredIdentity {
                subject_id: subject_id.to_string(),
                credential: credential.to_string(),
            },
        );
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_find() {
        let store = MemoryStore::new();
        store
            .create_identity("a@example.com", "subject-1", "$argon2id$...record")
            .await
            .unwrap();

        let found = store.find_identity("a@example.com").await.unwrap().unwrap();
        assert_eq!(found.subject_id, "subject-1");
        assert_eq!(found.credential, "$argon2id$...record");
    }

    #[tokio::test]
    async fn unknown_identity_is_none() {
        let store = MemoryStore::new();
        assert_eq!(store.find_identity("nobody@example.com").await.unwrap(), None);
    }

    #[tokio::test]
    async fn duplicate_identity_names_the_field() {
        let store = MemoryStore::new();
        store
            .create_identity("a@example.com", "subject-1", "record-1")
            .await
            .unwrap();

        let err = store
            .create_identity("a@example.com", "subject-2", "record-2")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            StoreError::DuplicateIdentity {
                field: "email".to_string()
            }
        );
    }

    #[tokio::test]
    async fn identity_field_is_configurable() {
        let store = MemoryStore::with_identity_field("username");
        store.create_identity("grace", "subject-1", "record").await.unwrap();

        let err = store
            .create_identity("grace", "subject-2", "record")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            StoreError::DuplicateIdentity {
                field: "username".to_string()
            }
        );
    }
}

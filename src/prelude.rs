//! Portcullis Prelude - Common imports for admission-guarded applications
//!
//! Re-exports the types an application touches when wiring admission into
//! its routes, so handlers get by with a single import.
//!
//! # Usage
//!
//! ```ignore
//! use portcullis::prelude::*;
//!
//! async fn create_task(gate: &Gate, body: serde_json::Value) -> Result<()> {
//!     let clean = gate.validate("task.create", &body)?;
//!     // ...
//!     Ok(())
//! }
//! ```

// =============================================================================
// Configuration
// =============================================================================

pub use crate::config::{AdmissionConfig, AdmissionConfigBuilder, ConfigError, Environment};

// =============================================================================
// Facade
// =============================================================================

pub use crate::gate::{AuthDecision, Gate};

// =============================================================================
// Validation
// =============================================================================

pub use crate::schema::{
    CrossFieldRule,
    FieldRule,
    FieldType,
    Schema,
    SchemaRegistry,
    Violation,
    ViolationCode,
    Violations,
};

// =============================================================================
// Credentials
// =============================================================================

pub use crate::credential::{hash as hash_credential, verify as verify_credential};

// =============================================================================
// Tokens
// =============================================================================

pub use crate::token::{SessionClaims, TokenError, TokenService};

// =============================================================================
// Errors
// =============================================================================

pub use crate::error::{AdmissionError, ErrorBody, NormalizedError, RequestContext, Result};

// =============================================================================
// Storage Boundary
// =============================================================================

pub use crate::store::{CredentialStore, MemoryStore, StoreError, StoredIdentity};

// =============================================================================
// Events
// =============================================================================

pub use crate::events::SecurityEvent;
pub use crate::security_event;

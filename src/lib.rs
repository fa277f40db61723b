//! # Portcullis
//!
//! Request admission for web applications: everything that must be checked
//! before business logic runs, behind one uniform failure contract.
//!
//! This crate is the admission layer of a task-management API, factored out
//! because it is the one place where correctness failures have security
//! consequences: leaked credentials, forged sessions, injected markup, or an
//! error response that tells an attacker more than it should.
//!
//! ## Features
//!
//! - **Credential Hashing**: Argon2id with a fresh salt per call and
//!   constant-time verification that never panics on malformed records
//! - **Session Tokens**: stateless signed tokens with subject, issue time,
//!   and expiry; expired and forged tokens are distinguished for the caller
//! - **Sanitizing Validation**: named, registry-held schemas that collect
//!   every violation at once and reject markup instead of silently cleaning
//!   it
//! - **Error Normalization**: a closed failure taxonomy rendered as one
//!   fixed JSON envelope with stable machine-readable codes
//! - **Structured Logging**: one `tracing` event per admission decision
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use portcullis::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // startup-fatal when the signing secret is absent or weak
//!     let config = AdmissionConfig::from_env().expect("admission config");
//!
//!     let mut registry = SchemaRegistry::new();
//!     registry.register(
//!         Schema::builder("task.create")
//!             .field(FieldRule::text("title").required().max_len(200).sanitize())
//!             .field(FieldRule::text("due").required())
//!             .field(FieldRule::enumerated("priority", ["low", "medium", "high"])
//!                 .default_value("medium"))
//!             .build(),
//!     );
//!
//!     let gate = Gate::new(config, registry, Arc::new(MemoryStore::new()));
//!
//!     // in a protected route handler:
//!     // let subject = gate.verify_token(bearer)?;
//!     // let clean = gate.validate("task.create", &body)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Failure Contract
//!
//! Every rejection, regardless of which check produced it, renders as
//!
//! ```json
//! { "success": false, "error": { "message": "...", "code": "...", "details": [...] } }
//! ```
//!
//! with `code` drawn from a closed set (`VALIDATION_ERROR`, `INVALID_ID`,
//! `DUPLICATE_KEY`, `INVALID_TOKEN`, `TOKEN_EXPIRED`, `INTERNAL_ERROR`).
//! Internal detail never reaches the body outside a development
//! configuration.

pub mod config;
pub mod credential;
mod crypto;
pub mod error;
pub mod events;
pub mod gate;
pub mod prelude;
pub mod schema;
pub mod store;
pub mod token;

// Re-exports
pub use config::{AdmissionConfig, AdmissionConfigBuilder, Environment};
pub use crypto::{constant_time_eq, constant_time_str_eq};
pub use error::{AdmissionError, NormalizedError, Result};
pub use gate::{AuthDecision, Gate};
pub use schema::{FieldRule, Schema, SchemaRegistry, Violations};
pub use store::{CredentialStore, MemoryStore};
pub use token::TokenService;

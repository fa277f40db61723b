//! Security Event Logging
//!
//! Structured logging for admission decisions. Every accepted or rejected
//! request produces exactly one event record with a stable `security_event`
//! field, so log pipelines can filter and alert on admission activity without
//! parsing free-form messages.
//!
//! # Usage
//!
//! ```ignore
//! use portcullis::events::SecurityEvent;
//! use portcullis::security_event;
//!
//! security_event!(
//!     SecurityEvent::AuthenticationSuccess,
//!     subject_id = %subject,
//!     "Credentials verified"
//! );
//! ```

use std::fmt;

/// Admission events worth an audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityEvent {
    /// Credentials verified successfully
    AuthenticationSuccess,
    /// Credential verification failed (unknown identity or wrong secret)
    AuthenticationFailure,
    /// New credential record created
    CredentialCreated,
    /// Session token issued
    TokenIssued,
    /// Session token rejected (malformed, forged, or expired)
    TokenRejected,
    /// Request input rejected by schema validation
    ValidationRejected,
}

impl SecurityEvent {
    /// Event category for filtering and grouping.
    pub fn category(&self) -> &'static str {
        match self {
            Self::AuthenticationSuccess
            | Self::AuthenticationFailure
            | Self::CredentialCreated => "authentication",

            Self::TokenIssued | Self::TokenRejected => "session",

            Self::ValidationRejected => "validation",
        }
    }

    /// Severity tier, which selects the tracing level the event is emitted at.
    pub fn severity(&self) -> Severity {
        match self {
            Self::AuthenticationFailure | Self::TokenRejected => Severity::High,

            Self::AuthenticationSuccess
            | Self::CredentialCreated => Severity::Medium,

            Self::TokenIssued
            | Self::ValidationRejected => Severity::Low,
        }
    }

    /// Stable snake_case event name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::AuthenticationSuccess => "authentication_success",
            Self::AuthenticationFailure => "authentication_failure",
            Self::CredentialCreated => "credential_created",
            Self::TokenIssued => "token_issued",
            Self::TokenRejected => "token_rejected",
            Self::ValidationRejected => "validation_rejected",
        }
    }
}

impl fmt::Display for SecurityEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Event severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Routine admission traffic
    Low,
    /// Notable state changes
    Medium,
    /// Rejections that may indicate probing or attack
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Log a security event with structured fields.
///
/// The macro attaches `security_event`, `category`, and `severity` fields to
/// every record and routes the record to the tracing level matching the
/// event's severity.
#[macro_export]
macro_rules! security_event {
    ($event:expr, $($field:tt)*) => {{
        let event = $event;
        let category = event.category();
        let event_name = event.name();

        match event.severity() {
            $crate::events::Severity::High => {
                ::tracing::warn!(
                    security_event = event_name,
                    category = category,
                    severity = "high",
                    $($field)*
                );
            }
            $crate::events::Severity::Medium => {
                ::tracing::info!(
                    security_event = event_name,
                    category = category,
                    severity = "medium",
                    $($field)*
                );
            }
            $crate::events::Severity::Low => {
                ::tracing::debug!(
                    security_event = event_name,
                    category = category,
                    severity = "low",
                    $($field)*
                );
            }
        }
    }};
}

pub use security_event;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_categories() {
        assert_eq!(SecurityEvent::AuthenticationFailure.category(), "authentication");
        assert_eq!(SecurityEvent::TokenRejected.category(), "session");
        assert_eq!(SecurityEvent::ValidationRejected.category(), "validation");
    }

    #[test]
    fn event_severity() {
        assert_eq!(SecurityEvent::AuthenticationFailure.severity(), Severity::High);
        assert_eq!(SecurityEvent::CredentialCreated.severity(), Severity::Medium);
        assert_eq!(SecurityEvent::TokenIssued.severity(), Severity::Low);
    }

    #[test]
    fn severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
    }

    #[test]
    fn event_names_are_stable() {
        assert_eq!(SecurityEvent::AuthenticationSuccess.name(), "authentication_success");
        assert_eq!(SecurityEvent::TokenRejected.name(), "token_rejected");
    }

    #[test]
    fn macro_expands_for_every_severity() {
        security_event!(SecurityEvent::AuthenticationFailure, identity = "a@b.test", "failed");
        security_event!(SecurityEvent::CredentialCreated, subject_id = "s1", "created");
        security_event!(SecurityEvent::TokenIssued, subject_id = "s1", "issued");
    }
}

//! Process Configuration
//!
//! The two inputs admission cannot run without: the token signing secret and
//! the default token time-to-live. Both are loaded once at startup; a missing
//! or unacceptably weak secret is a startup-fatal condition, never a
//! per-request failure.
//!
//! The secret is strength-checked at load: minimum length, a scan for weak
//! human-chosen patterns, and a Shannon entropy floor. Production mode
//! demands more than development mode does.
//!
//! # Environment Variables
//!
//! - `ADMISSION_SECRET`: token signing secret (required)
//! - `ADMISSION_TOKEN_TTL`: default token lifetime in seconds (default: 1800)
//! - `ADMISSION_ENV`: "production" or "development" (default: "development")
//!
//! # Usage
//!
//! ```ignore
//! use portcullis::config::AdmissionConfig;
//!
//! // at startup; propagate the error and exit on failure
//! let config = AdmissionConfig::from_env()?;
//!
//! // or programmatically, for tests and embedders
//! let config = AdmissionConfig::builder()
//!     .secret("a-long-random-secret-with-plenty-of-entropy-4!x9")
//!     .token_ttl(std::time::Duration::from_secs(900))
//!     .build()?;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default token time-to-live: 30 minutes.
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(30 * 60);

// ============================================================================
// Environment Mode
// ============================================================================

/// Deployment mode. Gates how much internal detail error responses expose
/// and how strong the signing secret must be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// Detailed error bodies, relaxed secret policy
    #[default]
    Development,
    /// Generic error bodies, strict secret policy
    Production,
}

impl Environment {
    /// True in production mode.
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "development" | "dev" => Ok(Self::Development),
            other => Err(ConfigError::InvalidEnvironment(other.to_string())),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Startup-fatal configuration failures.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// `ADMISSION_SECRET` is absent
    MissingSecret,
    /// The ttl value did not parse as seconds
    InvalidTtl(String),
    /// The environment value is not a known mode
    InvalidEnvironment(String),
    /// Secret shorter than the mode's minimum
    SecretTooShort {
        actual: usize,
        minimum: usize,
        environment: Environment,
    },
    /// Secret contains a weak human-chosen pattern
    WeakSecret { pattern: String },
    /// Secret entropy below the mode's floor
    LowEntropy {
        actual: f64,
        minimum: f64,
        environment: Environment,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSecret => write!(f, "ADMISSION_SECRET is required"),
            Self::InvalidTtl(value) => {
                write!(f, "ADMISSION_TOKEN_TTL must be whole seconds, got '{}'", value)
            }
            Self::InvalidEnvironment(value) => {
                write!(f, "unknown environment '{}'", value)
            }
            Self::SecretTooShort {
                actual,
                minimum,
                environment,
            } => write!(
                f,
                "signing secret length ({} chars) is below the {} minimum ({} chars)",
                actual, environment, minimum
            ),
            Self::WeakSecret { pattern } => {
                write!(f, "signing secret contains weak pattern '{}'", pattern)
            }
            Self::LowEntropy {
                actual,
                minimum,
                environment,
            } => write!(
                f,
                "signing secret entropy ({:.1} bits) is below the {} minimum ({:.1} bits)",
                actual, environment, minimum
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Secret Strength
// ============================================================================

/// Patterns nobody should have in key material.
const WEAK_PATTERNS: &[&str] = &[
    "secret", "password", "admin", "123456", "qwerty", "default",
    "example", "changeme", "letmein", "welcome",
];

fn find_weak_pattern(secret: &str) -> Option<&'static str> {
    let lower = secret.to_lowercase();
    WEAK_PATTERNS.iter().find(|p| lower.contains(**p)).copied()
}

/// Total Shannon entropy of a string in bits (per-character entropy times
/// length). Repeated characters score low; diverse random characters high.
pub fn secret_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut counts: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *counts.entry(c).or_insert(0) += 1;
    }

    let total = s.chars().count() as f64;
    let mut per_char = 0.0;
    for count in counts.values() {
        let probability = *count as f64 / total;
        per_char -= probability * probability.log2();
    }

    per_char * total
}

fn check_secret(secret: &str, environment: Environment) -> Result<(), ConfigError> {
    let (min_length, min_entropy) = match environment {
        Environment::Production => (48, 96.0),
        Environment::Development => (32, 32.0),
    };

    if secret.len() < min_length {
        return Err(ConfigError::SecretTooShort {
            actual: secret.len(),
            minimum: min_length,
            environment,
        });
    }

    if let Some(pattern) = find_weak_pattern(secret) {
        return Err(ConfigError::WeakSecret {
            pattern: pattern.to_string(),
        });
    }

    let entropy = secret_entropy(secret);
    if entropy < min_entropy {
        return Err(ConfigError::LowEntropy {
            actual: entropy,
            minimum: min_entropy,
            environment,
        });
    }

    Ok(())
}

// ============================================================================
// Configuration
// ============================================================================

/// Process-wide admission configuration, read-only after startup.
#[derive(Debug, Clone)]
pub struct AdmissionConfig {
    secret: String,
    token_ttl: Duration,
    environment: Environment,
}

impl AdmissionConfig {
    /// Start building a configuration programmatically.
    pub fn builder() -> AdmissionConfigBuilder {
        AdmissionConfigBuilder::default()
    }

    /// Load configuration from environment variables.
    ///
    /// Fails (startup-fatal) when the secret is absent, too weak for the
    /// selected mode, or the ttl does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = match std::env::var("ADMISSION_ENV") {
            Ok(value) => value.parse()?,
            Err(_) => Environment::Development,
        };

        let secret = std::env::var("ADMISSION_SECRET").map_err(|_| ConfigError::MissingSecret)?;

        let token_ttl = match std::env::var("ADMISSION_TOKEN_TTL") {
            Ok(value) => {
                let secs: u64 = value
                    .parse()
                    .map_err(|_| ConfigError::InvalidTtl(value.clone()))?;
                Duration::from_secs(secs)
            }
            Err(_) => DEFAULT_TOKEN_TTL,
        };

        Self::builder()
            .secret(secret)
            .token_ttl(token_ttl)
            .environment(environment)
            .build()
    }

    /// The token signing secret.
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Default token time-to-live.
    pub fn token_ttl(&self) -> Duration {
        self.token_ttl
    }

    /// Deployment mode.
    pub fn environment(&self) -> Environment {
        self.environment
    }
}

/// Builder for [`AdmissionConfig`]. Validation happens in [`Self::build`].
#[derive(Debug, Clone, Default)]
pub struct AdmissionConfigBuilder {
    secret: Option<String>,
    token_ttl: Option<Duration>,
    environment: Environment,
}

impl AdmissionConfigBuilder {
    /// Set the signing secret.
    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Set the default token time-to-live.
    pub fn token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = Some(ttl);
        self
    }

    /// Set the deployment mode.
    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Validate and build. The secret is strength-checked against the
    /// selected mode here.
    pub fn build(self) -> Result<AdmissionConfig, ConfigError> {
        let secret = self.secret.ok_or(ConfigError::MissingSecret)?;
        check_secret(&secret, self.environment)?;

        Ok(AdmissionConfig {
            secret,
            token_ttl: self.token_ttl.unwrap_or(DEFAULT_TOKEN_TTL),
            environment: self.environment,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // long enough and random enough for either mode
    const STRONG: &str = "kV8#mQ2pL9@wX4tR7!zN3cF6hJ1bY5dG0sA8eU2iO7&nM4xK";

    #[test]
    fn builder_accepts_a_strong_secret() {
        let config = AdmissionConfig::builder()
            .secret(STRONG)
            .environment(Environment::Production)
            .build()
            .unwrap();

        assert_eq!(config.secret(), STRONG);
        assert_eq!(config.token_ttl(), Duration::from_secs(1800));
        assert!(config.environment().is_production());
    }

    #[test]
    fn missing_secret_is_fatal() {
        let err = AdmissionConfig::builder().build().unwrap_err();
        assert_eq!(err, ConfigError::MissingSecret);
    }

    #[test]
    fn short_secret_rejected_for_production() {
        let err = AdmissionConfig::builder()
            .secret("kV8#mQ2pL9@wX4tR7!zN3cF6hJ1b")
            .environment(Environment::Production)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::SecretTooShort { .. }));
    }

    #[test]
    fn weak_pattern_rejected() {
        let err = AdmissionConfig::builder()
            .secret("this-password-is-quite-long-but-still-guessable!")
            .environment(Environment::Development)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::WeakSecret { .. }));
    }

    #[test]
    fn low_entropy_rejected() {
        let err = AdmissionConfig::builder()
            .secret("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa")
            .environment(Environment::Production)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::LowEntropy { .. }));
    }

    #[test]
    fn development_mode_is_more_permissive() {
        // 32 chars of moderate diversity: fine for development
        AdmissionConfig::builder()
            .secret("dev-only-signing-key-0123456789!")
            .environment(Environment::Development)
            .build()
            .unwrap();
    }

    #[test]
    fn ttl_override() {
        let config = AdmissionConfig::builder()
            .secret(STRONG)
            .token_ttl(Duration::from_secs(60))
            .build()
            .unwrap();
        assert_eq!(config.token_ttl(), Duration::from_secs(60));
    }

    #[test]
    fn environment_parsing() {
        assert_eq!("production".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!("prod".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!("development".parse::<Environment>().unwrap(), Environment::Development);
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn entropy_behaves() {
        assert_eq!(secret_entropy(""), 0.0);
        assert!(secret_entropy("aaaaaaaaaa") < 1.0);
        assert!(secret_entropy("aB3$xY9!pQ") > 30.0);
    }
}

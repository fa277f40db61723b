//! Schema-Driven Input Validation
//!
//! Declarative validation for request bodies. Each operation declares a named
//! [`Schema`] once at startup; the [`SchemaRegistry`] holds every schema
//! read-only for the life of the process and validates raw JSON against them.
//!
//! # Contract
//!
//! - Every field rule is evaluated independently and **all** violations are
//!   collected, so a form can render every problem at once. The violation
//!   list preserves schema declaration order, not input key order.
//! - Fields flagged [`FieldRule::sanitize`] are checked for markup by
//!   stripping tags and comparing: any change means the input contained
//!   markup and the field is rejected outright. Nothing is silently cleaned.
//! - Cross-field rules (password confirmation and the like) run after the
//!   per-field pass, and only when the fields they reference came through it
//!   clean.
//! - Absent fields with a declared default are filled in. A present-but-empty
//!   string counts as absent only when the rule opts in via
//!   [`FieldRule::empty_is_absent`].
//! - Unknown input fields are ignored unless the schema is marked
//!   [`SchemaBuilder::strict`], in which case each one is a violation.
//!
//! # Usage
//!
//! ```ignore
//! use portcullis::schema::{FieldRule, Schema, SchemaRegistry};
//!
//! let mut registry = SchemaRegistry::new();
//! registry.register(
//!     Schema::builder("task.create")
//!         .field(FieldRule::text("title").required().max_len(200).sanitize())
//!         .field(FieldRule::text("due").required())
//!         .field(FieldRule::enumerated("priority", ["low", "medium", "high"])
//!             .required()
//!             .default_value("medium"))
//!         .build(),
//! );
//!
//! let clean = registry.validate("task.create", &input)?;
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde_json::{Map, Value};

// ============================================================================
// Violations
// ============================================================================

/// A single failed rule, tied to the field that failed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Field the rule applies to
    pub field: String,
    /// Machine-readable code for the failed rule
    pub code: ViolationCode,
    /// Human-readable description
    pub message: String,
}

impl Violation {
    /// Create a violation for a field.
    pub fn new(
        field: impl Into<String>,
        code: ViolationCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Machine-readable codes for failed rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationCode {
    /// Required field missing or treated as absent
    Required,
    /// Value has the wrong JSON type and could not be coerced
    WrongType,
    /// String shorter than the declared minimum
    TooShort,
    /// String longer than the declared maximum
    TooLong,
    /// Not a well-formed email address
    InvalidEmail,
    /// Not a well-formed object identifier
    InvalidIdentifier,
    /// Value outside the enumerated set
    NotAllowed,
    /// Value contains markup
    Markup,
    /// Value does not match its sibling field
    Mismatch,
    /// Field not declared by a strict schema
    UnknownField,
    /// A registered custom rule rejected the value
    Custom,
}

impl fmt::Display for ViolationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => write!(f, "required"),
            Self::WrongType => write!(f, "wrong_type"),
            Self::TooShort => write!(f, "too_short"),
            Self::TooLong => write!(f, "too_long"),
            Self::InvalidEmail => write!(f, "invalid_email"),
            Self::InvalidIdentifier => write!(f, "invalid_identifier"),
            Self::NotAllowed => write!(f, "not_allowed"),
            Self::Markup => write!(f, "markup"),
            Self::Mismatch => write!(f, "mismatch"),
            Self::UnknownField => write!(f, "unknown_field"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

/// The complete set of violations for one rejected input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Violations(Vec<Violation>);

impl Violations {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a violation.
    pub fn push(&mut self, violation: Violation) {
        self.0.push(violation);
    }

    /// True when no rule failed.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of failed rules.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate the violations in the order they were recorded.
    pub fn iter(&self) -> impl Iterator<Item = &Violation> {
        self.0.iter()
    }

    /// Names of the violated fields, in recorded order.
    pub fn fields(&self) -> Vec<&str> {
        self.0.iter().map(|v| v.field.as_str()).collect()
    }
}

impl IntoIterator for Violations {
    type Item = Violation;
    type IntoIter = std::vec::IntoIter<Violation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.0.iter().map(|v| v.to_string()).collect();
        write!(f, "{}", rendered.join("; "))
    }
}

// ============================================================================
// Field Rules
// ============================================================================

/// Declared type of a field, driving type checks and coercion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    /// Any string
    Text,
    /// String in email-address form
    Email,
    /// Whole number; numeric strings are coerced
    Integer,
    /// Boolean; "true"/"false" strings are coerced
    Boolean,
    /// Document identifier (24 hex characters)
    Identifier,
    /// String drawn from a fixed set
    Enumerated(Vec<String>),
}

/// Rule set for one declared field.
#[derive(Debug, Clone)]
pub struct FieldRule {
    name: String,
    ty: FieldType,
    required: bool,
    default: Option<Value>,
    min_len: Option<usize>,
    max_len: Option<usize>,
    sanitize: bool,
    empty_is_absent: bool,
    custom_rules: Vec<String>,
}

impl FieldRule {
    fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: false,
            default: None,
            min_len: None,
            max_len: None,
            sanitize: false,
            empty_is_absent: false,
            custom_rules: Vec::new(),
        }
    }

    /// A free-text field.
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Text)
    }

    /// An email-address field.
    pub fn email(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Email)
    }

    /// A whole-number field.
    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Integer)
    }

    /// A boolean field.
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Boolean)
    }

    /// A document-identifier field.
    pub fn identifier(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Identifier)
    }

    /// A field restricted to a fixed set of values.
    pub fn enumerated(
        name: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self::new(
            name,
            FieldType::Enumerated(values.into_iter().map(Into::into).collect()),
        )
    }

    /// Mark the field required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Value used when the field is absent. Never applied to a field that is
    /// present, empty string included, unless [`Self::empty_is_absent`] says
    /// otherwise.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Minimum length in characters.
    pub fn min_len(mut self, min: usize) -> Self {
        self.min_len = Some(min);
        self
    }

    /// Maximum length in characters.
    pub fn max_len(mut self, max: usize) -> Self {
        self.max_len = Some(max);
        self
    }

    /// Reject the value if it contains any markup.
    pub fn sanitize(mut self) -> Self {
        self.sanitize = true;
        self
    }

    /// Treat a present-but-empty string the same as an absent field.
    pub fn empty_is_absent(mut self) -> Self {
        self.empty_is_absent = true;
        self
    }

    /// Attach a named custom rule, resolved through the registry at
    /// validation time.
    pub fn rule(mut self, name: impl Into<String>) -> Self {
        self.custom_rules.push(name.into());
        self
    }

    /// Field name this rule applies to.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type-check and coerce one present value, recording violations.
    ///
    /// Returns the coerced value when the type check passed; string-level
    /// checks (length, markup, custom rules) may still record violations on
    /// top of a successful coercion.
    fn check(
        &self,
        value: &Value,
        rules: &HashMap<String, RuleFn>,
        schema_name: &str,
        violations: &mut Violations,
    ) -> Result<Option<Value>, SchemaError> {
        let before = violations.len();

        let coerced = match &self.ty {
            FieldType::Text => match value {
                Value::String(s) => Some(Value::String(s.clone())),
                _ => {
                    violations.push(Violation::new(
                        &self.name,
                        ViolationCode::WrongType,
                        "must be a string",
                    ));
                    None
                }
            },
            FieldType::Email => match value {
                Value::String(s) if is_valid_email(s) => Some(Value::String(s.clone())),
                Value::String(_) => {
                    violations.push(Violation::new(
                        &self.name,
                        ViolationCode::InvalidEmail,
                        "must be a valid email address",
                    ));
                    None
                }
                _ => {
                    violations.push(Violation::new(
                        &self.name,
                        ViolationCode::WrongType,
                        "must be a string",
                    ));
                    None
                }
            },
            FieldType::Integer => match value {
                Value::Number(n) if n.as_i64().is_some() => Some(value.clone()),
                Value::String(s) if s.parse::<i64>().is_ok() => {
                    Some(Value::from(s.parse::<i64>().unwrap_or_default()))
                }
                _ => {
                    violations.push(Violation::new(
                        &self.name,
                        ViolationCode::WrongType,
                        "must be a whole number",
                    ));
                    None
                }
            },
            FieldType::Boolean => match value {
                Value::Bool(_) => Some(value.clone()),
                Value::String(s) if s == "true" => Some(Value::Bool(true)),
                Value::String(s) if s == "false" => Some(Value::Bool(false)),
                _ => {
                    violations.push(Violation::new(
                        &self.name,
                        ViolationCode::WrongType,
                        "must be a boolean",
                    ));
                    None
                }
            },
            FieldType::Identifier => match value {
                Value::String(s) if is_valid_identifier(s) => Some(Value::String(s.clone())),
                _ => {
                    violations.push(Violation::new(
                        &self.name,
                        ViolationCode::InvalidIdentifier,
                        "must be a 24 character hex identifier",
                    ));
                    None
                }
            },
            FieldType::Enumerated(allowed) => match value {
                Value::String(s) if allowed.contains(s) => Some(Value::String(s.clone())),
                _ => {
                    violations.push(Violation::new(
                        &self.name,
                        ViolationCode::NotAllowed,
                        format!("must be one of: {}", allowed.join(", ")),
                    ));
                    None
                }
            },
        };

        // String-level checks apply to the coerced string form.
        if let Some(Value::String(s)) = &coerced {
            let len = s.chars().count();
            if let Some(min) = self.min_len {
                if len < min {
                    violations.push(Violation::new(
                        &self.name,
                        ViolationCode::TooShort,
                        format!("must be at least {} characters", min),
                    ));
                }
            }
            if let Some(max) = self.max_len {
                if len > max {
                    violations.push(Violation::new(
                        &self.name,
                        ViolationCode::TooLong,
                        format!("must be at most {} characters", max),
                    ));
                }
            }

            if self.sanitize && strip_markup(s) != *s {
                violations.push(Violation::new(
                    &self.name,
                    ViolationCode::Markup,
                    "must not include markup",
                ));
            }

            for rule_name in &self.custom_rules {
                let rule = rules.get(rule_name).ok_or_else(|| SchemaError::UnknownRule {
                    schema: schema_name.to_string(),
                    rule: rule_name.clone(),
                })?;
                if let Err(message) = rule(s) {
                    violations.push(Violation::new(&self.name, ViolationCode::Custom, message));
                }
            }
        }

        if violations.len() > before {
            Ok(None)
        } else {
            Ok(coerced)
        }
    }
}

// ============================================================================
// Cross-Field Rules
// ============================================================================

/// Rule relating two declared fields.
///
/// Cross-field rules run after the per-field pass and only when every field
/// they reference passed its own rules.
#[derive(Debug, Clone)]
pub enum CrossFieldRule {
    /// `field` must hold the same value as `other`
    Equals { field: String, other: String },
}

impl CrossFieldRule {
    /// Require `field` to equal its sibling `other`.
    pub fn equals(field: impl Into<String>, other: impl Into<String>) -> Self {
        Self::Equals {
            field: field.into(),
            other: other.into(),
        }
    }
}

// ============================================================================
// Schema
// ============================================================================

/// Named, immutable description of one operation's valid input shape.
#[derive(Debug, Clone)]
pub struct Schema {
    name: String,
    strict: bool,
    fields: Vec<FieldRule>,
    cross_field: Vec<CrossFieldRule>,
}

impl Schema {
    /// Start building a schema with the given name.
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            schema: Self {
                name: name.into(),
                strict: false,
                fields: Vec::new(),
                cross_field: Vec::new(),
            },
        }
    }

    /// The schema's registry name.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn validate_with_rules(
        &self,
        input: &Value,
        rules: &HashMap<String, RuleFn>,
    ) -> Result<Map<String, Value>, SchemaError> {
        let Some(object) = input.as_object() else {
            let mut violations = Violations::new();
            violations.push(Violation::new(
                "(body)",
                ViolationCode::WrongType,
                "input must be a JSON object",
            ));
            return Err(SchemaError::Invalid(violations));
        };

        let mut output = Map::new();
        let mut violations = Violations::new();
        let mut failed: HashSet<&str> = HashSet::new();

        for rule in &self.fields {
            let raw = object.get(&rule.name);

            let effective = match raw {
                Some(Value::String(s)) if s.is_empty() && rule.empty_is_absent => None,
                Some(Value::Null) => None,
                other => other,
            };

            match effective {
                None => {
                    if let Some(default) = &rule.default {
                        output.insert(rule.name.clone(), default.clone());
                    } else if rule.required {
                        violations.push(Violation::new(
                            &rule.name,
                            ViolationCode::Required,
                            "field is required",
                        ));
                        failed.insert(rule.name.as_str());
                    }
                }
                Some(value) => {
                    match rule.check(value, rules, &self.name, &mut violations)? {
                        Some(coerced) => {
                            output.insert(rule.name.clone(), coerced);
                        }
                        None => {
                            failed.insert(rule.name.as_str());
                        }
                    }
                }
            }
        }

        for rule in &self.cross_field {
            match rule {
                CrossFieldRule::Equals { field, other } => {
                    if failed.contains(field.as_str()) || failed.contains(other.as_str()) {
                        continue;
                    }
                    let (Some(a), Some(b)) = (output.get(field), output.get(other)) else {
                        continue;
                    };
                    if a != b {
                        violations.push(Violation::new(
                            field,
                            ViolationCode::Mismatch,
                            format!("must match {}", other),
                        ));
                    }
                }
            }
        }

        if self.strict {
            let declared: HashSet<&str> = self.fields.iter().map(|r| r.name.as_str()).collect();
            for key in object.keys() {
                if !declared.contains(key.as_str()) {
                    violations.push(Violation::new(
                        key,
                        ViolationCode::UnknownField,
                        "field is not recognized",
                    ));
                }
            }
        }

        if violations.is_empty() {
            Ok(output)
        } else {
            Err(SchemaError::Invalid(violations))
        }
    }
}

/// Builder for [`Schema`].
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    /// Reject any input field the schema does not declare.
    pub fn strict(mut self) -> Self {
        self.schema.strict = true;
        self
    }

    /// Declare a field. Declaration order fixes violation order.
    pub fn field(mut self, rule: FieldRule) -> Self {
        self.schema.fields.push(rule);
        self
    }

    /// Declare a cross-field rule.
    pub fn cross_field(mut self, rule: CrossFieldRule) -> Self {
        self.schema.cross_field.push(rule);
        self
    }

    /// Finish the schema.
    pub fn build(self) -> Schema {
        self.schema
    }
}

// ============================================================================
// Registry
// ============================================================================

/// A named custom rule: pure check over the field's string form.
pub type RuleFn = Box<dyn Fn(&str) -> Result<(), String> + Send + Sync>;

/// Validation failure surfaced by the registry.
///
/// `Invalid` is client-correctable input; the other two are wiring mistakes
/// in the caller and classify as internal failures.
#[derive(Debug)]
pub enum SchemaError {
    /// No schema registered under the requested name
    UnknownSchema(String),
    /// A field references a custom rule that was never registered
    UnknownRule { schema: String, rule: String },
    /// The input violated the schema
    Invalid(Violations),
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownSchema(name) => write!(f, "no schema registered as '{}'", name),
            Self::UnknownRule { schema, rule } => {
                write!(f, "schema '{}' references unregistered rule '{}'", schema, rule)
            }
            Self::Invalid(violations) => write!(f, "validation failed: {}", violations),
        }
    }
}

impl std::error::Error for SchemaError {}

/// Process-wide schema store: built once at startup, read-only afterwards.
#[derive(Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, Schema>,
    rules: HashMap<String, RuleFn>,
}

impl SchemaRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema under its declared name. A later registration under
    /// the same name replaces the earlier one.
    pub fn register(&mut self, schema: Schema) {
        self.schemas.insert(schema.name.clone(), schema);
    }

    /// Register a named custom rule for use via [`FieldRule::rule`].
    pub fn register_rule(
        &mut self,
        name: impl Into<String>,
        rule: impl Fn(&str) -> Result<(), String> + Send + Sync + 'static,
    ) {
        self.rules.insert(name.into(), Box::new(rule));
    }

    /// Look up a registered schema.
    pub fn get(&self, name: &str) -> Option<&Schema> {
        self.schemas.get(name)
    }

    /// Validate raw input against the named schema.
    ///
    /// On success returns the sanitized, coerced output record with defaults
    /// filled in. On failure returns every violated rule at once.
    pub fn validate(
        &self,
        schema_name: &str,
        input: &Value,
    ) -> Result<Map<String, Value>, SchemaError> {
        let schema = self
            .schemas
            .get(schema_name)
            .ok_or_else(|| SchemaError::UnknownSchema(schema_name.to_string()))?;
        schema.validate_with_rules(input, &self.rules)
    }
}

impl fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("schemas", &self.schemas.keys().collect::<Vec<_>>())
            .field("rules", &self.rules.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ============================================================================
// Sanitization and Format Checks
// ============================================================================

/// Remove markup tags from a string.
///
/// Tag content between `<` and `>` is dropped; a `>` with no opening `<`
/// passes through as plain text. Used for detection: the validator compares
/// the stripped string against the original and rejects on any difference
/// rather than accepting the cleaned value.
pub fn strip_markup(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut in_tag = false;

    for c in input.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => result.push(c),
            _ => {}
        }
    }

    result
}

/// Pragmatic email shape check: one `@`, non-empty dot-free-edges local part,
/// dotted domain of legal characters. Deliverability is not checked.
pub fn is_valid_email(value: &str) -> bool {
    let mut parts = value.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };

    if local.is_empty() || local.len() > 64 {
        return false;
    }
    if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
        return false;
    }

    if domain.is_empty() || domain.len() > 255 || !domain.contains('.') {
        return false;
    }
    domain.chars().all(|c| c.is_alphanumeric() || c == '.' || c == '-')
}

/// Document identifier shape check: exactly 24 lowercase hex characters.
pub fn is_valid_identifier(value: &str) -> bool {
    value.len() == 24 && value.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
}

// ============================================================================
// Tests
// ============================================================================

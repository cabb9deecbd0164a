use thiserror::Error;

/// Errors raised anywhere in the document pipeline.
///
/// Each variant corresponds to one pipeline stage. A rejected CDR is not an
/// error: it is reported as [`crate::core::DocumentState::Rejected`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CpeError {
    /// Bad business input, caught before conversion.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Structurally invalid input to the totals calculation.
    #[error("calculation error: {0}")]
    Calculation(String),

    /// Document model could not be mapped to the UBL schema.
    #[error("conversion error: {0}")]
    Conversion(String),

    /// XML writer failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Input could not be parsed into canonical form.
    #[error("canonicalization error: {0}")]
    Canonicalization(String),

    /// Key material could not be loaded.
    #[error("key load error: {0}")]
    KeyLoad(String),

    /// Signature computation or embedding failed.
    #[error("signing error: {0}")]
    Signing(String),

    /// The signed document could not be checked (malformed signature block).
    #[error("verification error: {0}")]
    Verification(String),

    /// ZIP/base64 bundle is missing a field or is inconsistent.
    #[error("packaging error: {field}: {message}")]
    Packaging { field: String, message: String },

    /// No response was obtained from the remote service. Retried.
    #[error("transport error: {0}")]
    Transport(String),

    /// SOAP fault or unexpected HTTP status. Never retried.
    #[error("protocol error: {code}: {message}")]
    Protocol { code: String, message: String },

    /// The operation was cancelled before it finished.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// Series or correlative numbering error.
    #[error("numbering error: {0}")]
    Numbering(String),

    /// The persistence collaborator failed or lacks a record.
    #[error("storage error: {0}")]
    Storage(String),

    /// Lifecycle transition not allowed from the current state.
    #[error("invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
}

impl CpeError {
    /// Only transport failures are retried automatically.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    pub(crate) fn packaging(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Packaging {
            field: field.into(),
            message: message.into(),
        }
    }

    pub(crate) fn protocol(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Protocol {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// A single validation error with field path and message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dot-separated path to the invalid field (e.g. "issuer.ruc").
    pub field: String,
    /// Human-readable error description.
    pub message: String,
    /// SUNAT catalog or rule reference if applicable (e.g. "CAT-06").
    pub rule: Option<String>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(rule) = &self.rule {
            write!(f, "[{}] {}: {}", rule, self.field, self.message)
        } else {
            write!(f, "{}: {}", self.field, self.message)
        }
    }
}

impl ValidationError {
    /// Create a validation error without a rule reference.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            rule: None,
        }
    }

    /// Create a validation error tied to a catalog or rule reference.
    pub fn with_rule(
        field: impl Into<String>,
        message: impl Into<String>,
        rule: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            rule: Some(rule.into()),
        }
    }
}

/// Join a list of validation errors into a single [`CpeError::Validation`].
pub fn validation_failure(errors: &[ValidationError]) -> CpeError {
    let msg = errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ");
    CpeError::Validation(msg)
}

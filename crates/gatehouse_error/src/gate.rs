//! Gatehouse error wrapper types.

/// Kinds of gatehouse errors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum GateErrorKind {
    /// Invalid or unreadable configuration
    #[display("Configuration error: {}", _0)]
    Configuration(String),

    /// A scanner pattern failed to compile
    #[display("Invalid scan pattern '{}': {}", pattern, reason)]
    InvalidPattern {
        /// The offending pattern source
        pattern: String,
        /// Why compilation failed
        reason: String,
    },

    /// A handler was registered twice for the same resource kind
    #[display("Handler already registered for resource kind '{}'", resource_kind)]
    DuplicateHandler {
        /// Resource kind with the conflicting registration
        resource_kind: String,
    },

    /// The rate limiter was used after shutdown
    #[display("Rate limiter has been shut down")]
    LimiterShutDown,
}

/// Gatehouse error with location tracking.
///
/// # Examples
///
/// ```
/// use gatehouse_error::{GateError, GateErrorKind};
///
/// let err = GateError::new(GateErrorKind::Configuration("missing field".to_string()));
/// assert!(format!("{}", err).contains("missing field"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Gatehouse Error: {} at line {} in {}", kind, line, file)]
pub struct GateError {
    /// The specific error kind
    pub kind: GateErrorKind,
    /// Line number where the error was created
    pub line: u32,
    /// File where the error was created
    pub file: &'static str,
}

impl GateError {
    /// Create a new error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: GateErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &GateErrorKind {
        &self.kind
    }
}

/// Result type for gatehouse operations.
pub type GateResult<T> = std::result::Result<T, GateError>;

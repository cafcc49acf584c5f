//! Error types for the CFA core

use thiserror::Error;

/// CFA core errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // Construction errors
    /// Operand or result type does not fit the operator
    ///
    /// **Triggered by:** Building an expression whose operands violate the operator's domain
    /// **Example:** `Add(Bool, Int)`, `Select(Int, ..)` (condition must be Bool)
    #[error("Type error: expected {expected}, got {got}")]
    TypeMismatch {
        /// Expected type description
        expected: String,
        /// Actual type received
        got: String,
    },

    /// Wrong number of operands or members
    #[error("Invalid arity for {what}: expected {expected}, got {got}")]
    InvalidArity {
        /// Construct being built
        what: String,
        /// Expected count
        expected: usize,
        /// Actual count
        got: usize,
    },

    /// Tuple index out of bounds
    ///
    /// **Triggered by:** `tuple_select` with an index beyond the tuple's arity
    #[error("Index out of bounds: {index} for tuple of length {length}")]
    IndexOutOfBounds {
        /// Requested index
        index: usize,
        /// Tuple arity
        length: usize,
    },

    /// A composite type was requested with an invalid shape
    #[error("Invalid type: {0}")]
    InvalidType(String),

    /// Variable name already registered in the context
    #[error("Variable already exists: {name}")]
    DuplicateVariable {
        /// Qualified name
        name: String,
    },

    // Transformation errors
    /// Call inlining reached a call cycle
    #[error("Cannot inline recursive call to automaton '{cfa}'")]
    RecursiveCall {
        /// Name of the automaton called recursively
        cfa: String,
    },

    /// The system has no main automaton
    #[error("No main automaton has been set")]
    NoMainAutomaton,

    // Parse errors
    /// Syntax error in tool output
    #[error("Syntax error at line {line}, column {col}: {message}")]
    SyntaxError {
        /// Line number where error occurred
        line: usize,
        /// Column number where error occurred
        col: usize,
        /// Error description
        message: String,
    },

    /// Unexpected end of input while parsing
    #[error("Unexpected end of input")]
    UnexpectedEof,

    // Environment errors
    /// External tool or support file missing
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// File system or pipe failure
    #[error("I/O error: {0}")]
    Io(String),

    /// Writing the model failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// General internal error
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Error severity classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Programming error, never expected on correct inputs
    Fatal,
    /// Environment or protocol failure that a caller may handle
    Recoverable,
    /// Diagnostic only
    Warning,
}

impl Error {
    /// Create an internal error with a message
    pub fn internal(msg: impl Into<String>) -> Self {
        Error::InternalError(msg.into())
    }

    /// Create a type mismatch error
    pub fn type_mismatch(expected: impl Into<String>, got: impl Into<String>) -> Self {
        Error::TypeMismatch {
            expected: expected.into(),
            got: got.into(),
        }
    }

    /// Classify error severity
    pub fn classify(&self) -> ErrorSeverity {
        match self {
            Error::TypeMismatch { .. } => ErrorSeverity::Fatal,
            Error::InvalidArity { .. } => ErrorSeverity::Fatal,
            Error::IndexOutOfBounds { .. } => ErrorSeverity::Fatal,
            Error::InvalidType(_) => ErrorSeverity::Fatal,
            Error::RecursiveCall { .. } => ErrorSeverity::Fatal,
            Error::NoMainAutomaton => ErrorSeverity::Fatal,

            Error::ToolNotFound(_) => ErrorSeverity::Recoverable,
            Error::Io(_) => ErrorSeverity::Recoverable,
            Error::Serialization(_) => ErrorSeverity::Recoverable,
            Error::SyntaxError { .. } => ErrorSeverity::Recoverable,
            Error::UnexpectedEof => ErrorSeverity::Recoverable,
            Error::InternalError(_) => ErrorSeverity::Recoverable,

            Error::DuplicateVariable { .. } => ErrorSeverity::Warning,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

impl From<std::fmt::Error> for Error {
    fn from(e: std::fmt::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Result type for CFA core operations
pub type Result<T> = std::result::Result<T, Error>;

//! Error types for abacus.
//!
//! A single invocation either fully applies or fails with one of these
//! errors before any store mutation. There is no partial-success
//! reporting across sketches within one invocation.

use thiserror::Error;

/// Result type alias for abacus operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for abacus.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Command parsing and validation errors
    #[error("command error: {0}")]
    Command(#[from] CommandError),

    /// Storage errors
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Command parsing and validation errors.
///
/// All of these are raised at the invocation boundary, before any
/// mutation begins.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Unknown command name
    #[error("ERR unknown command '{0}'")]
    UnknownCommand(String),

    /// Empty or malformed argument vector
    #[error("ERR syntax error")]
    SyntaxError,

    /// Wrong number of arguments
    #[error("ERR wrong number of arguments for '{command}' command")]
    WrongArity {
        /// Command name that received wrong arity
        command: String,
    },

    /// Key count is not a positive multiple of the per-sketch span
    #[error("ERR number of keys must be a positive multiple of {span}, got {count}")]
    BadKeyCount {
        /// Number of keys supplied
        count: usize,
        /// Keys addressed per sketch
        span: usize,
    },

    /// Not an integer
    #[error("ERR value is not an integer or out of range")]
    NotInteger,

    /// Zero or negative increment delta
    #[error("ERR increment must be a positive integer")]
    NonPositiveDelta,

    /// Zero depth or width on sketch creation
    #[error("ERR depth and width must be at least 1")]
    ZeroDimension,
}

/// Storage-level errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Key holds a different shape than the operation expects
    #[error("WRONGTYPE key holds the wrong kind of value")]
    WrongType,
}

impl Error {
    /// Returns true if this error was caused by the caller's input.
    #[inline]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::Command(_))
    }
}

//! Error types for sqlfauna.

use std::time::Duration;
use thiserror::Error;

/// The main error type for sqlfauna operations.
///
/// Syntax, unsupported-construct and remote failures are kept apart so a
/// caller can tell bad input from a capability gap from a store rejection.
#[derive(Debug, Error)]
pub enum FaunaError {
    /// The SQL text cannot be mapped to a query model.
    #[error("Syntax error: {0}")]
    Syntax(String),

    /// The query model asks for something FQL cannot express.
    #[error("Unsupported construct: {0}")]
    Unsupported(String),

    /// The remote database rejected or failed the query.
    #[error("Remote error [{status}] {code}: {message}")]
    Remote {
        status: u16,
        code: String,
        message: String,
    },

    /// The network call did not complete within the configured timeout.
    #[error("Network timeout after {0:?}")]
    Timeout(Duration),

    /// Transport failure before a response was received.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Driver operation the store cannot offer.
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// Misuse of a cursor or connection.
    #[error("Interface error: {0}")]
    Interface(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Response body was not a valid wire document.
    #[error("Decode error: {0}")]
    Decode(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FaunaError {
    /// Create a syntax error.
    pub fn syntax(message: impl Into<String>) -> Self {
        Self::Syntax(message.into())
    }

    /// Create an unsupported-construct error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }

    pub fn is_syntax(&self) -> bool {
        matches!(self, Self::Syntax(_))
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported(_))
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }
}

/// Result type alias for sqlfauna operations.
pub type FaunaResult<T> = Result<T, FaunaError>;

// SPDX-License-Identifier: MIT OR Apache-2.0

//! Engine error types.
//!
//! Every failure the engine can report at query-submission or
//! stream-registration time lives here. Per-event evaluation has no error
//! path by design: missing data resolves to an absent value, not an error.

use thiserror::Error;

use crate::sql_compiler::{LexError, ParseError};

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors raised by stream registration and query submission
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("lex error: {0}")]
    Lex(#[from] LexError),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// A query names an input stream that is not registered.
    #[error("input stream not found: \"{name}\"")]
    InputStreamNotFound { name: String },

    /// A query names an output stream that is not registered.
    #[error("output stream not found: \"{name}\"")]
    OutputStreamNotFound { name: String },

    /// A selection or filter field references a stream that is not among
    /// the query's sources.
    #[error("stream \"{name}\" is not among the query's sources")]
    StreamNotInQuery { name: String },

    /// A stream with the same name is already registered.
    #[error("a stream named \"{name}\" is already registered")]
    DuplicateStream { name: String },

    /// An output callback returned a failure. Reported via logging only;
    /// delivery to sibling callbacks continues.
    #[error("output callback failed: {message}")]
    Callback { message: String },
}

impl EngineError {
    /// Create an input-stream binding error
    pub fn input_stream_not_found(name: impl Into<String>) -> Self {
        Self::InputStreamNotFound { name: name.into() }
    }

    /// Create an output-stream binding error
    pub fn output_stream_not_found(name: impl Into<String>) -> Self {
        Self::OutputStreamNotFound { name: name.into() }
    }

    /// Create an unbound-stream compilation error
    pub fn stream_not_in_query(name: impl Into<String>) -> Self {
        Self::StreamNotInQuery { name: name.into() }
    }

    /// Create a duplicate-registration error
    pub fn duplicate_stream(name: impl Into<String>) -> Self {
        Self::DuplicateStream { name: name.into() }
    }

    /// Create a callback failure
    pub fn callback(message: impl Into<String>) -> Self {
        Self::Callback {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_error_messages_carry_stream_name() {
        let error = EngineError::input_stream_not_found("sensors");
        assert!(matches!(error, EngineError::InputStreamNotFound { .. }));
        assert!(error.to_string().contains("\"sensors\""));

        let error = EngineError::output_stream_not_found("alerts");
        assert!(error.to_string().contains("\"alerts\""));
    }

    #[test]
    fn test_duplicate_stream_error() {
        let error = EngineError::duplicate_stream("input");
        assert!(matches!(error, EngineError::DuplicateStream { .. }));
    }
}

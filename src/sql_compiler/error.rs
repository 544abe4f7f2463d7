// SPDX-License-Identifier: MIT OR Apache-2.0

//! Structured lex and parse failures.
//!
//! Both carry the byte offset of the offending input so callers can point
//! at the exact position in the submitted query text.

use thiserror::Error;

/// Failure while tokenizing query text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("unexpected character '{character}' at offset {offset}")]
    UnexpectedCharacter { character: char, offset: usize },

    #[error("unterminated string literal starting at offset {offset}")]
    UnterminatedString { offset: usize },
}

/// Failure while parsing a token sequence
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unexpected {found} at offset {offset}, expected {expected}")]
    UnexpectedToken {
        found: String,
        expected: String,
        offset: usize,
    },

    #[error("unexpected end of query, expected {expected}")]
    UnexpectedEnd { expected: String },
}

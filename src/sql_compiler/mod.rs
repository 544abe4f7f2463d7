// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQL-like query front end.
//!
//! Turns continuous-query text into the [`QueryAst`](crate::query_api::QueryAst)
//! the execution engine consumes. [`compile`] is the one-call entry point
//! used by [`EventProcessor::create_query`](crate::core::processor::EventProcessor::create_query).

pub mod error;
pub mod lexer;
pub mod parser;

pub use self::error::{LexError, ParseError};
pub use self::lexer::{lex, Token, TokenKind};
pub use self::parser::parse;

use crate::core::error::EngineResult;
use crate::query_api::QueryAst;

/// Lex and parse query text into an AST
pub fn compile(query: &str) -> EngineResult<QueryAst> {
    let tokens = lex(query)?;
    Ok(parse(tokens)?)
}

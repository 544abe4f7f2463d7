// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recursive-descent parser for the continuous-query grammar:
//!
//! ```text
//! QUERY          := SELECT fields FROM source [JOIN source ON predicate]* INTO destination [WHERE predicate]
//! fields         := "*" | qualifiedField ("," qualifiedField)*
//! qualifiedField := name "." name ("." name)* | name "." "*"
//! predicate      := operand comparator operand
//! operand        := qualifiedField | numericLiteral | stringLiteral
//! comparator     := ">" | ">=" | "<" | "<=" | "==" | "!="
//! ```
//!
//! Join predicates are restricted to `field == field`. Trailing tokens after
//! a complete query are rejected.

use crate::query_api::{
    Comparator, FieldQualifier, FilterClause, JoinEdge, Operand, QueryAst, SelectField,
    SelectionClause, SourceClause,
};

use super::error::ParseError;
use super::lexer::{Token, TokenKind};

/// Parse a token sequence into a query AST
pub fn parse(tokens: Vec<Token>) -> Result<QueryAst, ParseError> {
    let mut parser = Parser { tokens, pos: 0 };
    let selection = parser.parse_selection()?;
    let source = parser.parse_source()?;
    let output = parser.parse_output()?;
    let filter = parser.parse_filter()?;
    parser.expect_end()?;
    Ok(QueryAst {
        selection,
        source,
        output,
        filter,
    })
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    /// Consume the next token if `matches` accepts its kind
    fn eat(&mut self, matches: impl Fn(&TokenKind) -> bool) -> Option<&Token> {
        if self.peek().is_some_and(|t| matches(&t.kind)) {
            let token = &self.tokens[self.pos];
            self.pos += 1;
            Some(token)
        } else {
            None
        }
    }

    /// Structured error describing the current token (or end of input)
    fn unexpected(&self, expected: &str) -> ParseError {
        match self.peek() {
            Some(token) => ParseError::UnexpectedToken {
                found: token.kind.describe(),
                expected: expected.to_string(),
                offset: token.offset,
            },
            None => ParseError::UnexpectedEnd {
                expected: expected.to_string(),
            },
        }
    }

    fn expect(
        &mut self,
        matches: impl Fn(&TokenKind) -> bool,
        expected: &str,
    ) -> Result<&Token, ParseError> {
        if self.peek().is_some_and(|t| matches(&t.kind)) {
            let token = &self.tokens[self.pos];
            self.pos += 1;
            Ok(token)
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn expect_name(&mut self, expected: &str) -> Result<String, ParseError> {
        let token = self.expect(|k| matches!(k, TokenKind::Name(_)), expected)?;
        match &token.kind {
            TokenKind::Name(name) => Ok(name.clone()),
            _ => unreachable!("expect matched a name"),
        }
    }

    fn parse_selection(&mut self) -> Result<SelectionClause, ParseError> {
        self.expect(|k| matches!(k, TokenKind::Select), "keyword SELECT")?;
        let mut fields = vec![self.parse_field()?];
        while self.eat(|k| matches!(k, TokenKind::Comma)).is_some() {
            fields.push(self.parse_field()?);
        }
        Ok(SelectionClause::new(fields))
    }

    fn parse_field(&mut self) -> Result<SelectField, ParseError> {
        if self.eat(|k| matches!(k, TokenKind::Star)).is_some() {
            return Ok(SelectField::All);
        }
        let stream = self.expect_name("'*' or a qualified field")?;
        self.expect(|k| matches!(k, TokenKind::Dot), "'.'")?;
        if self.eat(|k| matches!(k, TokenKind::Star)).is_some() {
            return Ok(SelectField::AllOf(stream));
        }
        let qualifier = self.parse_path(stream)?;
        Ok(SelectField::Field(qualifier))
    }

    /// Parse the remaining `.name` segments of a qualifier whose stream name
    /// and first dot were already consumed
    fn parse_path(&mut self, stream: String) -> Result<FieldQualifier, ParseError> {
        let mut path = vec![self.expect_name("a field name")?];
        while self.eat(|k| matches!(k, TokenKind::Dot)).is_some() {
            path.push(self.expect_name("a field name")?);
        }
        Ok(FieldQualifier::new(stream, path))
    }

    fn parse_qualifier(&mut self, expected: &str) -> Result<FieldQualifier, ParseError> {
        let stream = self.expect_name(expected)?;
        self.expect(|k| matches!(k, TokenKind::Dot), "'.'")?;
        self.parse_path(stream)
    }

    fn parse_source(&mut self) -> Result<SourceClause, ParseError> {
        self.expect(|k| matches!(k, TokenKind::From), "keyword FROM")?;
        let first = self.expect_name("an input stream name")?;
        let mut edges = Vec::new();
        while self.eat(|k| matches!(k, TokenKind::Join)).is_some() {
            let stream = self.expect_name("an input stream name")?;
            self.expect(|k| matches!(k, TokenKind::On), "keyword ON")?;
            let left = self.parse_qualifier("a join field")?;
            let comparator = self.parse_comparator()?;
            if comparator != Comparator::Eq {
                // Join predicates are equality only; point at the comparator.
                let offset = self.tokens[self.pos - 1].offset;
                return Err(ParseError::UnexpectedToken {
                    found: format!("comparator '{comparator}'"),
                    expected: "'=='".to_string(),
                    offset,
                });
            }
            let right = self.parse_qualifier("a join field")?;
            edges.push(JoinEdge {
                stream,
                left,
                right,
            });
        }
        if edges.is_empty() {
            Ok(SourceClause::Single(first))
        } else {
            Ok(SourceClause::Join { first, edges })
        }
    }

    fn parse_output(&mut self) -> Result<String, ParseError> {
        self.expect(|k| matches!(k, TokenKind::Into), "keyword INTO")?;
        self.expect_name("an output stream name")
    }

    fn parse_filter(&mut self) -> Result<Option<FilterClause>, ParseError> {
        if self.eat(|k| matches!(k, TokenKind::Where)).is_none() {
            return Ok(None);
        }
        let left = self.parse_operand()?;
        let comparator = self.parse_comparator()?;
        let right = self.parse_operand()?;
        Ok(Some(FilterClause::new(left, comparator, right)))
    }

    fn parse_comparator(&mut self) -> Result<Comparator, ParseError> {
        let token = self.expect(|k| matches!(k, TokenKind::Comparator(_)), "a comparator")?;
        match token.kind {
            TokenKind::Comparator(comparator) => Ok(comparator),
            _ => unreachable!("expect matched a comparator"),
        }
    }

    fn parse_operand(&mut self) -> Result<Operand, ParseError> {
        if let Some(token) = self.eat(|k| {
            matches!(k, TokenKind::Number(_)) || matches!(k, TokenKind::StringLit(_))
        }) {
            return Ok(match &token.kind {
                TokenKind::Number(value) => Operand::Number(*value),
                TokenKind::StringLit(value) => Operand::String(value.clone()),
                _ => unreachable!("eat matched a literal"),
            });
        }
        let qualifier =
            self.parse_qualifier("a comparison operand (number, string or field)")?;
        Ok(Operand::Field(qualifier))
    }

    fn expect_end(&mut self) -> Result<(), ParseError> {
        if self.peek().is_some() {
            Err(self.unexpected("end of query"))
        } else {
            Ok(())
        }
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query text tokenizer.
//!
//! Converts query text into a flat token sequence. Keywords are matched
//! case-insensitively, string literals are double-quoted with `""` as the
//! escape for an embedded quote, and every token records the byte offset it
//! started at. An unrecognized character is a hard [`LexError`], never a
//! silent truncation of the token stream.

use crate::query_api::Comparator;

use super::error::LexError;

/// What a token is, with literal payloads where applicable
#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    Select,
    From,
    Join,
    On,
    Where,
    Into,
    Comma,
    Dot,
    Star,
    Comparator(Comparator),
    Name(String),
    Number(f64),
    StringLit(String),
}

impl TokenKind {
    /// Human-readable description used in parse errors
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Select => "keyword SELECT".to_string(),
            TokenKind::From => "keyword FROM".to_string(),
            TokenKind::Join => "keyword JOIN".to_string(),
            TokenKind::On => "keyword ON".to_string(),
            TokenKind::Where => "keyword WHERE".to_string(),
            TokenKind::Into => "keyword INTO".to_string(),
            TokenKind::Comma => "','".to_string(),
            TokenKind::Dot => "'.'".to_string(),
            TokenKind::Star => "'*'".to_string(),
            TokenKind::Comparator(c) => format!("comparator '{c}'"),
            TokenKind::Name(n) => format!("name \"{n}\""),
            TokenKind::Number(n) => format!("number {n}"),
            TokenKind::StringLit(s) => format!("string \"{s}\""),
        }
    }
}

/// One token plus the byte offset it started at in the query text
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub offset: usize,
}

impl Token {
    fn new(kind: TokenKind, offset: usize) -> Self {
        Self { kind, offset }
    }
}

/// Tokenize a complete query string
pub fn lex(query: &str) -> Result<Vec<Token>, LexError> {
    let mut tokens = Vec::new();
    let mut offset = 0;

    while offset < query.len() {
        let rest = &query[offset..];
        let c = rest.chars().next().unwrap_or_default();

        if c.is_whitespace() {
            offset += c.len_utf8();
            continue;
        }

        let (kind, consumed) = match c {
            ',' => (TokenKind::Comma, 1),
            '.' => (TokenKind::Dot, 1),
            '*' => (TokenKind::Star, 1),
            '>' => {
                if rest.as_bytes().get(1) == Some(&b'=') {
                    (TokenKind::Comparator(Comparator::Ge), 2)
                } else {
                    (TokenKind::Comparator(Comparator::Gt), 1)
                }
            }
            '<' => {
                if rest.as_bytes().get(1) == Some(&b'=') {
                    (TokenKind::Comparator(Comparator::Le), 2)
                } else {
                    (TokenKind::Comparator(Comparator::Lt), 1)
                }
            }
            '=' => {
                if rest.as_bytes().get(1) == Some(&b'=') {
                    (TokenKind::Comparator(Comparator::Eq), 2)
                } else {
                    return Err(LexError::UnexpectedCharacter {
                        character: '=',
                        offset,
                    });
                }
            }
            '!' => {
                if rest.as_bytes().get(1) == Some(&b'=') {
                    (TokenKind::Comparator(Comparator::Ne), 2)
                } else {
                    return Err(LexError::UnexpectedCharacter {
                        character: '!',
                        offset,
                    });
                }
            }
            '"' => lex_string(rest, offset)?,
            c if c.is_ascii_digit() => lex_number(rest),
            c if c.is_ascii_alphabetic() || c == '_' => lex_word(rest),
            other => {
                return Err(LexError::UnexpectedCharacter {
                    character: other,
                    offset,
                })
            }
        };

        tokens.push(Token::new(kind, offset));
        offset += consumed;
    }

    Ok(tokens)
}

/// Scan a double-quoted string literal. `""` inside the literal is an
/// escaped quote.
fn lex_string(rest: &str, offset: usize) -> Result<(TokenKind, usize), LexError> {
    let bytes = rest.as_bytes();
    let mut value = String::new();
    let mut i = 1;
    loop {
        match bytes.get(i) {
            None => return Err(LexError::UnterminatedString { offset }),
            Some(b'"') => {
                if bytes.get(i + 1) == Some(&b'"') {
                    value.push('"');
                    i += 2;
                } else {
                    return Ok((TokenKind::StringLit(value), i + 1));
                }
            }
            Some(_) => {
                // Strings may contain arbitrary UTF-8; advance a full char.
                let c = rest[i..].chars().next().unwrap_or_default();
                value.push(c);
                i += c.len_utf8();
            }
        }
    }
}

/// Scan an integer or decimal literal
fn lex_number(rest: &str) -> (TokenKind, usize) {
    let bytes = rest.as_bytes();
    let mut i = 0;
    while bytes.get(i).is_some_and(|b| b.is_ascii_digit()) {
        i += 1;
    }
    if bytes.get(i) == Some(&b'.') && bytes.get(i + 1).is_some_and(|b| b.is_ascii_digit()) {
        i += 1;
        while bytes.get(i).is_some_and(|b| b.is_ascii_digit()) {
            i += 1;
        }
    }
    let value: f64 = rest[..i].parse().unwrap_or_default();
    (TokenKind::Number(value), i)
}

/// Scan a word and classify it as a keyword or a name
fn lex_word(rest: &str) -> (TokenKind, usize) {
    let bytes = rest.as_bytes();
    let mut i = 0;
    while bytes
        .get(i)
        .is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'_')
    {
        i += 1;
    }
    let word = &rest[..i];
    let kind = if word.eq_ignore_ascii_case("select") {
        TokenKind::Select
    } else if word.eq_ignore_ascii_case("from") {
        TokenKind::From
    } else if word.eq_ignore_ascii_case("join") {
        TokenKind::Join
    } else if word.eq_ignore_ascii_case("on") {
        TokenKind::On
    } else if word.eq_ignore_ascii_case("where") {
        TokenKind::Where
    } else if word.eq_ignore_ascii_case("into") {
        TokenKind::Into
    } else {
        TokenKind::Name(word.to_string())
    };
    (kind, i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(query: &str) -> Vec<TokenKind> {
        lex(query).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_simple_select_case_insensitive() {
        assert_eq!(
            kinds("SELECT * From input INTo output"),
            vec![
                TokenKind::Select,
                TokenKind::Star,
                TokenKind::From,
                TokenKind::Name("input".to_string()),
                TokenKind::Into,
                TokenKind::Name("output".to_string()),
            ]
        );
    }

    #[test]
    fn test_qualified_fields_and_commas() {
        assert_eq!(
            kinds("Select something.fieldname, other.*"),
            vec![
                TokenKind::Select,
                TokenKind::Name("something".to_string()),
                TokenKind::Dot,
                TokenKind::Name("fieldname".to_string()),
                TokenKind::Comma,
                TokenKind::Name("other".to_string()),
                TokenKind::Dot,
                TokenKind::Star,
            ]
        );
    }

    #[test]
    fn test_comparators() {
        assert_eq!(
            kinds("> >= < <= == !="),
            vec![
                TokenKind::Comparator(Comparator::Gt),
                TokenKind::Comparator(Comparator::Ge),
                TokenKind::Comparator(Comparator::Lt),
                TokenKind::Comparator(Comparator::Le),
                TokenKind::Comparator(Comparator::Eq),
                TokenKind::Comparator(Comparator::Ne),
            ]
        );
    }

    #[test]
    fn test_numeric_literals() {
        assert_eq!(
            kinds("6 6.5"),
            vec![TokenKind::Number(6.0), TokenKind::Number(6.5)]
        );
    }

    #[test]
    fn test_string_literal_with_escaped_quotes() {
        assert_eq!(
            kinds(r#""with escaped ""string"" within""#),
            vec![TokenKind::StringLit(
                "with escaped \"string\" within".to_string()
            )]
        );
        assert_eq!(kinds(r#""""#), vec![TokenKind::StringLit(String::new())]);
    }

    #[test]
    fn test_join_clause() {
        assert_eq!(
            kinds("From input1 JOIN input2 ON input1.x == input2.x"),
            vec![
                TokenKind::From,
                TokenKind::Name("input1".to_string()),
                TokenKind::Join,
                TokenKind::Name("input2".to_string()),
                TokenKind::On,
                TokenKind::Name("input1".to_string()),
                TokenKind::Dot,
                TokenKind::Name("x".to_string()),
                TokenKind::Comparator(Comparator::Eq),
                TokenKind::Name("input2".to_string()),
                TokenKind::Dot,
                TokenKind::Name("x".to_string()),
            ]
        );
    }

    #[test]
    fn test_keyword_prefix_is_a_name() {
        // "selection" starts with "select" but must lex as a single name
        assert_eq!(
            kinds("selection"),
            vec![TokenKind::Name("selection".to_string())]
        );
    }

    #[test]
    fn test_unexpected_character_reports_offset() {
        let err = lex("SELECT # FROM input").unwrap_err();
        assert_eq!(
            err,
            LexError::UnexpectedCharacter {
                character: '#',
                offset: 7
            }
        );
    }

    #[test]
    fn test_unterminated_string() {
        let err = lex("WHERE input.x == \"oops").unwrap_err();
        assert_eq!(err, LexError::UnterminatedString { offset: 17 });
    }

    #[test]
    fn test_token_offsets() {
        let tokens = lex("SELECT *").unwrap();
        assert_eq!(tokens[0].offset, 0);
        assert_eq!(tokens[1].offset, 7);
    }
}

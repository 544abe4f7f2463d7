// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query AST consumed by the execution engine.
//!
//! These types are the contract between the SQL front end
//! ([`sql_compiler`](crate::sql_compiler)) and the execution engine
//! ([`Job`](crate::core::query::Job)): a structural description of the
//! SELECT fields, the FROM/JOIN source graph, an optional WHERE predicate
//! and the INTO destination. Union-typed positions (field vs. literal,
//! `*` vs. qualified field) are closed sums so every consumption site can
//! match exhaustively.

use std::fmt;

/// Addresses a (possibly nested) field of one stream's event body within a
/// complex event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldQualifier {
    /// Name of the source stream the field belongs to
    pub stream: String,
    /// Property path into the event body, one segment per nesting level
    pub path: Vec<String>,
}

impl FieldQualifier {
    pub fn new(stream: impl Into<String>, path: Vec<String>) -> Self {
        Self {
            stream: stream.into(),
            path,
        }
    }

    /// The qualifier with its stream name lower-cased. Stream names are
    /// case-normalized at binding time; property paths stay case-sensitive.
    pub fn normalized(&self) -> Self {
        Self {
            stream: self.stream.to_lowercase(),
            path: self.path.clone(),
        }
    }
}

/// Closed comparator set for filter predicates and join conditions
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Comparator {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
}

impl Comparator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Comparator::Gt => ">",
            Comparator::Ge => ">=",
            Comparator::Lt => "<",
            Comparator::Le => "<=",
            Comparator::Eq => "==",
            Comparator::Ne => "!=",
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One operand of a filter predicate: a field lookup or a literal
#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    Field(FieldQualifier),
    Number(f64),
    String(String),
}

/// One field of the SELECT clause
#[derive(Clone, Debug, PartialEq)]
pub enum SelectField {
    /// `*`: every field of every source
    All,
    /// `source.*`: every field of one source
    AllOf(String),
    /// `source.field`: exactly one qualified field
    Field(FieldQualifier),
}

/// Ordered SELECT field list. Declaration order is overwrite order on key
/// collision.
#[derive(Clone, Debug, PartialEq)]
pub struct SelectionClause {
    pub fields: Vec<SelectField>,
}

impl SelectionClause {
    pub fn new(fields: Vec<SelectField>) -> Self {
        Self { fields }
    }
}

/// One `JOIN source ON left == right` edge of the source graph. The edge's
/// graph endpoints are the streams named by the two predicate qualifiers.
#[derive(Clone, Debug, PartialEq)]
pub struct JoinEdge {
    /// The stream named after JOIN
    pub stream: String,
    pub left: FieldQualifier,
    pub right: FieldQualifier,
}

/// The FROM clause: a single source or a chain of join edges
#[derive(Clone, Debug, PartialEq)]
pub enum SourceClause {
    Single(String),
    Join {
        /// The stream named directly after FROM
        first: String,
        edges: Vec<JoinEdge>,
    },
}

/// The WHERE clause: one binary comparison
#[derive(Clone, Debug, PartialEq)]
pub struct FilterClause {
    pub left: Operand,
    pub comparator: Comparator,
    pub right: Operand,
}

impl FilterClause {
    pub fn new(left: Operand, comparator: Comparator, right: Operand) -> Self {
        Self {
            left,
            comparator,
            right,
        }
    }
}

/// A fully parsed continuous query
#[derive(Clone, Debug, PartialEq)]
pub struct QueryAst {
    pub selection: SelectionClause,
    pub source: SourceClause,
    /// Destination output stream name (INTO clause)
    pub output: String,
    pub filter: Option<FilterClause>,
}

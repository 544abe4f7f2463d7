// SPDX-License-Identifier: MIT OR Apache-2.0

//! Compiled expression executors.
//!
//! A query is compiled exactly once into executor values; every arriving
//! event is then evaluated against the shared executors with no re-parsing
//! and no per-call mutable state.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde_json::{Map, Value};

use crate::core::error::{EngineError, EngineResult};
use crate::core::event::{resolve_field, ComplexEvent};
use crate::query_api::{
    Comparator, FieldQualifier, FilterClause, Operand, SelectField, SelectionClause,
};

/// Value equality for filter and join predicates. Numbers compare
/// numerically across integer/float representations; everything else is
/// structural equality.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Ordering for the `>` `>=` `<` `<=` comparators. Defined for
/// number/number and string/string pairs; anything else does not order.
fn values_ordering(a: &Value, b: &Value) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x.partial_cmp(&y);
    }
    match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// One side of a compiled comparison: a literal or a field lookup
#[derive(Debug)]
pub enum OperandExecutor {
    Literal(Value),
    Field(FieldQualifier),
}

impl OperandExecutor {
    /// Compile an operand, validating that a field operand names one of the
    /// query's participating streams.
    pub fn new(operand: &Operand, participating: &BTreeSet<String>) -> EngineResult<Self> {
        match operand {
            Operand::Number(value) => Ok(Self::Literal(Value::from(*value))),
            Operand::String(value) => Ok(Self::Literal(Value::from(value.clone()))),
            Operand::Field(qualifier) => {
                let qualifier = qualifier.normalized();
                if !participating.contains(&qualifier.stream) {
                    return Err(EngineError::stream_not_in_query(&qualifier.stream));
                }
                Ok(Self::Field(qualifier))
            }
        }
    }

    /// Literals always resolve to themselves; field lookups resolve through
    /// the complex event and may be absent.
    pub fn execute<'a>(&'a self, complex: &'a ComplexEvent) -> Option<&'a Value> {
        match self {
            OperandExecutor::Literal(value) => Some(value),
            OperandExecutor::Field(qualifier) => resolve_field(complex, qualifier),
        }
    }
}

/// Compiled WHERE predicate
#[derive(Debug)]
pub struct FilterExecutor {
    left: OperandExecutor,
    comparator: Comparator,
    right: OperandExecutor,
}

impl FilterExecutor {
    pub fn new(filter: &FilterClause, participating: &BTreeSet<String>) -> EngineResult<Self> {
        Ok(Self {
            left: OperandExecutor::new(&filter.left, participating)?,
            comparator: filter.comparator,
            right: OperandExecutor::new(&filter.right, participating)?,
        })
    }

    /// Evaluate the predicate against one candidate row.
    ///
    /// Equality is value equality on the resolved operands; two absent
    /// operands are equal, absent versus present are not. Ordering
    /// comparators require both operands present and mutually ordered.
    pub fn matches(&self, complex: &ComplexEvent) -> bool {
        let left = self.left.execute(complex);
        let right = self.right.execute(complex);
        let equal = match (left, right) {
            (None, None) => true,
            (Some(a), Some(b)) => values_equal(a, b),
            _ => false,
        };
        match self.comparator {
            Comparator::Eq => equal,
            Comparator::Ne => !equal,
            Comparator::Gt | Comparator::Ge | Comparator::Lt | Comparator::Le => {
                let ordering = match (left, right) {
                    (Some(a), Some(b)) => values_ordering(a, b),
                    _ => None,
                };
                match (self.comparator, ordering) {
                    (Comparator::Gt, Some(Ordering::Greater)) => true,
                    (Comparator::Ge, Some(Ordering::Greater | Ordering::Equal)) => true,
                    (Comparator::Lt, Some(Ordering::Less)) => true,
                    (Comparator::Le, Some(Ordering::Less | Ordering::Equal)) => true,
                    _ => false,
                }
            }
        }
    }
}

/// One compiled SELECT field
#[derive(Debug)]
enum ProjectionStep {
    /// `*`: copy every field of every participating stream
    AllStreams,
    /// `source.*`: copy every field of one stream's body
    AllOf(String),
    /// `source.field`: copy one field under its own (final-segment) name
    Field {
        key: String,
        qualifier: FieldQualifier,
    },
}

/// Compiled SELECT clause. Steps run in declaration order; later steps
/// overwrite earlier ones on key collision.
#[derive(Debug)]
pub struct ProjectExecutor {
    steps: Vec<ProjectionStep>,
}

impl ProjectExecutor {
    pub fn new(
        selection: &SelectionClause,
        participating: &BTreeSet<String>,
    ) -> EngineResult<Self> {
        let mut steps = Vec::with_capacity(selection.fields.len());
        for field in &selection.fields {
            match field {
                SelectField::All => steps.push(ProjectionStep::AllStreams),
                SelectField::AllOf(stream) => {
                    let stream = stream.to_lowercase();
                    if !participating.contains(&stream) {
                        return Err(EngineError::stream_not_in_query(&stream));
                    }
                    steps.push(ProjectionStep::AllOf(stream));
                }
                SelectField::Field(qualifier) => {
                    let qualifier = qualifier.normalized();
                    if !participating.contains(&qualifier.stream) {
                        return Err(EngineError::stream_not_in_query(&qualifier.stream));
                    }
                    let key = qualifier
                        .path
                        .last()
                        .cloned()
                        .unwrap_or_else(|| qualifier.stream.clone());
                    steps.push(ProjectionStep::Field { key, qualifier });
                }
            }
        }
        Ok(Self { steps })
    }

    /// Build the output value for one surviving candidate row. A qualified
    /// field that resolves to absent contributes no key.
    pub fn execute(&self, complex: &ComplexEvent) -> Value {
        let mut result = Map::new();
        for step in &self.steps {
            match step {
                ProjectionStep::AllStreams => {
                    for envelope in complex.values() {
                        copy_object(&envelope.body, &mut result);
                    }
                }
                ProjectionStep::AllOf(stream) => {
                    if let Some(envelope) = complex.get(stream) {
                        copy_object(&envelope.body, &mut result);
                    }
                }
                ProjectionStep::Field { key, qualifier } => {
                    if let Some(value) = resolve_field(complex, qualifier) {
                        result.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        Value::Object(result)
    }
}

/// Copy every top-level property of an object body into the result map
fn copy_object(body: &Value, result: &mut Map<String, Value>) {
    if let Value::Object(fields) = body {
        for (key, value) in fields {
            result.insert(key.clone(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event::EventEnvelope;
    use chrono::Utc;
    use serde_json::json;
    use std::sync::Arc;

    fn complex(entries: &[(&str, Value)]) -> ComplexEvent {
        entries
            .iter()
            .enumerate()
            .map(|(i, (name, body))| {
                (
                    name.to_string(),
                    Arc::new(EventEnvelope {
                        body: body.clone(),
                        sequence_id: i as u64,
                        timestamp: Utc::now(),
                    }),
                )
            })
            .collect()
    }

    fn participating(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn filter(
        left: Operand,
        comparator: Comparator,
        right: Operand,
        streams: &[&str],
    ) -> FilterExecutor {
        FilterExecutor::new(
            &FilterClause::new(left, comparator, right),
            &participating(streams),
        )
        .unwrap()
    }

    fn temp_filter(comparator: Comparator, threshold: f64) -> FilterExecutor {
        filter(
            Operand::Field(FieldQualifier::new("input", vec!["temp".to_string()])),
            comparator,
            Operand::Number(threshold),
            &["input"],
        )
    }

    #[test]
    fn test_boundary_values_satisfy_ge_but_not_gt() {
        let row = complex(&[("input", json!({ "temp": 49 }))]);
        assert!(!temp_filter(Comparator::Gt, 49.0).matches(&row));
        assert!(temp_filter(Comparator::Ge, 49.0).matches(&row));
        assert!(!temp_filter(Comparator::Lt, 49.0).matches(&row));
        assert!(temp_filter(Comparator::Le, 49.0).matches(&row));
    }

    #[test]
    fn test_numeric_equality_across_representations() {
        let row = complex(&[("input", json!({ "temp": 50 }))]);
        assert!(temp_filter(Comparator::Eq, 50.0).matches(&row));
        assert!(!temp_filter(Comparator::Ne, 50.0).matches(&row));
    }

    #[test]
    fn test_string_comparison() {
        let row = complex(&[("input", json!({ "name": "beta" }))]);
        let name_field = || Operand::Field(FieldQualifier::new("input", vec!["name".to_string()]));
        assert!(filter(
            name_field(),
            Comparator::Eq,
            Operand::String("beta".to_string()),
            &["input"]
        )
        .matches(&row));
        assert!(filter(
            name_field(),
            Comparator::Gt,
            Operand::String("alpha".to_string()),
            &["input"]
        )
        .matches(&row));
    }

    #[test]
    fn test_absent_operand_semantics() {
        let row = complex(&[("input", json!({ "temp": 50 }))]);
        let missing = || Operand::Field(FieldQualifier::new("input", vec!["nope".to_string()]));

        // absent vs literal: not equal, not ordered
        assert!(!filter(missing(), Comparator::Eq, Operand::Number(1.0), &["input"]).matches(&row));
        assert!(filter(missing(), Comparator::Ne, Operand::Number(1.0), &["input"]).matches(&row));
        assert!(!filter(missing(), Comparator::Gt, Operand::Number(1.0), &["input"]).matches(&row));

        // absent vs absent: equal
        assert!(filter(missing(), Comparator::Eq, missing(), &["input"]).matches(&row));
    }

    #[test]
    fn test_filter_validates_stream_names() {
        let err = FilterExecutor::new(
            &FilterClause::new(
                Operand::Field(FieldQualifier::new("other", vec!["x".to_string()])),
                Comparator::Eq,
                Operand::Number(1.0),
            ),
            &participating(&["input"]),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::StreamNotInQuery { name } if name == "other"));
    }

    #[test]
    fn test_projection_star_and_subset() {
        let row = complex(&[("input", json!({ "name": "Event 3", "temp": 50 }))]);
        let streams = participating(&["input"]);

        let star = ProjectExecutor::new(&SelectionClause::new(vec![SelectField::All]), &streams)
            .unwrap();
        assert_eq!(star.execute(&row), json!({ "name": "Event 3", "temp": 50 }));

        let subset = ProjectExecutor::new(
            &SelectionClause::new(vec![SelectField::Field(FieldQualifier::new(
                "input",
                vec!["name".to_string()],
            ))]),
            &streams,
        )
        .unwrap();
        assert_eq!(subset.execute(&row), json!({ "name": "Event 3" }));
    }

    #[test]
    fn test_projection_declaration_order_overwrites() {
        let row = complex(&[
            ("a", json!({ "id": "from-a", "extra": 1 })),
            ("b", json!({ "id": "from-b" })),
        ]);
        let streams = participating(&["a", "b"]);

        // b.* last: its id wins over a.*'s
        let projector = ProjectExecutor::new(
            &SelectionClause::new(vec![
                SelectField::AllOf("a".to_string()),
                SelectField::AllOf("b".to_string()),
            ]),
            &streams,
        )
        .unwrap();
        assert_eq!(
            projector.execute(&row),
            json!({ "id": "from-b", "extra": 1 })
        );
    }

    #[test]
    fn test_projection_rejects_unbound_stream() {
        let err = ProjectExecutor::new(
            &SelectionClause::new(vec![SelectField::AllOf("nope".to_string())]),
            &participating(&["input"]),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::StreamNotInQuery { name } if name == "nope"));
    }
}

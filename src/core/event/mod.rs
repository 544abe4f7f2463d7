// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event model: envelopes and complex (joined) events.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::query_api::FieldQualifier;

/// Immutable wrapper assigning a per-stream sequence number and a timestamp
/// to a raw event value. Created exactly once, at push time, by the owning
/// [`InputStream`](crate::core::stream::InputStream).
#[derive(Clone, Debug, Serialize)]
pub struct EventEnvelope {
    pub body: Value,
    /// Monotonically increasing, unique within the owning stream
    pub sequence_id: u64,
    pub timestamp: DateTime<Utc>,
}

/// One joined row: a mapping from participating stream name to exactly one
/// of its envelopes. Transient; built during join expansion and discarded
/// after projection. The ordered map keeps `SELECT *` copy order
/// deterministic across streams.
pub type ComplexEvent = BTreeMap<String, Arc<EventEnvelope>>;

/// Walk a property path through a value. Any missing intermediate
/// short-circuits to `None` (the absent marker).
pub fn resolve_path<'a>(value: &'a Value, path: &[String]) -> Option<&'a Value> {
    let mut current = value;
    for segment in path {
        current = current.get(segment)?;
    }
    Some(current)
}

/// Resolve a field qualifier against a complex event. An absent stream
/// entry, like an absent property, resolves to `None` rather than erroring.
pub fn resolve_field<'a>(complex: &'a ComplexEvent, field: &FieldQualifier) -> Option<&'a Value> {
    let envelope = complex.get(&field.stream)?;
    resolve_path(&envelope.body, &field.path)
}

// SPDX-License-Identifier: MIT OR Apache-2.0

//! Join-graph traversal.
//!
//! The query's join edges form an undirected graph over stream names; each
//! edge carries an equality predicate between a field on each endpoint. On
//! arrival of an envelope the traversal seeds one candidate row with the
//! arriving envelope, then expands outward through every edge reachable
//! from the arrival point, in both directions, scanning the far stream's
//! live buffer for matches. Inner-join semantics: a candidate that matches
//! nothing on a required edge is dropped, not carried with a null.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

use chrono::Utc;

use crate::core::event::{resolve_field, resolve_path, ComplexEvent, EventEnvelope};
use crate::core::executor::values_equal;
use crate::core::stream::InputStream;
use crate::query_api::FieldQualifier;

/// One compiled join edge; the graph endpoints are the streams named by the
/// two qualifiers (already case-normalized)
#[derive(Debug)]
pub struct CompiledEdge {
    pub left: FieldQualifier,
    pub right: FieldQualifier,
}

/// Compiled join function shared by every listener of one job. Holds
/// non-owning references to the participating streams' live buffers; reads
/// them at evaluation time and keeps no per-call state.
pub struct JoinExecutor {
    streams: BTreeMap<String, Arc<InputStream>>,
    edges: Vec<CompiledEdge>,
}

impl JoinExecutor {
    /// With no edges this degenerates to the single-source join: the
    /// arriving envelope wrapped as a singleton complex event.
    pub fn new(streams: BTreeMap<String, Arc<InputStream>>, edges: Vec<CompiledEdge>) -> Self {
        Self { streams, edges }
    }

    /// Expand one arriving envelope into all matching complex events.
    ///
    /// One arriving event may fan out into many rows if multiple matches
    /// exist on the far side of an edge; no deduplication is performed, and
    /// result order follows buffer scan order on the matched side.
    pub fn expand(&self, envelope: &Arc<EventEnvelope>, arrival: &str) -> Vec<ComplexEvent> {
        let now = Utc::now();

        let mut seed = ComplexEvent::new();
        seed.insert(arrival.to_string(), Arc::clone(envelope));
        let mut candidates = vec![seed];

        let mut bound: BTreeSet<String> = BTreeSet::new();
        bound.insert(arrival.to_string());
        let mut worklist: VecDeque<String> = VecDeque::new();
        worklist.push_back(arrival.to_string());

        while let Some(stream_name) = worklist.pop_front() {
            for edge in &self.edges {
                // Orient the edge outward from `stream_name`; skip edges not
                // incident to it and edges whose far endpoint is already
                // bound in the candidates.
                let (near, far) = if edge.left.stream == stream_name
                    && !bound.contains(&edge.right.stream)
                {
                    (&edge.left, &edge.right)
                } else if edge.right.stream == stream_name && !bound.contains(&edge.left.stream) {
                    (&edge.right, &edge.left)
                } else {
                    continue;
                };

                let Some(far_stream) = self.streams.get(&far.stream) else {
                    // Participating streams are resolved at construction;
                    // an unknown endpoint cannot match anything.
                    candidates.clear();
                    return candidates;
                };
                let scan = far_stream.live_events(now);

                let mut expanded = Vec::new();
                for candidate in &candidates {
                    let Some(near_value) = resolve_field(candidate, near) else {
                        // Absent join field never matches.
                        continue;
                    };
                    for other in &scan {
                        let matches = resolve_path(&other.body, &far.path)
                            .is_some_and(|far_value| values_equal(far_value, near_value));
                        if matches {
                            let mut next = candidate.clone();
                            next.insert(far.stream.clone(), Arc::clone(other));
                            expanded.push(next);
                        }
                    }
                }
                candidates = expanded;
                if candidates.is_empty() {
                    return candidates;
                }

                bound.insert(far.stream.clone());
                worklist.push_back(far.stream.clone());
            }
        }

        candidates
    }
}

impl std::fmt::Debug for JoinExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JoinExecutor")
            .field("streams", &self.streams.keys().collect::<Vec<_>>())
            .field("edges", &self.edges)
            .finish()
    }
}

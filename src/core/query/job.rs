// SPDX-License-Identifier: MIT OR Apache-2.0

//! Compiled, running instance of one continuous query.
//!
//! Construction compiles the query exactly once into shared executors and
//! wires one listener onto every participating input stream. Binding and
//! compilation complete before any listener is registered: either the whole
//! job is wired, or none of it is.
//!
//! Execution plan per arriving envelope:
//!
//! 1. JOIN: expand to all matching complex events
//! 2. FILTER: keep complex events matching WHERE
//! 3. PROJECT: build the output value per SELECT
//! 4. OUTPUT: push to the bound output stream

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use crate::core::error::{EngineError, EngineResult};
use crate::core::event::EventEnvelope;
use crate::core::executor::{FilterExecutor, ProjectExecutor};
use crate::core::stream::{InputStream, ListenerHandle, OutputStream};
use crate::query_api::{QueryAst, SourceClause};

use super::join::{CompiledEdge, JoinExecutor};

/// The compiled pipeline, shared by every listener of one job. Holds no
/// per-call mutable state; the join reads live buffers at evaluation time.
struct Pipeline {
    join: JoinExecutor,
    filter: Option<FilterExecutor>,
    projector: ProjectExecutor,
    output: Arc<OutputStream>,
}

impl Pipeline {
    fn run(&self, envelope: &Arc<EventEnvelope>, arrival: &str) {
        for candidate in self.join.expand(envelope, arrival) {
            let keep = self
                .filter
                .as_ref()
                .map_or(true, |filter| filter.matches(&candidate));
            if keep {
                let result = self.projector.execute(&candidate);
                self.output.push_event(&result);
            }
        }
    }
}

/// A bound, running query
pub struct Job {
    subscriptions: Mutex<Vec<(Arc<InputStream>, ListenerHandle)>>,
}

impl Job {
    /// Compile `query` against the currently registered streams and
    /// subscribe to every participating input.
    ///
    /// Fails with a binding error if the output stream or any participating
    /// input stream is not registered, or if a selection/filter field names
    /// a stream outside the query's sources; on failure nothing is wired.
    pub fn new(
        query: &QueryAst,
        inputs: &HashMap<String, Arc<InputStream>>,
        outputs: &HashMap<String, Arc<OutputStream>>,
    ) -> EngineResult<Self> {
        // 1. Resolve the output stream.
        let output_name = query.output.to_lowercase();
        let output = outputs
            .get(&output_name)
            .cloned()
            .ok_or_else(|| EngineError::output_stream_not_found(&output_name))?;

        // 2. Resolve the closure of participating input streams.
        let (participating, edges) = Self::source_graph(&query.source);
        let mut streams: BTreeMap<String, Arc<InputStream>> = BTreeMap::new();
        for name in &participating {
            let stream = inputs
                .get(name)
                .cloned()
                .ok_or_else(|| EngineError::input_stream_not_found(name))?;
            streams.insert(name.clone(), stream);
        }

        // 3.-5. Compile filter, projector and join.
        let filter = query
            .filter
            .as_ref()
            .map(|clause| FilterExecutor::new(clause, &participating))
            .transpose()?;
        let projector = ProjectExecutor::new(&query.selection, &participating)?;
        let join = JoinExecutor::new(streams.clone(), edges);

        let pipeline = Arc::new(Pipeline {
            join,
            filter,
            projector,
            output,
        });

        // 6. All validation done; register one listener per input.
        let mut subscriptions = Vec::with_capacity(streams.len());
        for (name, stream) in &streams {
            let pipeline = Arc::clone(&pipeline);
            let arrival = name.clone();
            let handle =
                stream.add_listener(move |envelope| pipeline.run(envelope, &arrival));
            subscriptions.push((Arc::clone(stream), handle));
        }

        Ok(Self {
            subscriptions: Mutex::new(subscriptions),
        })
    }

    /// The set of participating stream names (lower-cased) and the compiled
    /// join edges. For a join query the closure covers the FROM stream,
    /// every JOIN stream and every stream named by an ON predicate.
    fn source_graph(source: &SourceClause) -> (BTreeSet<String>, Vec<CompiledEdge>) {
        let mut names = BTreeSet::new();
        let mut compiled = Vec::new();
        match source {
            SourceClause::Single(name) => {
                names.insert(name.to_lowercase());
            }
            SourceClause::Join { first, edges } => {
                names.insert(first.to_lowercase());
                for edge in edges {
                    names.insert(edge.stream.to_lowercase());
                    let left = edge.left.normalized();
                    let right = edge.right.normalized();
                    names.insert(left.stream.clone());
                    names.insert(right.stream.clone());
                    compiled.push(CompiledEdge { left, right });
                }
            }
        }
        (names, compiled)
    }

    /// Unsubscribe from every input stream. Idempotent; a stopped job
    /// produces no further output. Dropping the job stops it.
    pub fn stop(&self) {
        let mut subscriptions = self.subscriptions.lock().expect("subscription lock poisoned");
        for (stream, handle) in subscriptions.drain(..) {
            stream.remove_listener(handle);
        }
    }

    /// Number of input streams this job is currently subscribed to
    pub fn subscription_count(&self) -> usize {
        self.subscriptions
            .lock()
            .expect("subscription lock poisoned")
            .len()
    }
}

impl Drop for Job {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("subscriptions", &self.subscription_count())
            .finish()
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0

//! The owning stream registry and public entry point.
//!
//! An [`EventProcessor`] owns every registered input and output stream,
//! keyed by case-normalized name, and compiles submitted query text into
//! running [`Job`]s bound against the streams registered at submission
//! time. Streams registered later are not visible to an existing job.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value;

use crate::core::error::{EngineError, EngineResult};
use crate::core::query::Job;
use crate::core::stream::{InputStream, InputStreamConfig, OutputStream};
use crate::sql_compiler;

/// Name-keyed registry of input and output streams
#[derive(Debug, Default)]
pub struct EventProcessor {
    inputs: RwLock<HashMap<String, Arc<InputStream>>>,
    outputs: RwLock<HashMap<String, Arc<OutputStream>>>,
}

impl EventProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an input stream. Must be called before a query referencing
    /// it is submitted. The configured name is lower-cased; duplicates are
    /// rejected.
    pub fn create_input_stream(
        &self,
        mut config: InputStreamConfig,
    ) -> EngineResult<Arc<InputStream>> {
        config.name = config.name.to_lowercase();
        let name = config.name.clone();
        let mut inputs = self.inputs.write().expect("input registry poisoned");
        if inputs.contains_key(&name) {
            return Err(EngineError::duplicate_stream(&name));
        }
        let stream = InputStream::new(config);
        inputs.insert(name, Arc::clone(&stream));
        Ok(stream)
    }

    /// Register an output stream to receive query results. Must be called
    /// before a query referencing it is submitted.
    pub fn create_output_stream(&self, name: &str) -> EngineResult<Arc<OutputStream>> {
        let name = name.to_lowercase();
        let mut outputs = self.outputs.write().expect("output registry poisoned");
        if outputs.contains_key(&name) {
            return Err(EngineError::duplicate_stream(&name));
        }
        let stream = Arc::new(OutputStream::new(name.clone()));
        outputs.insert(name, Arc::clone(&stream));
        Ok(stream)
    }

    /// Look up a registered input stream by (case-insensitive) name
    pub fn input(&self, name: &str) -> Option<Arc<InputStream>> {
        self.inputs
            .read()
            .expect("input registry poisoned")
            .get(&name.to_lowercase())
            .cloned()
    }

    /// Look up a registered output stream by (case-insensitive) name
    pub fn output(&self, name: &str) -> Option<Arc<OutputStream>> {
        self.outputs
            .read()
            .expect("output registry poisoned")
            .get(&name.to_lowercase())
            .cloned()
    }

    /// Compile query text into a running job bound against the currently
    /// registered streams. A failed submission yields no job and no partial
    /// side effects.
    pub fn create_query(&self, query: &str) -> EngineResult<Job> {
        let ast = sql_compiler::compile(query)?;
        let inputs = self.inputs.read().expect("input registry poisoned").clone();
        let outputs = self
            .outputs
            .read()
            .expect("output registry poisoned")
            .clone();
        Job::new(&ast, &inputs, &outputs)
    }

    /// Push one raw event onto a named input stream
    pub fn send(&self, stream: &str, event: Value) -> EngineResult<()> {
        self.send_batch(stream, vec![event])
    }

    /// Push a batch of raw events onto a named input stream
    pub fn send_batch(&self, stream: &str, events: Vec<Value>) -> EngineResult<()> {
        let input = self
            .input(stream)
            .ok_or_else(|| EngineError::input_stream_not_found(stream))?;
        input.push_events(events);
        Ok(())
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0

//! rillflow: a lightweight complex-event-processing engine.
//!
//! Register named input and output streams, submit a small SQL-like
//! continuous query, and the engine compiles it once into a live
//! join → filter → project → output pipeline that runs per arriving event
//! against bounded, time-expiring in-memory buffers.
//!
//! ```
//! use rillflow::{EngineResult, EventProcessor, InputStreamConfig};
//! use serde_json::{json, Value};
//!
//! let processor = EventProcessor::new();
//! processor.create_input_stream(InputStreamConfig::new("input")).unwrap();
//! let output = processor.create_output_stream("output").unwrap();
//! output.add_callback(|event: &Value| -> EngineResult<()> {
//!     println!("{event}");
//!     Ok(())
//! });
//!
//! let job = processor
//!     .create_query("SELECT input.name FROM input INTO output WHERE input.temp > 49")
//!     .unwrap();
//!
//! processor.send("input", json!({ "name": "Event 3", "temp": 50 })).unwrap();
//! # drop(job);
//! ```

pub mod core;
pub mod query_api;
pub mod sql_compiler;

pub use crate::core::error::{EngineError, EngineResult};
pub use crate::core::event::{ComplexEvent, EventEnvelope};
pub use crate::core::processor::EventProcessor;
pub use crate::core::query::Job;
pub use crate::core::stream::{
    InputStream, InputStreamConfig, ListenerHandle, OutputStream, StreamCallback,
    DEFAULT_EXPIRY_WINDOW,
};

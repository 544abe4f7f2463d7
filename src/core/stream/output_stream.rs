// SPDX-License-Identifier: MIT OR Apache-2.0

//! Named output sink: an ordered list of callbacks invoked synchronously
//! with every emitted result.

use std::sync::{Arc, RwLock};

use serde_json::Value;

use crate::core::error::EngineResult;

/// Receives projected result values from an output stream.
///
/// Implemented for free by closures of type
/// `Fn(&Value) -> EngineResult<()> + Send + Sync`.
pub trait StreamCallback: Send + Sync {
    fn receive(&self, event: &Value) -> EngineResult<()>;
}

impl<F> StreamCallback for F
where
    F: Fn(&Value) -> EngineResult<()> + Send + Sync,
{
    fn receive(&self, event: &Value) -> EngineResult<()> {
        self(event)
    }
}

/// Named sink holding an ordered list of callbacks
pub struct OutputStream {
    name: String,
    callbacks: RwLock<Vec<Arc<dyn StreamCallback>>>,
}

impl OutputStream {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            callbacks: RwLock::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a callback; callbacks run in registration order
    pub fn add_callback(&self, callback: impl StreamCallback + 'static) {
        self.callbacks
            .write()
            .expect("callback lock poisoned")
            .push(Arc::new(callback));
    }

    /// Deliver one result to every callback, in registration order. A
    /// failing callback is logged and skipped; it never aborts delivery to
    /// sibling callbacks or unwinds into the upstream push. The list is
    /// snapshotted first, so a callback may register further callbacks on
    /// its own stream; they receive events from the next push.
    pub fn push_event(&self, event: &Value) {
        let callbacks: Vec<Arc<dyn StreamCallback>> = self
            .callbacks
            .read()
            .expect("callback lock poisoned")
            .clone();
        for (index, callback) in callbacks.iter().enumerate() {
            if let Err(error) = callback.receive(event) {
                log::error!(
                    "output stream '{}': callback #{index} failed: {error}",
                    self.name
                );
            }
        }
    }
}

impl std::fmt::Debug for OutputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputStream")
            .field("name", &self.name)
            .field(
                "callbacks",
                &self.callbacks.read().expect("callback lock poisoned").len(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::EngineError;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_callbacks_run_in_registration_order() {
        let output = OutputStream::new("output");
        let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

        let first = Arc::clone(&order);
        output.add_callback(move |_: &Value| -> EngineResult<()> {
            first.lock().unwrap().push("first");
            Ok(())
        });
        let second = Arc::clone(&order);
        output.add_callback(move |_: &Value| -> EngineResult<()> {
            second.lock().unwrap().push("second");
            Ok(())
        });

        output.push_event(&json!({}));
        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn test_failing_callback_does_not_block_siblings() {
        let output = OutputStream::new("output");
        let delivered = Arc::new(Mutex::new(0usize));

        output.add_callback(|_: &Value| -> EngineResult<()> {
            Err(EngineError::callback("boom"))
        });
        let sink = Arc::clone(&delivered);
        output.add_callback(move |_: &Value| -> EngineResult<()> {
            *sink.lock().unwrap() += 1;
            Ok(())
        });

        output.push_event(&json!({}));
        output.push_event(&json!({}));
        assert_eq!(*delivered.lock().unwrap(), 2);
    }

    #[test]
    fn test_callback_may_register_sibling_during_delivery() {
        let output = Arc::new(OutputStream::new("output"));
        let delivered = Arc::new(Mutex::new(0usize));

        let own = Arc::clone(&output);
        let sink = Arc::clone(&delivered);
        output.add_callback(move |_: &Value| -> EngineResult<()> {
            let counter = Arc::clone(&sink);
            own.add_callback(move |_: &Value| -> EngineResult<()> {
                *counter.lock().unwrap() += 1;
                Ok(())
            });
            Ok(())
        });

        // first push sees only the registering callback; the sibling it
        // adds participates from the second push on
        output.push_event(&json!({}));
        output.push_event(&json!({}));
        assert_eq!(*delivered.lock().unwrap(), 1);
    }
}

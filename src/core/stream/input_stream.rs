// SPDX-License-Identifier: MIT OR Apache-2.0

//! Named input stream: an ordered, time-expiring buffer of event envelopes
//! with a set of synchronously notified listeners.
//!
//! Buffer invariant: envelopes are kept in ascending timestamp order,
//! oldest first, so expiry always pops from the front in amortized O(1).
//! A custom timestamp extractor can deliver envelopes out of arrival order;
//! when a new envelope's timestamp is below the current maximum the buffer
//! is re-sorted (stable, so equal timestamps keep arrival order).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use serde_json::Value;

use crate::core::event::EventEnvelope;

/// Default expiry window: one hour
pub const DEFAULT_EXPIRY_WINDOW: Duration = Duration::from_secs(60 * 60);

/// Maps a raw event to its event time. The default is arrival wall clock.
pub type TimestampExtractor = dyn Fn(&Value) -> DateTime<Utc> + Send + Sync;

/// Listener invoked synchronously with each newly pushed envelope
pub type Listener = dyn Fn(&Arc<EventEnvelope>) + Send + Sync;

/// Subscription handle returned by [`InputStream::add_listener`], consumed
/// by [`InputStream::remove_listener`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerHandle(u64);

/// Configuration for a new input stream
pub struct InputStreamConfig {
    pub name: String,
    pub expiry_window: Duration,
    pub background_expiry: bool,
    pub timestamp_extractor: Option<Arc<TimestampExtractor>>,
}

impl InputStreamConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expiry_window: DEFAULT_EXPIRY_WINDOW,
            background_expiry: false,
            timestamp_extractor: None,
        }
    }

    pub fn with_expiry_window(mut self, window: Duration) -> Self {
        self.expiry_window = window;
        self
    }

    /// Enable the periodic background sweep (interval: half the window)
    pub fn with_background_expiry(mut self) -> Self {
        self.background_expiry = true;
        self
    }

    pub fn with_timestamp_extractor(
        mut self,
        extractor: impl Fn(&Value) -> DateTime<Utc> + Send + Sync + 'static,
    ) -> Self {
        self.timestamp_extractor = Some(Arc::new(extractor));
        self
    }
}

struct BufferState {
    events: VecDeque<Arc<EventEnvelope>>,
    next_sequence: u64,
}

struct Sweeper {
    stop: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

/// Named, owned buffer of envelopes with a configurable expiry window
pub struct InputStream {
    name: String,
    expiry_window: Duration,
    timestamp_extractor: Option<Arc<TimestampExtractor>>,
    state: Mutex<BufferState>,
    // Serializes buffering plus fan-out: two pushes on the same stream
    // must not interleave their listener notifications.
    delivery: Mutex<()>,
    // Read on every push, written only on subscribe/unsubscribe.
    listeners: RwLock<Vec<(ListenerHandle, Arc<Listener>)>>,
    next_listener_id: AtomicU64,
    sweeper: Mutex<Option<Sweeper>>,
}

impl InputStream {
    /// Create a stream; spawns the background sweeper if configured
    pub fn new(config: InputStreamConfig) -> Arc<Self> {
        let stream = Arc::new(Self {
            name: config.name,
            expiry_window: config.expiry_window,
            timestamp_extractor: config.timestamp_extractor,
            state: Mutex::new(BufferState {
                events: VecDeque::new(),
                next_sequence: 0,
            }),
            delivery: Mutex::new(()),
            listeners: RwLock::new(Vec::new()),
            next_listener_id: AtomicU64::new(0),
            sweeper: Mutex::new(None),
        });
        if config.background_expiry {
            Self::start_sweeper(&stream);
        }
        stream
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn expiry_window(&self) -> Duration {
        self.expiry_window
    }

    /// Push one raw event
    pub fn push_event(&self, event: Value) {
        self.push_events(vec![event]);
    }

    /// Push a batch of raw events. Sequence ids are assigned in call order;
    /// each registered listener is invoked once per new envelope, in push
    /// order, after all of the batch is buffered.
    pub fn push_events(&self, events: Vec<Value>) {
        // Held across buffering and fan-out: sequence-id order equals
        // notification order even with concurrent pushers.
        let _delivery = self.delivery.lock().expect("delivery mutex poisoned");
        let now = Utc::now();
        let mut fresh = Vec::with_capacity(events.len());
        {
            let mut state = self.state.lock().expect("buffer mutex poisoned");
            Self::expire_from_front(&mut state.events, self.cutoff(now));
            for raw in events {
                let timestamp = match &self.timestamp_extractor {
                    Some(extractor) => extractor(&raw),
                    None => now,
                };
                let envelope = Arc::new(EventEnvelope {
                    body: raw,
                    sequence_id: state.next_sequence,
                    timestamp,
                });
                state.next_sequence += 1;
                let out_of_order = state
                    .events
                    .back()
                    .is_some_and(|newest| newest.timestamp > timestamp);
                state.events.push_back(Arc::clone(&envelope));
                if out_of_order {
                    state
                        .events
                        .make_contiguous()
                        .sort_by_key(|envelope| envelope.timestamp);
                }
                fresh.push(envelope);
            }
        }
        // Buffer lock released before fan-out: listeners run joins that
        // lock other streams' buffers. The list is snapshotted so a
        // listener may subscribe or unsubscribe on its own stream during
        // delivery; such changes take effect from the next push.
        let listeners: Vec<Arc<Listener>> = self
            .listeners
            .read()
            .expect("listener lock poisoned")
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for envelope in &fresh {
            for listener in &listeners {
                listener(envelope);
            }
        }
    }

    /// Register a listener; returns the handle that removes it
    pub fn add_listener(
        &self,
        listener: impl Fn(&Arc<EventEnvelope>) + Send + Sync + 'static,
    ) -> ListenerHandle {
        let handle = ListenerHandle(self.next_listener_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .expect("listener lock poisoned")
            .push((handle, Arc::new(listener)));
        handle
    }

    /// Detach a listener. Unknown handles are ignored.
    pub fn remove_listener(&self, handle: ListenerHandle) {
        self.listeners
            .write()
            .expect("listener lock poisoned")
            .retain(|(id, _)| *id != handle);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().expect("listener lock poisoned").len()
    }

    /// Remove every envelope that has aged past the expiry window; returns
    /// how many were removed
    pub fn expire_events(&self) -> usize {
        let mut state = self.state.lock().expect("buffer mutex poisoned");
        Self::expire_from_front(&mut state.events, self.cutoff(Utc::now()))
    }

    /// Snapshot of the currently live (unexpired) envelopes, in buffer
    /// order. Expiry is a hard cutoff evaluated at read time: envelopes past
    /// the window are skipped even if no sweep has removed them yet.
    pub fn live_events(&self, now: DateTime<Utc>) -> Vec<Arc<EventEnvelope>> {
        let cutoff = self.cutoff(now);
        let state = self.state.lock().expect("buffer mutex poisoned");
        state
            .events
            .iter()
            .filter(|envelope| envelope.timestamp > cutoff)
            .cloned()
            .collect()
    }

    /// Number of buffered envelopes, including any not yet swept
    pub fn buffered_len(&self) -> usize {
        self.state.lock().expect("buffer mutex poisoned").events.len()
    }

    fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let window =
            chrono::Duration::from_std(self.expiry_window).unwrap_or(chrono::Duration::MAX);
        now.checked_sub_signed(window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    fn expire_from_front(events: &mut VecDeque<Arc<EventEnvelope>>, cutoff: DateTime<Utc>) -> usize {
        let before = events.len();
        while events
            .front()
            .is_some_and(|oldest| oldest.timestamp <= cutoff)
        {
            events.pop_front();
        }
        before - events.len()
    }

    fn start_sweeper(stream: &Arc<Self>) {
        let interval = (stream.expiry_window / 2).max(Duration::from_millis(1));
        let (stop, signal) = bounded::<()>(1);
        let weak: Weak<Self> = Arc::downgrade(stream);
        let name = stream.name.clone();
        let handle = thread::Builder::new()
            .name(format!("{name}-expiry"))
            .spawn(move || loop {
                match signal.recv_timeout(interval) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {
                        let Some(stream) = weak.upgrade() else { break };
                        let removed = stream.expire_events();
                        if removed > 0 {
                            log::debug!("stream '{name}': swept {removed} expired event(s)");
                        }
                    }
                }
            })
            .expect("failed to spawn expiry sweeper");
        *stream.sweeper.lock().expect("sweeper mutex poisoned") = Some(Sweeper {
            stop,
            handle: Some(handle),
        });
    }

    /// Stop the background expiry sweeper, if one is running. Idempotent;
    /// joins the sweeper thread before returning.
    pub fn stop_background_expiry(&self) {
        let sweeper = self.sweeper.lock().expect("sweeper mutex poisoned").take();
        if let Some(mut sweeper) = sweeper {
            let _ = sweeper.stop.send(());
            if let Some(handle) = sweeper.handle.take() {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for InputStream {
    fn drop(&mut self) {
        self.stop_background_expiry();
    }
}

impl std::fmt::Debug for InputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputStream")
            .field("name", &self.name)
            .field("expiry_window", &self.expiry_window)
            .field("buffered", &self.buffered_len())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;

    #[test]
    fn test_sequence_ids_assigned_in_call_order() {
        let stream = InputStream::new(InputStreamConfig::new("input"));
        let seen: Arc<StdMutex<Vec<u64>>> = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        stream.add_listener(move |envelope| {
            sink.lock().unwrap().push(envelope.sequence_id);
        });

        stream.push_events(vec![json!({"n": 0}), json!({"n": 1})]);
        stream.push_event(json!({"n": 2}));

        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_buffer_stays_sorted_with_out_of_order_extractor() {
        // Now-relative event times, so push-time expiry leaves all three
        // envelopes in place and only the ordering is under test.
        let base = Utc::now();
        let stream = InputStream::new(
            InputStreamConfig::new("input").with_timestamp_extractor(move |event| {
                let secs = event["ts"].as_i64().unwrap();
                base + chrono::Duration::seconds(secs)
            }),
        );

        stream.push_event(json!({"ts": 100}));
        stream.push_event(json!({"ts": 50}));
        stream.push_event(json!({"ts": 75}));

        let live = stream.live_events(base);
        let offsets: Vec<i64> = live
            .iter()
            .map(|e| (e.timestamp - base).num_seconds())
            .collect();
        assert_eq!(offsets, vec![50, 75, 100]);
    }

    #[test]
    fn test_concurrent_pushes_notify_in_sequence_order() {
        let stream = InputStream::new(InputStreamConfig::new("input"));
        let seen: Arc<StdMutex<Vec<u64>>> = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        stream.add_listener(move |envelope| {
            // Stall delivery of the first envelope so a racing push would
            // overtake it if fan-out were not serialized.
            if envelope.sequence_id == 0 {
                thread::sleep(Duration::from_millis(100));
            }
            sink.lock().unwrap().push(envelope.sequence_id);
        });

        let pusher = Arc::clone(&stream);
        let worker = thread::spawn(move || pusher.push_event(json!({"n": 0})));
        thread::sleep(Duration::from_millis(30));
        stream.push_event(json!({"n": 1}));
        worker.join().unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![0, 1]);
    }

    #[test]
    fn test_listener_may_unsubscribe_itself_during_delivery() {
        let stream = InputStream::new(InputStreamConfig::new("input"));
        let slot: Arc<StdMutex<Option<ListenerHandle>>> = Arc::new(StdMutex::new(None));
        let count = Arc::new(StdMutex::new(0usize));

        let own = Arc::clone(&stream);
        let slot_in = Arc::clone(&slot);
        let sink = Arc::clone(&count);
        let handle = stream.add_listener(move |_| {
            *sink.lock().unwrap() += 1;
            if let Some(handle) = slot_in.lock().unwrap().take() {
                own.remove_listener(handle);
            }
        });
        *slot.lock().unwrap() = Some(handle);

        stream.push_event(json!({}));
        stream.push_event(json!({}));

        assert_eq!(*count.lock().unwrap(), 1);
        assert_eq!(stream.listener_count(), 0);
    }

    #[test]
    fn test_lazy_expiry_on_push() {
        let stream = InputStream::new(
            InputStreamConfig::new("input")
                .with_expiry_window(Duration::from_secs(60))
                .with_timestamp_extractor(|event| {
                    let age = event["age_secs"].as_i64().unwrap();
                    Utc::now() - chrono::Duration::seconds(age)
                }),
        );

        stream.push_event(json!({"age_secs": 120}));
        assert_eq!(stream.buffered_len(), 1);

        // the next push sweeps the aged envelope before buffering
        stream.push_event(json!({"age_secs": 0}));
        assert_eq!(stream.buffered_len(), 1);
    }

    #[test]
    fn test_live_events_skip_aged_envelopes_without_sweep() {
        let stream = InputStream::new(
            InputStreamConfig::new("input")
                .with_expiry_window(Duration::from_secs(60))
                .with_timestamp_extractor(|event| {
                    let age = event["age_secs"].as_i64().unwrap();
                    Utc::now() - chrono::Duration::seconds(age)
                }),
        );

        stream.push_events(vec![json!({"age_secs": 120}), json!({"age_secs": 10})]);
        assert_eq!(stream.buffered_len(), 2);
        assert_eq!(stream.live_events(Utc::now()).len(), 1);
    }

    #[test]
    fn test_removed_listener_receives_nothing() {
        let stream = InputStream::new(InputStreamConfig::new("input"));
        let count = Arc::new(StdMutex::new(0usize));

        let sink = Arc::clone(&count);
        let handle = stream.add_listener(move |_| *sink.lock().unwrap() += 1);

        stream.push_event(json!({}));
        stream.remove_listener(handle);
        stream.push_event(json!({}));

        assert_eq!(*count.lock().unwrap(), 1);
        assert_eq!(stream.listener_count(), 0);
    }

    #[test]
    fn test_background_sweep_removes_expired_events() {
        let stream = InputStream::new(
            InputStreamConfig::new("input")
                .with_expiry_window(Duration::from_millis(60))
                .with_background_expiry(),
        );

        stream.push_event(json!({"n": 1}));
        assert_eq!(stream.buffered_len(), 1);

        thread::sleep(Duration::from_millis(200));
        assert_eq!(stream.buffered_len(), 0);

        stream.stop_background_expiry();
        // idempotent
        stream.stop_background_expiry();
    }
}

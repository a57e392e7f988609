// src/core/stream.rs

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;

/// A stream subscriber callback.
pub type Subscriber<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct StreamState<T> {
    subscribers: Vec<(u64, Subscriber<T>)>,
    channels: Vec<mpsc::UnboundedSender<T>>,
    next_id: u64,
    had_subscribers: bool,
    stopped: bool,
}

/// Publish/subscribe point owned by one event registration.
///
/// Values are delivered to callback subscribers and to channel receivers.
/// [`publish`](Self::publish) reports whether anyone is still interested: it
/// returns `false` once the stream was stopped, or once every subscriber that
/// ever attached has gone away.
pub struct EventStream<T> {
    state: Arc<Mutex<StreamState<T>>>,
}

impl<T> Clone for EventStream<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> EventStream<T> {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(StreamState {
                subscribers: Vec::new(),
                channels: Vec::new(),
                next_id: 1,
                had_subscribers: false,
                stopped: false,
            })),
        }
    }

    /// Adds a callback subscriber.
    pub fn subscribe<F>(&self, callback: F) -> StreamSubscription<T>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.subscribe_arc(Arc::new(callback))
    }

    pub(crate) fn subscribe_arc(&self, callback: Subscriber<T>) -> StreamSubscription<T> {
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.had_subscribers = true;
        state.subscribers.push((id, callback));
        StreamSubscription {
            stream: self.clone(),
            id,
        }
    }

    /// Returns a receiver that gets every value published from now on.
    /// Dropping the receiver counts as unsubscribing.
    pub fn receiver(&self) -> mpsc::UnboundedReceiver<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock();
        state.had_subscribers = true;
        if !state.stopped {
            state.channels.push(tx);
        }
        rx
    }

    /// Delivers `value` to all subscribers. Returns whether the stream should
    /// be kept alive.
    pub fn publish(&self, value: T) -> bool {
        let subscribers = {
            let mut state = self.state.lock();
            if state.stopped {
                return false;
            }
            state.channels.retain(|tx| tx.send(value.clone()).is_ok());
            state.subscribers.clone()
        };
        for (_, callback) in &subscribers {
            callback(&value);
        }

        let state = self.state.lock();
        !state.stopped
            && (!state.had_subscribers || !state.subscribers.is_empty() || !state.channels.is_empty())
    }

    /// Stops the stream: all subscribers are dropped and open receivers end.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        state.stopped = true;
        state.subscribers.clear();
        state.channels.clear();
    }

    pub fn is_stopped(&self) -> bool {
        self.state.lock().stopped
    }

    /// Whether both handles refer to the same stream.
    pub fn same_stream(&self, other: &EventStream<T>) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    fn unsubscribe(&self, id: u64) {
        self.state.lock().subscribers.retain(|(sid, _)| *sid != id);
    }
}

impl<T: Clone + Send + 'static> Default for EventStream<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to one callback subscriber of an [`EventStream`].
pub struct StreamSubscription<T> {
    stream: EventStream<T>,
    id: u64,
}

impl<T: Clone + Send + 'static> StreamSubscription<T> {
    /// Removes this subscriber only; the stream itself stays open.
    pub fn stop(self) {
        self.stream.unsubscribe(self.id);
    }
}

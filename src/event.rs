//! A single-shot wake object.
//!
//! An `Instance` normally has exactly one wake source (the `Channel` it is
//! registered as a waiter on), so `Event` sits mostly unused on the hot
//! path; it exists for embeddings that add a second wake source (a
//! timeout, an external cancellation signal) without having to widen
//! `Instance` itself.
use crossbeam_channel::{Receiver, Sender};

/// Fires at most once. `wait` after a `set` returns immediately.
pub struct Event {
    tx: Sender<()>,
    rx: Receiver<()>,
}

impl Default for Event {
    fn default() -> Self {
        Event::new()
    }
}

impl Event {
    pub fn new() -> Event {
        let (tx, rx) = crossbeam_channel::bounded(1);
        Event { tx, rx }
    }

    /// Fires the event. Idempotent: firing twice is a no-op the second time.
    pub fn set(&self) {
        self.tx.try_send(()).ok();
    }

    /// Blocks until `set` has been called.
    pub fn wait(&self) {
        // A successful recv consumes the single slot; peek it back so a
        // second `wait` still observes "already fired" rather than
        // blocking forever.
        if let Ok(()) = self.rx.recv() {
            self.tx.try_send(()).ok();
        }
    }

    pub fn is_set(&self) -> bool {
        !self.rx.is_empty()
    }
}

//! Lock-free MPMC queue submodule.
//!
//! The backing store is a `crossbeam_channel` unbounded channel, which is
//! the lock-free MPMC structure of the Rust ecosystem; capacity is layered
//! on top as a soft admission-control limit rather than being baked into
//! the channel's own construction, so that `set_capacity` can change it at
//! any time without disturbing items already queued.
use std::sync::atomic::{AtomicIsize, Ordering};
use std::sync::Mutex;

use crossbeam_channel::{select, unbounded, Receiver, Sender, TryRecvError};

use crate::error::RuntimeError;

const UNBOUNDED: isize = -1;

/// Unbounded-by-default FIFO of opaque items, safe under many producers and
/// many consumers at once.
///
/// `push` never blocks and never loses items. If a capacity has been set
/// and is reached, `push` fails with [`RuntimeError::QueueFull`]. Ordering
/// is FIFO per producer; across producers, order is unspecified but
/// causally consistent (the guarantee `crossbeam_channel` itself makes).
pub struct Queue<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
    // A second, zero-payload channel exists purely so `pop_blocking` can
    // `select!` on "an item arrived" vs. "the queue was closed" without
    // polling. Closing drops the sender, which makes every present and
    // future `recv` on `close_rx` resolve instantly (no broadcast needed).
    close_tx: Mutex<Option<Sender<()>>>,
    close_rx: Receiver<()>,
    capacity: AtomicIsize,
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Queue::new()
    }
}

impl<T> Queue<T> {
    /// Creates a new, unbounded queue.
    pub fn new() -> Queue<T> {
        let (tx, rx) = unbounded();
        let (close_tx, close_rx) = unbounded();
        Queue {
            tx,
            rx,
            close_tx: Mutex::new(Some(close_tx)),
            close_rx,
            capacity: AtomicIsize::new(UNBOUNDED),
        }
    }

    /// Creates a new queue bounded to `capacity` items.
    pub fn bounded(capacity: usize) -> Queue<T> {
        let queue = Queue::new();
        queue.set_capacity(capacity as isize);
        queue
    }

    /// Sets the admission capacity. A negative value means unbounded.
    ///
    /// Never drops items already queued, even if the new capacity is lower
    /// than the current length — it only affects future `push` calls.
    pub fn set_capacity(&self, n: isize) {
        let n = if n < 0 { UNBOUNDED } else { n };
        self.capacity.store(n, Ordering::SeqCst);
    }

    /// Returns the current admission capacity, or `None` if unbounded.
    pub fn capacity(&self) -> Option<usize> {
        match self.capacity.load(Ordering::SeqCst) {
            UNBOUNDED => None,
            n => Some(n as usize),
        }
    }

    /// Number of items currently queued.
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    /// Enqueues `item`. Fails with [`RuntimeError::QueueFull`] if a capacity
    /// is set and already reached.
    pub fn push(&self, item: T) -> Result<(), RuntimeError> {
        if let Some(capacity) = self.capacity() {
            if self.len() >= capacity {
                return Err(RuntimeError::QueueFull);
            }
        }
        // The channel is never disconnected: the queue keeps one of each
        // end alive for its own lifetime, so this can't fail.
        self.tx.send(item).ok();
        Ok(())
    }

    /// Returns immediately with an item, or `None` if the queue is empty.
    pub fn try_pop(&self) -> Option<T> {
        match self.rx.try_recv() {
            Ok(item) => Some(item),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Parks the caller until an item is available or the queue is closed.
    pub fn pop_blocking(&self) -> Option<T> {
        select! {
            recv(self.rx) -> item => item.ok(),
            recv(self.close_rx) -> _ => self.try_pop(),
        }
    }

    /// Closes the queue, waking every `pop_blocking` waiter that has no
    /// item to return. Idempotent.
    pub fn close(&self) {
        self.close_tx.lock().unwrap().take();
    }

    pub fn is_closed(&self) -> bool {
        self.close_tx.lock().unwrap().is_none()
    }
}

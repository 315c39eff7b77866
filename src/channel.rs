//! The queue a `Task`'s instances receive messages from, plus the
//! wake-on-put bookkeeping that moves a blocked waiter back onto its
//! pool's ready queue.
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, Weak};

use crate::error::RuntimeError;
use crate::instance::{Instance, InstanceState};
use crate::interpreter::Interpreter;
use crate::queue::Queue;
use crate::task::{intern_handle, resolve_handle};

/// Marker distinguishing `Channel`'s handle registry from `Task`'s and
/// `Pool`'s in the shared slot table.
struct ChannelRegistryTag;

/// A message queue shared by every `Instance` of one `Task`.
///
/// `put` never blocks; `get` is the one operation that can
/// suspend an instance, by registering it as a waiter instead of returning
/// a message. The two halves share a single lock (`waiters`) so that a
/// `put` can never land between a waiter's failed poll and its
/// registration — see the module-level race note on [`Channel::get`].
pub struct Channel<I: Interpreter> {
    queue: Queue<I::Message>,
    waiters: Mutex<VecDeque<Weak<Instance<I>>>>,
    // Lets `get` hand a blocked instance an `Arc<Channel<I>>` back
    // reference from a plain `&self`, without requiring callers to use a
    // non-standard `self: &Arc<Self>` receiver. Populated at construction
    // time via `Arc::new_cyclic`.
    self_weak: Weak<Channel<I>>,
}

impl<I: Interpreter> Channel<I> {
    pub fn new() -> Arc<Channel<I>> {
        let channel = Arc::new_cyclic(|self_weak| Channel {
            queue: Queue::new(),
            waiters: Mutex::new(VecDeque::new()),
            self_weak: self_weak.clone(),
        });
        intern_handle::<ChannelRegistryTag, I, Channel<I>>(&channel);
        channel
    }

    /// The stable address identifying this channel. Usable as a lookup key
    /// via [`Channel::from_ptr`].
    pub fn ptr(&self) -> usize {
        self as *const Self as usize
    }

    /// Resolves an address returned by [`Channel::ptr`] back to the same
    /// live handle, or `None` if that channel has since been dropped.
    pub fn from_ptr(ptr: usize) -> Option<Arc<Channel<I>>> {
        resolve_handle::<ChannelRegistryTag, I, Channel<I>>(ptr)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn set_capacity(&self, n: isize) {
        self.queue.set_capacity(n);
    }

    /// Enqueues `message`. If a waiter is registered, wakes exactly one
    /// of them.
    ///
    /// The item is pushed onto the queue before the waiters lock is taken,
    /// so any `get` that later takes the lock and re-polls the queue (its
    /// double check) is guaranteed to see it — see [`Channel::get`].
    pub fn put(&self, message: I::Message) -> Result<(), RuntimeError> {
        self.queue.push(message)?;

        let mut waiters = self.waiters.lock().unwrap();
        while let Some(weak) = waiters.pop_front() {
            let Some(instance) = weak.upgrade() else {
                continue;
            };
            if instance.state.try_wake() {
                instance.clear_pending_channel();
                if let Some(task) = instance.task() {
                    task.pool_push_ready(instance);
                }
                break;
            }
            // Not blocked anymore (already woken, or dead) - try the next.
        }
        Ok(())
    }

    /// Returns the next message, or registers `instance` as a waiter and
    /// returns `None`.
    ///
    /// Race-freedom: a plain `try_pop` followed by a separate "register as
    /// waiter" step would lose a message pushed in between the two. Instead
    /// the failed poll is repeated once more *after* taking the same lock
    /// `put` takes before it ever touches the waiters queue. Because `put`
    /// always pushes before acquiring that lock, any `put` whose push this
    /// thread's first poll missed has either already completed by the time
    /// the lock is acquired here (so the second poll observes it) or has
    /// not yet reached the lock itself (so registering now is safe: that
    /// `put` will find this waiter when it gets there). Either way no
    /// wakeup is lost.
    pub(crate) fn get(self: &Arc<Self>, instance: &Arc<Instance<I>>) -> Option<I::Message> {
        if let Some(message) = self.queue.try_pop() {
            return Some(message);
        }

        let mut waiters = self.waiters.lock().unwrap();
        if let Some(message) = self.queue.try_pop() {
            return Some(message);
        }

        instance.state.store(InstanceState::Blocked);
        waiters.push_back(Arc::downgrade(instance));
        drop(waiters);
        instance.set_pending_channel(self.clone());
        None
    }
}

impl<I: Interpreter> PartialEq for Channel<I> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl<I: Interpreter> Eq for Channel<I> {}

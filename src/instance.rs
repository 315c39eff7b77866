//! One isolated interpreter plus its execution state.
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::channel::Channel;
use crate::current;
use crate::error::ScriptPanic;
use crate::event::Event;
use crate::interpreter::Interpreter;
use crate::task::Task;

/// Where an `Instance` is in its lifecycle.
///
/// `CREATED -> READY -> RUNNING -> BLOCKED -> READY -> ... -> DEAD`. Only
/// the dispatch loop transitions an instance into or out of `RUNNING`;
/// every other transition is producer-side (a `Channel::put` moving a
/// waiter `BLOCKED -> READY`, or the worker's post-step bookkeeping moving
/// it to `DEAD`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum InstanceState {
    Created = 0,
    Ready = 1,
    Running = 2,
    Blocked = 3,
    Dead = 4,
}

impl InstanceState {
    fn from_u8(v: u8) -> InstanceState {
        match v {
            0 => InstanceState::Created,
            1 => InstanceState::Ready,
            2 => InstanceState::Running,
            3 => InstanceState::Blocked,
            _ => InstanceState::Dead,
        }
    }
}

pub(crate) struct AtomicState(AtomicU8);

impl AtomicState {
    fn new(state: InstanceState) -> AtomicState {
        AtomicState(AtomicU8::new(state as u8))
    }

    pub(crate) fn load(&self) -> InstanceState {
        InstanceState::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub(crate) fn store(&self, state: InstanceState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }

    /// Atomically claims the instance for execution: only succeeds from
    /// `Ready` or `Created`, which guarantees at most one worker ever
    /// observes this instance as `Running` at a time.
    pub(crate) fn try_claim_running(&self) -> Option<InstanceState> {
        for from in [InstanceState::Ready, InstanceState::Created] {
            if self
                .0
                .compare_exchange(
                    from as u8,
                    InstanceState::Running as u8,
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                )
                .is_ok()
            {
                return Some(from);
            }
        }
        None
    }

    /// Used by `Channel::put`: moves a waiter out of `Blocked` into
    /// `Ready`. Returns `false` if the instance is no longer blocked
    /// (already woken by a racing producer, or dead).
    pub(crate) fn try_wake(&self) -> bool {
        self.0
            .compare_exchange(
                InstanceState::Blocked as u8,
                InstanceState::Ready as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }
}

/// One live scripted coroutine: an owned, isolated `Interpreter` value plus
/// its scheduling state.
pub struct Instance<I: Interpreter> {
    interpreter: Mutex<Option<I>>,
    pub(crate) task: Weak<Task<I>>,
    pub(crate) state: AtomicState,
    pending_channel: Mutex<Option<Arc<Channel<I>>>>,
    pub event: Event,
}

impl<I: Interpreter> Instance<I> {
    pub(crate) fn new(task: &Arc<Task<I>>) -> Arc<Instance<I>> {
        Arc::new(Instance {
            interpreter: Mutex::new(None),
            task: Arc::downgrade(task),
            state: AtomicState::new(InstanceState::Created),
            pending_channel: Mutex::new(None),
            event: Event::new(),
        })
    }

    pub fn state(&self) -> InstanceState {
        self.state.load()
    }

    pub(crate) fn task(&self) -> Option<Arc<Task<I>>> {
        self.task.upgrade()
    }

    /// Runs the init routine: decodes `env` and builds a fresh interpreter.
    /// Only ever called by the dispatch loop, exactly once, for an
    /// instance claimed out of `Created`.
    pub(crate) fn init(&self, env: &I::Env) {
        *self.interpreter.lock().unwrap() = Some(I::build(env));
    }

    /// Registers this instance as waiting on `channel` just before
    /// returning `Blocked` to the dispatch loop. `Channel::get` calls this
    /// while still holding its own waiter lock, so by the time the state
    /// flips to `Blocked` the instance is already discoverable by a racing
    /// `put`.
    pub(crate) fn set_pending_channel(&self, channel: Arc<Channel<I>>) {
        *self.pending_channel.lock().unwrap() = Some(channel);
    }

    pub(crate) fn clear_pending_channel(&self) {
        self.pending_channel.lock().unwrap().take();
    }

    /// Runs the driver coroutine until it next suspends: repeatedly
    /// receives from the task's input channel and dispatches to
    /// `Interpreter::call`, stopping exactly when `Channel::get` finds the
    /// channel empty (at which point it has already registered this
    /// instance as a waiter and flipped it to `Blocked`).
    pub(crate) fn step(self: &Arc<Self>) -> Option<ScriptPanic> {
        let task = match self.task() {
            Some(task) => task,
            None => {
                self.state.store(InstanceState::Dead);
                return None;
            }
        };

        loop {
            let message = match task.input().get(self) {
                Some(message) => message,
                None => return None,
            };

            // Recorded so a `Task::new` called from inside `call` picks up
            // this instance's task as its automatic `parent`.
            let outcome = current::enter(&self.task, || {
                let mut guard = self.interpreter.lock().unwrap();
                let interpreter = guard.as_mut().expect("instance stepped before init");
                std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    interpreter.call(message)
                }))
            });

            match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(error)) => {
                    // The handler's own failure is fatal to this instance
                    // only, never to the worker.
                    let handled = current::enter(&self.task, || {
                        std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
                            let mut guard = self.interpreter.lock().unwrap();
                            if let Some(interpreter) = guard.as_mut() {
                                interpreter.handle_error(error);
                            }
                        }))
                    });
                    self.state.store(InstanceState::Dead);
                    return match handled {
                        Ok(()) => None,
                        Err(payload) => Some(ScriptPanic::capture(payload.as_ref())),
                    };
                }
                Err(payload) => {
                    self.state.store(InstanceState::Dead);
                    return Some(ScriptPanic::capture(payload.as_ref()));
                }
            }
        }
    }

    pub(crate) fn destroy(&self) {
        self.interpreter.lock().unwrap().take();
        self.clear_pending_channel();
    }
}

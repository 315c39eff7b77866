//! A dynamically sized set of OS worker threads draining a shared ready
//! queue of runnable instances, plus the dispatch loop each worker runs.
use std::any::TypeId;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use crate::error::RuntimeError;
use crate::instance::{Instance, InstanceState};
use crate::interpreter::Interpreter;
use crate::queue::Queue;
use crate::task::{intern_handle, resolve_handle, slots};

/// Marker distinguishing `Pool`'s handle registry from `Task`'s and
/// `Channel`'s in the shared slot table.
struct PoolRegistryTag;

/// A dynamically sized pool of worker threads draining one ready queue.
///
/// `ready` carries `Option<Arc<Instance<I>>>`: `None` is the tombstone a
/// worker pops to learn it should exit, pushed once per thread
/// [`Pool::remove`] is asked to shed.
pub struct Pool<I: Interpreter> {
    ready: Queue<Option<Arc<Instance<I>>>>,
    size: AtomicUsize,
    target_size: AtomicUsize,
    // Guards read-modify-write resizing: one lock shared by both growth
    // and shrink bookkeeping, not two separate locks.
    resize: Mutex<()>,
    thread_name_prefix: String,
}

impl<I: Interpreter> Pool<I> {
    /// Builds a pool and immediately grows it to `size` workers
    /// (`Pool::new` is itself implemented in terms of `add`).
    pub fn new(size: usize) -> Arc<Pool<I>> {
        PoolBuilder::new().size(size).build()
    }

    /// The process-wide default pool, lazily constructed the first time
    /// any `Task` is built without an explicit pool. One instance per
    /// `I`. Sized to the
    /// available parallelism, the same default a thread pool with no
    /// caller-specified size reaches for elsewhere in the ecosystem
    /// (falls back to 1 if the platform can't report it).
    pub fn default_handle() -> Arc<Pool<I>> {
        let mut slots = slots().lock().unwrap();
        slots
            .entry(TypeId::of::<(u16, I)>())
            .or_insert_with(|| {
                let size = thread::available_parallelism().map_or(1, |n| n.get());
                Box::new(Pool::<I>::new(size))
            })
            .downcast_ref::<Arc<Pool<I>>>()
            .expect("pool slot type mismatch")
            .clone()
    }

    /// The stable address identifying this pool. Usable as a lookup key
    /// via [`Pool::from_ptr`].
    pub fn ptr(&self) -> usize {
        self as *const Self as usize
    }

    /// Resolves an address returned by [`Pool::ptr`] back to the same
    /// live handle, or `None` if that pool has since been dropped.
    pub fn from_ptr(ptr: usize) -> Option<Arc<Pool<I>>> {
        resolve_handle::<PoolRegistryTag, I, Pool<I>>(ptr)
    }

    pub fn size(&self) -> usize {
        self.size.load(Ordering::SeqCst)
    }

    pub fn target_size(&self) -> usize {
        self.target_size.load(Ordering::SeqCst)
    }

    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    /// Grows the pool by `n` worker threads.
    pub fn add(self: &Arc<Self>, n: usize) {
        let _guard = self.resize.lock().unwrap();
        for _ in 0..n {
            let pool = self.clone();
            let name = format!(
                "{}-{}",
                self.thread_name_prefix,
                self.size.load(Ordering::SeqCst)
            );
            let spawned = thread::Builder::new().name(name).spawn(move || pool.run());
            match spawned {
                Ok(_handle) => {
                    self.size.fetch_add(1, Ordering::SeqCst);
                    self.target_size.fetch_add(1, Ordering::SeqCst);
                }
                Err(error) => {
                    tracing::warn!(error = %error, "failed to spawn pool worker thread");
                }
            }
        }
    }

    /// Shrinks the pool by `n` worker threads: pushes `n` tombstones onto
    /// the ready queue. Each worker that pops one decrements `size` and
    /// exits; which physical OS thread exits first is unspecified — this
    /// is cooperative shrink, not a targeted kill.
    pub fn remove(&self, n: usize) {
        let _guard = self.resize.lock().unwrap();
        let n = n.min(self.target_size.load(Ordering::SeqCst));
        self.target_size.fetch_sub(n, Ordering::SeqCst);
        for _ in 0..n {
            self.ready.push(None).ok();
        }
    }

    /// Pushes a runnable instance onto the ready queue. Used both by
    /// `Task::spawn` (a freshly created instance) and by `Channel::put`
    /// (a woken waiter).
    pub(crate) fn push_ready(&self, instance: Arc<Instance<I>>) -> Result<(), RuntimeError> {
        self.ready.push(Some(instance))
    }

    /// The worker body: pop, claim, run one coroutine step, react to the
    /// resulting state. Returns once it pops a tombstone.
    fn run(self: Arc<Self>) {
        tracing::debug!("pool worker starting");
        loop {
            let popped = match self.ready.pop_blocking() {
                Some(popped) => popped,
                None => break, // the queue itself was closed: pool torn down
            };

            let instance = match popped {
                Some(instance) => instance,
                None => {
                    self.size.fetch_sub(1, Ordering::SeqCst);
                    break;
                }
            };

            let claimed_from = match instance.state.try_claim_running() {
                Some(from) => from,
                None => {
                    // Lost a race for an instance someone else already
                    // claimed (or it died in the meantime); drop it.
                    continue;
                }
            };

            // A `Task::remove` may have left this instance in excess of
            // what the task now wants before we ever got to step it —
            // the common case, since a drained instance normally goes
            // `Blocked`, not `Ready`, so the post-step check below would
            // never see it again. Reap it here instead of stepping it.
            match instance.task() {
                Some(task) if task.has_excess() => {
                    instance.state.store(InstanceState::Dead);
                    tracing::debug!("instance self-destructing: Task::remove left it in excess");
                    instance.destroy();
                    task.excess_instance_died();
                    continue;
                }
                _ => {}
            }

            if claimed_from == InstanceState::Created {
                let task = instance.task();
                let env = task.as_ref().map(|task| task.build_env());
                match env {
                    Some(Ok(env)) => instance.init(&env),
                    Some(Err(error)) => {
                        tracing::warn!(error = %error, "failed to decode task env");
                        instance.state.store(InstanceState::Dead);
                        if let Some(task) = task {
                            task.instance_died();
                        }
                        continue;
                    }
                    None => {
                        instance.state.store(InstanceState::Dead);
                        continue;
                    }
                }
            }

            let panic = instance.step();
            if let Some(panic) = panic {
                tracing::warn!(message = panic.message(), "instance interpreter panicked");
            }

            match instance.state() {
                InstanceState::Ready => {
                    // A `Task::remove` in between this instance's last two
                    // steps may have left it in excess of what the task
                    // now wants. Kill it here instead of requeuing it.
                    match instance.task() {
                        Some(task) if task.has_excess() => {
                            instance.state.store(InstanceState::Dead);
                            tracing::debug!("instance self-destructing: Task::remove left it in excess");
                            instance.destroy();
                            task.excess_instance_died();
                        }
                        _ => {
                            // A `put` may have already woken this instance
                            // again while it was still `Running`. Re-push,
                            // don't lose the work.
                            self.push_ready(instance).ok();
                        }
                    }
                }
                InstanceState::Dead => {
                    tracing::debug!("instance died");
                    instance.destroy();
                    if let Some(task) = instance.task() {
                        task.instance_died();
                    }
                }
                InstanceState::Blocked => {
                    // Already registered as a waiter by `Channel::get`.
                }
                InstanceState::Created | InstanceState::Running => {
                    // step() never returns in these states.
                }
            }
        }
        tracing::debug!("pool worker exiting");
    }
}

impl<I: Interpreter> PartialEq for Pool<I> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl<I: Interpreter> Eq for Pool<I> {}

/// Chainable construction for [`Pool`].
pub struct PoolBuilder {
    size: usize,
    ready_queue_capacity: Option<isize>,
    thread_name_prefix: String,
}

impl Default for PoolBuilder {
    fn default() -> Self {
        PoolBuilder::new()
    }
}

impl PoolBuilder {
    pub fn new() -> PoolBuilder {
        PoolBuilder {
            size: 0,
            ready_queue_capacity: None,
            thread_name_prefix: "fiberpool-worker".to_string(),
        }
    }

    pub fn size(mut self, n: usize) -> Self {
        self.size = n;
        self
    }

    pub fn ready_queue_capacity(mut self, n: isize) -> Self {
        self.ready_queue_capacity = Some(n);
        self
    }

    pub fn thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    pub fn build<I: Interpreter>(self) -> Arc<Pool<I>> {
        let ready = Queue::new();
        if let Some(capacity) = self.ready_queue_capacity {
            ready.set_capacity(capacity);
        }
        let pool = Arc::new(Pool {
            ready,
            size: AtomicUsize::new(0),
            target_size: AtomicUsize::new(0),
            resize: Mutex::new(()),
            thread_name_prefix: self.thread_name_prefix,
        });
        intern_handle::<PoolRegistryTag, I, Pool<I>>(&pool);
        pool.add(self.size);
        pool
    }
}

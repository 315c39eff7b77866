//! One spawn request, shared by every `Instance` it produces.
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};

use crate::channel::Channel;
use crate::current;
use crate::error::RuntimeError;
use crate::instance::Instance;
use crate::interpreter::Interpreter;
use crate::marshal::{BincodeMarshaller, Marshaller};
use crate::pool::Pool;

/// A type-keyed slot store: one registry table (or one default-pool slot)
/// per distinct `I` an embedding instantiates this crate with, even though
/// neither can be named as an ordinary `static` inside a function generic
/// over `I`. [`handle_registry`] and [`Pool::default_handle`] both key
/// into this same table, each under its own marker type so the two never
/// collide for the same `I`.
pub(crate) fn slots() -> &'static Mutex<HashMap<TypeId, Box<dyn Any + Send>>> {
    static SLOTS: OnceLock<Mutex<HashMap<TypeId, Box<dyn Any + Send>>>> = OnceLock::new();
    SLOTS.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Marker distinguishing `Task`'s handle registry from `Pool`'s and
/// `Channel`'s in the shared [`slots`] table.
pub(crate) struct TaskRegistryTag;

/// A process-wide mapping from address to weak handle, one table per `I`
/// and per handle kind (distinguished by `Tag`). Lets a handle whose
/// address crossed some boundary (the wire, a script-visible integer id)
/// be resolved back to the same live `Arc` it started from, without
/// keeping every ever-created handle alive forever.
pub(crate) type HandleRegistry<H> = Mutex<HashMap<usize, Weak<H>>>;

/// Fetches (lazily creating) the handle registry for handle type `H` of
/// interpreter `I`, keyed by `Tag` so that `Task<I>`'s registry, `Pool<I>`'s
/// registry, and `Channel<I>`'s registry never share a slot.
pub(crate) fn handle_registry<Tag: 'static, I: Interpreter, H: Send + Sync + 'static>(
) -> Arc<HandleRegistry<H>> {
    let mut slots = slots().lock().unwrap();
    slots
        .entry(TypeId::of::<(Tag, I)>())
        .or_insert_with(|| Box::new(Arc::new(HandleRegistry::<H>::new(HashMap::new()))))
        .downcast_ref::<Arc<HandleRegistry<H>>>()
        .expect("registry slot type mismatch")
        .clone()
}

/// Inserts `handle` keyed by its `Arc` pointer address, pruning any
/// already-dead entries it happens to walk past along the way. Shared by
/// `Task`, `Pool`, and `Channel`'s own constructors.
pub(crate) fn intern_handle<Tag: 'static, I: Interpreter, H: Send + Sync + 'static>(
    handle: &Arc<H>,
) {
    let registry = handle_registry::<Tag, I, H>();
    let mut table = registry.lock().unwrap();
    table.retain(|_, weak| weak.strong_count() > 0);
    let address = Arc::as_ptr(handle) as usize;
    table.insert(address, Arc::downgrade(handle));
}

/// Resolves an address obtained from a handle's own `ptr()` back to the
/// live handle, or `None` if it has since been dropped.
pub(crate) fn resolve_handle<Tag: 'static, I: Interpreter, H: Send + Sync + 'static>(
    ptr: usize,
) -> Option<Arc<H>> {
    let registry = handle_registry::<Tag, I, H>();
    registry.lock().unwrap().get(&ptr).and_then(Weak::upgrade)
}

/// One spawn request: the marshalled environment every `Instance` it
/// produces is built from, the input `Channel` they all share, and the
/// bookkeeping needed to tear the last instance down.
pub struct Task<I: Interpreter> {
    env: Vec<u8>,
    input: Mutex<Arc<Channel<I>>>,
    // The user-visible target: what `size()` reports, incremented by
    // `spawn` and decremented immediately by `remove`, before the excess
    // instances have actually been torn down.
    instances: AtomicUsize,
    // The true number of not-yet-destroyed instances. `remove` never
    // touches this directly — it only drops below `instances` once a
    // worker observes the excess and self-destructs it.
    live: AtomicUsize,
    pool: Mutex<Arc<Pool<I>>>,
    parent: Option<Weak<Task<I>>>,
}

impl<I: Interpreter> Task<I> {
    /// Encodes `env`, allocates its input channel, and registers the
    /// handle. Does not spawn any instances yet — call [`Task::spawn`].
    pub fn wrap(env: I::Env) -> Result<Arc<Task<I>>, RuntimeError> {
        TaskBuilder::new(env).build()
    }

    pub fn input(&self) -> Arc<Channel<I>> {
        self.input.lock().unwrap().clone()
    }

    pub fn setinput(&self, channel: Arc<Channel<I>>) {
        *self.input.lock().unwrap() = channel;
    }

    pub fn pool(&self) -> Arc<Pool<I>> {
        self.pool.lock().unwrap().clone()
    }

    pub fn setpool(&self, pool: Arc<Pool<I>>) {
        *self.pool.lock().unwrap() = pool;
    }

    pub fn parent(&self) -> Option<Arc<Task<I>>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    /// The stable address identifying this task. Usable as a lookup key
    /// via [`Task::from_ptr`] even after the handle used to obtain it has
    /// crossed some boundary (the wire, a script-visible integer id).
    pub fn ptr(&self) -> usize {
        self as *const Self as usize
    }

    /// Resolves an address returned by [`Task::ptr`] back to the same
    /// live handle, or `None` if that task has since been dropped.
    pub fn from_ptr(ptr: usize) -> Option<Arc<Task<I>>> {
        resolve_handle::<TaskRegistryTag, I, Task<I>>(ptr)
    }

    /// Number of instances this task has live right now.
    pub fn size(&self) -> usize {
        self.instances.load(Ordering::SeqCst)
    }

    /// Creates `n` new instances in the `CREATED` state and pushes them
    /// onto this task's pool's ready queue.
    pub fn spawn(self: &Arc<Self>, n: usize) -> Result<(), RuntimeError> {
        let pool = self.pool();
        for _ in 0..n {
            let instance = Instance::new(self);
            self.instances.fetch_add(1, Ordering::SeqCst);
            self.live.fetch_add(1, Ordering::SeqCst);
            pool.push_ready(instance)?;
        }
        Ok(())
    }

    /// Lazily shrinks the instance count by `n`: does not kill instances
    /// directly. `size()` reflects the new, lower count immediately; the
    /// excess instances keep running until a worker next picks one of them
    /// up, notices `live > instances`, and self-destructs it instead of
    /// requeuing. Clamps at zero rather than going negative.
    pub fn remove(&self, n: usize) {
        let mut remaining = n;
        while remaining > 0 {
            let current = self.instances.load(Ordering::SeqCst);
            let next = current.saturating_sub(1);
            if current == 0
                || self
                    .instances
                    .compare_exchange(current, next, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok()
            {
                remaining -= 1;
            }
        }
    }

    /// An instance died on its own (a scripted error, a panic, or a
    /// failure to build from `env`): this wasn't already accounted for by
    /// a pending `remove`, so both counters drop.
    pub(crate) fn instance_died(&self) {
        Task::<I>::decrement(&self.instances);
        Task::<I>::decrement(&self.live);
    }

    /// An instance self-destructed after a worker observed
    /// `live > instances`: `remove` already decremented `instances` for
    /// this slot, so only `live` catches up.
    pub(crate) fn excess_instance_died(&self) {
        Task::<I>::decrement(&self.live);
    }

    /// `true` once more instances are alive than the task currently wants
    /// (i.e. a `remove` is still working its way through the pool).
    pub(crate) fn has_excess(&self) -> bool {
        self.live.load(Ordering::SeqCst) > self.instances.load(Ordering::SeqCst)
    }

    fn decrement(counter: &AtomicUsize) {
        let mut current = counter.load(Ordering::SeqCst);
        while current > 0 {
            match counter.compare_exchange(current, current - 1, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
    }

    pub(crate) fn pool_push_ready(&self, instance: Arc<Instance<I>>) {
        // A woken instance always has a live task (itself), so a push
        // failure here (capacity exceeded) just means the wake is
        // deferred; the instance stays `READY` and the next `put` or
        // manual resubmission will retry it. Not treated as fatal.
        self.pool().push_ready(instance).ok();
    }

    /// Decodes a fresh, independent copy of the environment this task was
    /// built with. Called once per `Instance` at init time, not cached,
    /// so two sibling instances never alias the same decoded value.
    pub(crate) fn build_env(&self) -> Result<I::Env, RuntimeError> {
        BincodeMarshaller::decode(&self.env)
    }
}

impl<I: Interpreter> PartialEq for Task<I> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl<I: Interpreter> Eq for Task<I> {}

/// Chainable construction for [`Task`], in place of a constructor with a
/// long run of optional positional arguments.
pub struct TaskBuilder<I: Interpreter> {
    env: I::Env,
    instances: usize,
    pool: Option<Arc<Pool<I>>>,
    parent: Option<Weak<Task<I>>>,
}

impl<I: Interpreter> TaskBuilder<I> {
    pub fn new(env: I::Env) -> TaskBuilder<I> {
        TaskBuilder {
            env,
            instances: 0,
            pool: None,
            parent: None,
        }
    }

    pub fn instances(mut self, n: usize) -> Self {
        self.instances = n;
        self
    }

    pub fn pool(mut self, pool: Arc<Pool<I>>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Overrides the automatic parent (see [`TaskBuilder::build`]) with an
    /// explicit one.
    pub fn parent(mut self, parent: &Arc<Task<I>>) -> Self {
        self.parent = Some(Arc::downgrade(parent));
        self
    }

    /// Encodes `env`, allocates the task, and registers its handle.
    ///
    /// `parent` defaults to the task whose instance is currently running on
    /// this thread, unless [`TaskBuilder::parent`] was called explicitly.
    pub fn build(self) -> Result<Arc<Task<I>>, RuntimeError> {
        let env = BincodeMarshaller::encode(&self.env)?;
        let pool = match self.pool {
            Some(pool) => pool,
            None => Pool::default_handle(),
        };
        let parent = self.parent.or_else(current::current::<I>);
        let task = Arc::new(Task {
            env,
            input: Mutex::new(Channel::new()),
            instances: AtomicUsize::new(0),
            live: AtomicUsize::new(0),
            pool: Mutex::new(pool),
            parent,
        });
        intern_handle::<TaskRegistryTag, I, Task<I>>(&task);
        if self.instances > 0 {
            task.spawn(self.instances)?;
        }
        Ok(task)
    }
}

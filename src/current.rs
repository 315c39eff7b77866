//! Thread-local tracking of "the `Task` whose `Instance` this worker is
//! currently stepping", so a `Task` built from inside a running instance
//! can resolve its own `parent()` without the embedding having to thread a
//! reference through by hand.
use std::any::Any;
use std::cell::RefCell;
use std::sync::Weak;

use crate::interpreter::Interpreter;
use crate::task::Task;

thread_local! {
    // Holds a `Weak<Task<I>>` for whatever `I` the running instance on this
    // thread is currently built from. Type-erased because a thread-local
    // can't itself be generic over `I`; `current` downcasts back using the
    // caller's own `I`, which is always the same interpreter type a step
    // is running under.
    static CURRENT: RefCell<Option<Box<dyn Any + Send>>> = RefCell::new(None);
}

/// Runs `body` with `task` recorded as the current thread's running task,
/// restoring whatever was recorded before on the way out (so nested
/// `Task::new` calls - an instance spawning a task whose first instance
/// synchronously spawns another - see the right ancestor at each level).
pub(crate) fn enter<I: Interpreter, R>(task: &Weak<Task<I>>, body: impl FnOnce() -> R) -> R {
    let previous = CURRENT.with(|cell| cell.borrow_mut().replace(Box::new(task.clone())));
    let result = body();
    CURRENT.with(|cell| *cell.borrow_mut() = previous);
    result
}

/// The task the calling thread is currently running an instance of, if any.
pub(crate) fn current<I: Interpreter>() -> Option<Weak<Task<I>>> {
    CURRENT.with(|cell| {
        cell.borrow()
            .as_ref()
            .and_then(|boxed| boxed.downcast_ref::<Weak<Task<I>>>())
            .cloned()
    })
}

//! Boundary cases enumerated in the scheduling properties table.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use fiberpool::{Interpreter, Pool, TaskBuilder};

struct NoOp;

impl Interpreter for NoOp {
    type Env = ();
    type Message = u32;
    type Error = std::convert::Infallible;

    fn build(_env: &()) -> Self {
        NoOp
    }

    fn call(&mut self, _message: u32) -> Result<(), std::convert::Infallible> {
        static SEEN: OnceLock<Arc<AtomicUsize>> = OnceLock::new();
        SEEN.get_or_init(|| Arc::new(AtomicUsize::new(0)))
            .fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// `new(f, e, 0)` creates a task with zero instances; `spawn(k)` afterwards
/// must still work.
#[test]
fn task_with_zero_initial_instances_can_spawn_later() {
    let task = TaskBuilder::<NoOp>::new(())
        .pool(Pool::new(2))
        .instances(0)
        .build()
        .unwrap();
    assert_eq!(task.size(), 0);

    task.spawn(3).unwrap();
    assert_eq!(task.size(), 3);
}

/// `Pool::new(0)` is legal: no workers exist, so a task pointed at it never
/// makes progress.
#[test]
fn pool_of_zero_workers_starves_its_tasks() {
    let task = TaskBuilder::<NoOp>::new(())
        .pool(Pool::new(0))
        .instances(1)
        .build()
        .unwrap();

    task.input().put(1).unwrap();
    std::thread::sleep(Duration::from_millis(150));

    // Nothing ever dequeues: the message is still sitting in the channel.
    assert_eq!(task.input().len(), 1);
}

/// Replacing a task's input channel does not redirect messages already
/// sitting in the old one.
#[test]
fn setinput_does_not_redirect_already_enqueued_messages() {
    let task = TaskBuilder::<NoOp>::new(())
        .pool(Pool::new(0))
        .instances(0)
        .build()
        .unwrap();

    let old_channel = task.input();
    old_channel.put(1).unwrap();
    old_channel.put(2).unwrap();

    let new_channel = fiberpool::Channel::<NoOp>::new();
    task.setinput(new_channel.clone());
    new_channel.put(3).unwrap();

    assert_eq!(old_channel.len(), 2);
    assert_eq!(new_channel.len(), 1);
    assert_eq!(task.input().len(), 1);
}

/// `remove(n)` with `n > instances` clamps at zero instead of going
/// negative or destroying more than exist.
#[test]
fn remove_more_than_instances_clamps_at_zero() {
    let task = TaskBuilder::<NoOp>::new(())
        .pool(Pool::new(0))
        .instances(2)
        .build()
        .unwrap();

    task.remove(10);
    assert_eq!(task.size(), 0);

    // A further spawn still works; the clamp didn't corrupt bookkeeping.
    task.spawn(1).unwrap();
    assert_eq!(task.size(), 1);
}

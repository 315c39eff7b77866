//! Round-trip laws that must hold for every public handle kind: resolving
//! the address a handle reports via `ptr()` through its type's `from_ptr()`
//! must hand back that same live handle, and must stop doing so once the
//! last strong reference to it is gone.
use std::sync::Arc;

use fiberpool::{Channel, Interpreter, Pool, Task, TaskBuilder};

struct Hush;

impl Interpreter for Hush {
    type Env = ();
    type Message = ();
    type Error = std::convert::Infallible;

    fn build(_env: &()) -> Self {
        Hush
    }

    fn call(&mut self, _message: ()) -> Result<(), std::convert::Infallible> {
        Ok(())
    }
}

#[test]
fn task_ptr_round_trips_to_the_same_handle() {
    let task = Task::<Hush>::wrap(()).unwrap();
    let resolved = Task::<Hush>::from_ptr(task.ptr()).unwrap();
    assert!(Arc::ptr_eq(&task, &resolved));
}

#[test]
fn task_ptr_stops_resolving_once_dropped() {
    let task = Task::<Hush>::wrap(()).unwrap();
    let ptr = task.ptr();
    drop(task);
    assert!(Task::<Hush>::from_ptr(ptr).is_none());
}

#[test]
fn pool_ptr_round_trips_to_the_same_handle() {
    let pool = Pool::<Hush>::new(0);
    let resolved = Pool::<Hush>::from_ptr(pool.ptr()).unwrap();
    assert!(Arc::ptr_eq(&pool, &resolved));
}

#[test]
fn pool_ptr_stops_resolving_once_dropped() {
    let pool = Pool::<Hush>::new(0);
    let ptr = pool.ptr();
    drop(pool);
    assert!(Pool::<Hush>::from_ptr(ptr).is_none());
}

#[test]
fn channel_ptr_round_trips_to_the_same_handle() {
    let channel = Channel::<Hush>::new();
    let resolved = Channel::<Hush>::from_ptr(channel.ptr()).unwrap();
    assert!(Arc::ptr_eq(&channel, &resolved));
}

#[test]
fn channel_ptr_stops_resolving_once_dropped() {
    let channel = Channel::<Hush>::new();
    let ptr = channel.ptr();
    drop(channel);
    assert!(Channel::<Hush>::from_ptr(ptr).is_none());
}

/// A task's input channel resolves through the same registry as one built
/// directly, since both paths funnel through `Channel::new`.
#[test]
fn task_input_channel_ptr_resolves() {
    let task = TaskBuilder::<Hush>::new(()).pool(Pool::new(0)).build().unwrap();
    let input = task.input();
    let resolved = Channel::<Hush>::from_ptr(input.ptr()).unwrap();
    assert!(Arc::ptr_eq(&input, &resolved));
}

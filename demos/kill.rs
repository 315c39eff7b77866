// Task::remove(n) kills instances lazily: it only lowers the target count
// immediately. An instance already RUNNING or BLOCKED keeps going; the
// actual destruction happens the next time a worker is about to requeue it
// as Ready and notices the task now wants fewer live instances than it has.
use std::thread;
use std::time::Duration;

use fiberpool::{Interpreter, Pool, TaskBuilder};

struct Loud(u32);

impl Interpreter for Loud {
    type Env = u32;
    type Message = ();
    type Error = std::convert::Infallible;

    fn build(id: &u32) -> Self {
        Loud(*id)
    }

    fn call(&mut self, _message: ()) -> Result<(), std::convert::Infallible> {
        println!("instance {} still alive", self.0);
        Ok(())
    }
}

fn main() {
    tracing_subscriber::fmt::init();

    let pool = Pool::<Loud>::new(4);
    let task = TaskBuilder::<Loud>::new(0)
        .pool(pool)
        .instances(4)
        .build()
        .unwrap();
    println!("spawned {} instances", task.size());

    task.remove(3);
    println!("target size dropped to {} (live count lags)", task.size());

    for _ in 0..20 {
        task.input().put(()).unwrap();
    }

    thread::sleep(Duration::from_millis(200));
    println!("target size settled at {}", task.size());
}

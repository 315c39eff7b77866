// A panic inside `Interpreter::call` (or `handle_error`) is caught and
// turned into a `ScriptPanic` rather than taking down the worker thread that
// happened to be running it; the instance that panicked dies, its siblings
// keep serving the task's channel.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use fiberpool::{Interpreter, Pool, TaskBuilder};

struct Flaky {
    calls: Arc<AtomicUsize>,
}

impl Interpreter for Flaky {
    type Env = ();
    type Message = u32;
    type Error = std::convert::Infallible;

    fn build(_env: &()) -> Self {
        Flaky {
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn call(&mut self, message: u32) -> Result<(), std::convert::Infallible> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if message == 13 {
            panic!("unlucky message");
        }
        println!("handled {message}");
        Ok(())
    }
}

fn main() {
    tracing_subscriber::fmt::init();

    let task = TaskBuilder::<Flaky>::new(())
        .pool(Pool::new(2))
        .instances(2)
        .build()
        .unwrap();

    for message in [1, 13, 2, 3] {
        task.input().put(message).unwrap();
    }

    thread::sleep(Duration::from_millis(150));
    // One instance died from the panic; the other is still counted live.
    println!("instances remaining: {}", task.size());
}

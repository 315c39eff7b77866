use std::thread;
use std::time::Duration;

use fiberpool::{Interpreter, Pool, TaskBuilder};

struct Worker;

impl Interpreter for Worker {
    type Env = ();
    type Message = u32;
    type Error = String;

    fn build(_env: &()) -> Self {
        Worker
    }

    fn call(&mut self, counter: u32) -> Result<(), String> {
        if counter % 4 == 0 {
            panic!("completely broken");
        }
        thread::sleep(Duration::from_millis(200));
        println!("handled {counter}");
        Ok(())
    }

    fn handle_error(&mut self, error: String) {
        eprintln!("instance error: {error}");
    }
}

fn main() {
    tracing_subscriber::fmt::init();

    let pool = Pool::<Worker>::new(4);
    let task = TaskBuilder::<Worker>::new(())
        .pool(pool.clone())
        .instances(4)
        .build()
        .unwrap();

    for counter in 0..16 {
        task.input().put(counter).unwrap();
    }

    thread::sleep(Duration::from_secs(2));
    println!("pool size now: {}", pool.size());
}

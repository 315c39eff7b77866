use std::thread::sleep;
use std::time::Duration;

use fiberpool::{Interpreter, TaskBuilder};

struct Doubler;

impl Interpreter for Doubler {
    type Env = ();
    type Message = i32;
    type Error = std::convert::Infallible;

    fn build(_env: &()) -> Self {
        Doubler
    }

    fn call(&mut self, message: i32) -> Result<(), std::convert::Infallible> {
        println!("{:?}", message * 2);
        Ok(())
    }
}

fn main() {
    tracing_subscriber::fmt::init();

    let task = TaskBuilder::<Doubler>::new(()).instances(1).build().unwrap();
    task.input().put(21).unwrap();

    sleep(Duration::from_millis(100));
}

// Two tasks sharing one input channel. fiberpool has no return-channel or
// join primitive like IPC-based process pools; "communicating" here means
// two independently-built tasks splitting one stream of work, the way
// `Task::setinput` lets a caller point several tasks at the same queue.
use std::thread;
use std::time::Duration;

use fiberpool::{Channel, Interpreter, TaskBuilder};

struct Doubles;

impl Interpreter for Doubles {
    type Env = ();
    type Message = u32;
    type Error = std::convert::Infallible;

    fn build(_env: &()) -> Self {
        Doubles
    }

    fn call(&mut self, n: u32) -> Result<(), std::convert::Infallible> {
        println!("doubles: {} -> {}", n, n * 2);
        Ok(())
    }
}

struct Squares;

impl Interpreter for Squares {
    type Env = ();
    type Message = u32;
    type Error = std::convert::Infallible;

    fn build(_env: &()) -> Self {
        Squares
    }

    fn call(&mut self, n: u32) -> Result<(), std::convert::Infallible> {
        println!("squares: {} -> {}", n, n * n);
        Ok(())
    }
}

fn main() {
    tracing_subscriber::fmt::init();

    let doublers = TaskBuilder::<Doubles>::new(()).instances(2).build().unwrap();
    let squarers = TaskBuilder::<Squares>::new(()).instances(2).build().unwrap();

    let shared: std::sync::Arc<Channel<Doubles>> = doublers.input();
    // Squares has a different `Message` type, so it gets its own channel fed
    // from the same source of numbers instead; sharing a literal `Channel<I>`
    // only makes sense between tasks built over the same interpreter type.
    let more_doublers = TaskBuilder::<Doubles>::new(()).instances(1).build().unwrap();
    more_doublers.setinput(shared.clone());

    for n in 0..10 {
        shared.put(n).unwrap();
        squarers.input().put(n).unwrap();
    }

    thread::sleep(Duration::from_millis(200));
}

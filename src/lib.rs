//! A cooperative multi-process runtime for embedded script interpreters.
//!
//! Many isolated scripted "instances" share a dynamically sized pool of OS
//! worker threads, communicating only through channels. An embedding crate
//! supplies the actual scripting language by implementing [`Interpreter`];
//! everything else — the lock-free ready queue, the task/instance process
//! model, and the dispatch loop that drives instances to completion — is
//! provided here, generic over that one trait.
//!
//! ```rust,no_run
//! use fiberpool::{Interpreter, Task};
//!
//! struct Doubler;
//!
//! impl Interpreter for Doubler {
//!     type Env = ();
//!     type Message = i32;
//!     type Error = std::convert::Infallible;
//!
//!     fn build(_env: &()) -> Self {
//!         Doubler
//!     }
//!
//!     fn call(&mut self, message: i32) -> Result<(), std::convert::Infallible> {
//!         println!("{}", message * 2);
//!         Ok(())
//!     }
//! }
//!
//! let task = Task::<Doubler>::wrap(()).unwrap();
//! task.spawn(1).unwrap();
//! task.input().put(21).unwrap();
//! ```
mod channel;
mod current;
mod error;
mod event;
mod instance;
mod interpreter;
mod macros;
mod marshal;
mod pool;
mod queue;
mod task;

pub use channel::Channel;
pub use error::{RuntimeError, ScriptPanic};
pub use event::Event;
pub use instance::{Instance, InstanceState};
pub use interpreter::Interpreter;
pub use marshal::{BincodeMarshaller, Marshaller};
pub use pool::{Pool, PoolBuilder};
pub use queue::Queue;
pub use task::{Task, TaskBuilder};

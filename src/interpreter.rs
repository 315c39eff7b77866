//! The embedded-interpreter collaborator boundary.
//!
//! The runtime deliberately knows nothing about any particular scripting
//! language, its standard library, or its binding glue — it only consumes
//! the interface below. An embedding crate implements `Interpreter` once
//! per scripting language it wants to host.
use serde::de::DeserializeOwned;
use serde::Serialize;

/// One isolated scripted execution unit.
///
/// `build` constructs a fresh, isolated interpreter state from the decoded
/// `Env`. `call` is the body of the instance's driver loop for a single
/// received message. `handle_error` is the optional error handler
/// installed alongside the environment; its default implementation does
/// nothing, i.e. the error is swallowed once the instance has already
/// been routed to death.
pub trait Interpreter: Send + 'static {
    /// The marshalled data needed to build one instance: the closure's
    /// captured environment and (optionally, folded in by the embedding
    /// type) its error handler.
    type Env: Serialize + DeserializeOwned + Send + 'static;
    /// Values carried over this interpreter's input `Channel`.
    type Message: Send + 'static;
    /// A scripted runtime error raised from `call`.
    type Error: Send + 'static;

    /// Builds a fresh instance from its decoded environment.
    fn build(env: &Self::Env) -> Self;

    /// Runs one cooperative step: the instance received `message` and must
    /// process it to completion before yielding back to the scheduler.
    fn call(&mut self, message: Self::Message) -> Result<(), Self::Error>;

    /// Invoked when `call` returns an error. After this returns (or
    /// panics, which the dispatch loop also catches) the instance is
    /// destroyed.
    #[allow(unused_variables)]
    fn handle_error(&mut self, error: Self::Error) {}
}

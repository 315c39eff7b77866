use std::fmt;

/// Represents a panic caught out of an [`Interpreter::call`](crate::Interpreter::call).
///
/// This is the payload captured by `std::panic::catch_unwind` around a
/// single cooperative step.
pub struct ScriptPanic {
    msg: String,
    #[cfg(feature = "backtrace")]
    backtrace: Option<backtrace::Backtrace>,
}

impl ScriptPanic {
    pub(crate) fn capture(payload: &(dyn std::any::Any + Send + 'static)) -> ScriptPanic {
        let msg = match payload.downcast_ref::<&'static str>() {
            Some(s) => (*s).to_string(),
            None => match payload.downcast_ref::<String>() {
                Some(s) => s.clone(),
                None => "Box<Any>".to_string(),
            },
        };
        ScriptPanic {
            msg,
            #[cfg(feature = "backtrace")]
            backtrace: Some(backtrace::Backtrace::new()),
        }
    }

    /// Returns the message of the panic.
    pub fn message(&self) -> &str {
        self.msg.as_str()
    }

    /// Returns a reference to the captured backtrace, if the `backtrace`
    /// feature is enabled.
    #[cfg(feature = "backtrace")]
    pub fn backtrace(&self) -> Option<&backtrace::Backtrace> {
        self.backtrace.as_ref()
    }
}

impl fmt::Debug for ScriptPanic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptPanic")
            .field("message", &self.message())
            .finish()
    }
}

impl fmt::Display for ScriptPanic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.msg)
    }
}

/// Errors surfaced synchronously at the runtime's API boundary.
///
/// Scripted runtime errors raised inside an `Instance` are routed to the
/// owning `Task`'s error handler instead and never show up here; this enum
/// only carries host-side failures: argument errors, marshalling errors,
/// and queue/channel capacity errors.
#[derive(Debug)]
pub enum RuntimeError {
    /// A negative size, a double-`wrap`, or another caller misuse that
    /// can be rejected without touching any shared state.
    Argument(String),
    /// The configured [`Marshaller`](crate::Marshaller) failed to encode or
    /// decode an `Env` payload.
    Marshal(String),
    /// `Queue::push` was rejected because the queue is at its configured
    /// capacity.
    QueueFull,
    /// `Channel::put` was rejected because the channel's queue is at its
    /// configured capacity.
    ChannelFull,
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::Argument(msg) => write!(f, "argument error: {msg}"),
            RuntimeError::Marshal(msg) => write!(f, "marshal error: {msg}"),
            RuntimeError::QueueFull => write!(f, "queue is full"),
            RuntimeError::ChannelFull => write!(f, "channel is full"),
        }
    }
}

impl std::error::Error for RuntimeError {}

use std::fmt;

/// Outcome delivered by every continuation: the `(error, result)` pair.
pub type Outcome<T> = Result<T, TaskError>;

/// Errors carried through continuation chains.
///
/// `Clone` so a single failure can be broadcast to every waiter of a load.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    /// A producer invoked its delivery callback more than once.
    #[error("Callback called twice!")]
    CalledTwice,
    /// Error raised by a coroutine, a factory or a producer.
    #[error("{0}")]
    Raised(String),
    /// A remote resource could not be fetched.
    #[error("failed to fetch {target}: {reason}")]
    Fetch { target: String, reason: String },
    /// A one-shot notification was dropped before it was settled.
    #[error("{0} was abandoned before it completed")]
    Abandoned(String),
    /// A module imports one of the modules currently waiting on it.
    #[error("import cycle: {0}")]
    Cycle(String),
}

impl TaskError {
    pub fn raised(message: impl fmt::Display) -> Self {
        Self::Raised(message.to_string())
    }

    pub fn fetch(target: impl fmt::Display, reason: impl fmt::Display) -> Self {
        Self::Fetch {
            target: target.to_string(),
            reason: reason.to_string(),
        }
    }
}

use std::rc::Rc;

use crate::error::{Outcome, TaskError};

/// Callback receiving the outcome of a continuation.
///
/// Cloning shares the same callback, so a producer can hand it to several
/// completion paths (a success handler and a failure handler, say). The
/// contract is that only one of them ever fires; the scheduler's guard
/// catches producers that break it.
pub struct Delivery<T>(Rc<dyn Fn(Outcome<T>)>);

impl<T> Clone for Delivery<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T: 'static> Delivery<T> {
    pub fn new(callback: impl Fn(Outcome<T>) + 'static) -> Self {
        Self(Rc::new(callback))
    }

    pub fn deliver(&self, outcome: Outcome<T>) {
        (self.0)(outcome)
    }

    pub fn succeed(&self, value: T) {
        self.deliver(Ok(value))
    }

    pub fn fail(&self, error: TaskError) {
        self.deliver(Err(error))
    }
}

type Producer<T> = Box<dyn FnOnce(Delivery<T>) -> Result<(), TaskError>>;

enum Source<T> {
    Ready(Outcome<T>),
    Deferred(Producer<T>),
}

/// The unit of suspension: a computation that delivers one outcome to the
/// callback it is resolved with.
pub struct Continuation<T>(Source<T>);

impl<T: 'static> Continuation<T> {
    /// An already-resolved continuation.
    pub fn ready(outcome: Outcome<T>) -> Self {
        Self(Source::Ready(outcome))
    }

    pub fn value(value: T) -> Self {
        Self::ready(Ok(value))
    }

    pub fn error(error: TaskError) -> Self {
        Self::ready(Err(error))
    }

    /// A continuation backed by a producer that will call the delivery
    /// callback once the outcome is known.
    pub fn new(producer: impl FnOnce(Delivery<T>) + 'static) -> Self {
        Self::try_new(move |delivery| {
            producer(delivery);
            Ok(())
        })
    }

    /// Like [`Continuation::new`], but a producer that fails while starting
    /// has its error delivered in place of an outcome.
    pub fn try_new(producer: impl FnOnce(Delivery<T>) -> Result<(), TaskError> + 'static) -> Self {
        Self(Source::Deferred(Box::new(producer)))
    }

    /// Start the continuation, handing its outcome to `delivery`.
    pub fn resolve(self, delivery: Delivery<T>) {
        match self.0 {
            Source::Ready(outcome) => delivery.deliver(outcome),
            Source::Deferred(producer) => {
                if let Err(error) = producer(delivery.clone()) {
                    delivery.deliver(Err(error));
                }
            }
        }
    }

    /// Transform the success value.
    ///
    /// Every delivery of the underlying producer is forwarded, including
    /// repeated ones, so a downstream one-shot guard still sees them.
    pub fn map<U: 'static>(self, f: impl Fn(T) -> U + 'static) -> Continuation<U> {
        match self.0 {
            Source::Ready(outcome) => Continuation::ready(outcome.map(f)),
            Source::Deferred(producer) => Continuation::try_new(move |delivery: Delivery<U>| {
                producer(Delivery::new(move |outcome: Outcome<T>| {
                    delivery.deliver(outcome.map(&f))
                }))
            }),
        }
    }
}

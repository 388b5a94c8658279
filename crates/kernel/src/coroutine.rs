use std::marker::PhantomData;

use crate::continuation::Continuation;
use crate::error::TaskError;

/// How a coroutine is resumed.
#[derive(Debug)]
pub enum Resume<Y> {
    /// First resumption; nothing has been yielded yet.
    Start,
    /// The last yielded continuation produced a result.
    Next(Y),
    /// The last yielded continuation failed. The coroutine may recover.
    Throw(TaskError),
}

/// What a coroutine did when resumed.
pub enum Step<Y, O> {
    /// Suspend until this continuation resolves.
    Yield(Continuation<Y>),
    /// Finished with a value.
    Complete(O),
}

/// A resumable computation that suspends by yielding continuations.
///
/// Returning `Err` from `resume` is an uncaught error: the coroutine is
/// abandoned and the error becomes the outcome of the whole run.
pub trait Coroutine: 'static {
    /// Result type of the continuations this coroutine yields.
    type Yield: 'static;
    type Output: 'static;

    fn resume(
        &mut self,
        input: Resume<Self::Yield>,
    ) -> Result<Step<Self::Yield, Self::Output>, TaskError>;
}

impl<C: Coroutine + ?Sized> Coroutine for Box<C> {
    type Yield = C::Yield;
    type Output = C::Output;

    fn resume(
        &mut self,
        input: Resume<Self::Yield>,
    ) -> Result<Step<Self::Yield, Self::Output>, TaskError> {
        (**self).resume(input)
    }
}

/// Closure-backed coroutine; see [`coroutine`].
pub struct FnCoroutine<F, Y, O> {
    body: F,
    _types: PhantomData<fn(Y) -> O>,
}

/// Build a coroutine from a resume function. State lives in the closure.
pub fn coroutine<Y, O, F>(body: F) -> FnCoroutine<F, Y, O>
where
    F: FnMut(Resume<Y>) -> Result<Step<Y, O>, TaskError> + 'static,
    Y: 'static,
    O: 'static,
{
    FnCoroutine {
        body,
        _types: PhantomData,
    }
}

impl<F, Y, O> Coroutine for FnCoroutine<F, Y, O>
where
    F: FnMut(Resume<Y>) -> Result<Step<Y, O>, TaskError> + 'static,
    Y: 'static,
    O: 'static,
{
    type Yield = Y;
    type Output = O;

    fn resume(&mut self, input: Resume<Y>) -> Result<Step<Y, O>, TaskError> {
        (self.body)(input)
    }
}

/// Placeholder coroutine type for computations that never suspend.
pub struct Plain<T>(PhantomData<fn() -> T>);

impl<T: 'static> Coroutine for Plain<T> {
    type Yield = ();
    type Output = T;

    fn resume(&mut self, _input: Resume<()>) -> Result<Step<(), T>, TaskError> {
        Err(TaskError::raised("plain computation has no coroutine to resume"))
    }
}

/// What a coroutine factory produced.
pub enum Body<C: Coroutine> {
    /// A computation that finished without suspending.
    Value(C::Output),
    /// A coroutine to drive.
    Suspend(C),
}

impl<T: 'static> Body<Plain<T>> {
    pub fn plain(value: T) -> Self {
        Body::Value(value)
    }
}

impl<C: Coroutine> From<C> for Body<C> {
    fn from(coroutine: C) -> Self {
        Body::Suspend(coroutine)
    }
}

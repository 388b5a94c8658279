use std::cell::RefCell;
use std::collections::VecDeque;

use crate::continuation::{Continuation, Delivery};
use crate::error::Outcome;

/// The `unit`/`bind` pair that defines how continuations compose.
///
/// `bind(c, f)` yields a continuation that resolves `c`, feeds its outcome to
/// `f` to obtain the next continuation, and forwards that one's outcome.
pub trait Sequencer: Clone + 'static {
    /// A continuation already resolved with `outcome`.
    fn unit<T: 'static>(&self, outcome: Outcome<T>) -> Continuation<T> {
        Continuation::ready(outcome)
    }

    fn bind<T, U, F>(&self, value: Continuation<T>, transform: F) -> Continuation<U>
    where
        T: 'static,
        U: 'static,
        F: FnOnce(Outcome<T>) -> Continuation<U> + 'static;
}

/// Synchronous sequencing: everything a resolve sets in motion has finished
/// by the time that resolve returns.
///
/// Steps are bounced through a per-thread queue instead of nesting, so a
/// long chain of ready continuations runs in constant stack depth.
///
/// There is no double-delivery reporting here; a repeated delivery finds the
/// step already consumed and is dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct Immediate;

impl Sequencer for Immediate {
    fn bind<T, U, F>(&self, value: Continuation<T>, transform: F) -> Continuation<U>
    where
        T: 'static,
        U: 'static,
        F: FnOnce(Outcome<T>) -> Continuation<U> + 'static,
    {
        Continuation::new(move |callback: Delivery<U>| {
            let transform = RefCell::new(Some(transform));
            value.resolve(Delivery::new(move |outcome| {
                let Some(step) = transform.borrow_mut().take() else {
                    tracing::trace!("immediate bind dropped a repeated delivery");
                    return;
                };
                let next = step(outcome);
                let downstream = callback.clone();
                bounce(move || next.resolve(downstream));
            }));
        })
    }
}

type Job = Box<dyn FnOnce()>;

#[derive(Default)]
struct Trampoline {
    jobs: VecDeque<Job>,
    draining: bool,
}

thread_local! {
    static TRAMPOLINE: RefCell<Trampoline> = RefCell::new(Trampoline::default());
}

/// Run `job` now, or, when a job is already running on this thread, right
/// after it returns.
fn bounce(job: impl FnOnce() + 'static) {
    let first = TRAMPOLINE.with(|t| {
        let mut t = t.borrow_mut();
        t.jobs.push_back(Box::new(job));
        !std::mem::replace(&mut t.draining, true)
    });
    if !first {
        return;
    }
    let _draining = Draining;
    while let Some(job) = TRAMPOLINE.with(|t| t.borrow_mut().jobs.pop_front()) {
        job();
    }
}

/// Clears the draining flag even if a job unwinds.
struct Draining;

impl Drop for Draining {
    fn drop(&mut self) {
        let leftover = TRAMPOLINE.with(|t| {
            let mut t = t.borrow_mut();
            t.draining = false;
            std::mem::take(&mut t.jobs)
        });
        drop(leftover);
    }
}

use std::cell::RefCell;
use std::rc::Rc;

use crate::continuation::{Continuation, Delivery};
use crate::error::Outcome;

enum LatchState<T> {
    Waiting(Vec<Delivery<T>>),
    Settled(Outcome<T>),
}

/// One-shot notification shared by any number of waiters.
///
/// Settles exactly once; every waiter, early or late, receives a clone of
/// that outcome. A second `settle` is refused and logged.
pub struct Latch<T> {
    state: Rc<RefCell<LatchState<T>>>,
}

impl<T> Clone for Latch<T> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<T: Clone + 'static> Default for Latch<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + 'static> Latch<T> {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(LatchState::Waiting(Vec::new()))),
        }
    }

    /// A continuation resolving with the settled outcome.
    pub fn wait(&self) -> Continuation<T> {
        let state = Rc::clone(&self.state);
        Continuation::new(move |delivery| {
            let settled = match &mut *state.borrow_mut() {
                LatchState::Waiting(waiters) => {
                    waiters.push(delivery);
                    return;
                }
                LatchState::Settled(outcome) => outcome.clone(),
            };
            delivery.deliver(settled);
        })
    }

    /// Settle the latch and notify all waiters. Returns `false` if it was
    /// already settled, in which case nothing changes.
    pub fn settle(&self, outcome: Outcome<T>) -> bool {
        let previous = std::mem::replace(
            &mut *self.state.borrow_mut(),
            LatchState::Settled(outcome.clone()),
        );
        match previous {
            LatchState::Waiting(waiters) => {
                for waiter in waiters {
                    waiter.deliver(outcome.clone());
                }
                true
            }
            LatchState::Settled(first) => {
                *self.state.borrow_mut() = LatchState::Settled(first);
                tracing::warn!("latch settled twice; keeping the first outcome");
                false
            }
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(*self.state.borrow(), LatchState::Settled(_))
    }

    /// Number of callbacks waiting for the outcome.
    pub fn waiters(&self) -> usize {
        match &*self.state.borrow() {
            LatchState::Waiting(waiters) => waiters.len(),
            LatchState::Settled(_) => 0,
        }
    }
}

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::continuation::{Continuation, Delivery};
use crate::error::{Outcome, TaskError};
use crate::sequencer::Sequencer;

type Job = Box<dyn FnOnce()>;

#[derive(Default)]
struct TickQueue {
    jobs: VecDeque<Job>,
    tick: u64,
    executed: u64,
}

/// Single-threaded tick scheduler.
///
/// As a [`Sequencer`], its `bind` runs the next step eagerly but queues the
/// delivery of that step's outcome for the next tick, and guards every
/// suspension against double delivery. Coroutines driven through it
/// interleave only at tick boundaries.
///
/// Handles are cheap clones sharing one queue.
#[derive(Clone, Default)]
pub struct TaskScheduler {
    queue: Rc<RefCell<TickQueue>>,
}

impl TaskScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `job` to run on the next tick.
    pub fn defer(&self, job: impl FnOnce() + 'static) {
        self.queue.borrow_mut().jobs.push_back(Box::new(job));
    }

    /// Run the jobs that were queued before this tick started. Jobs they
    /// queue in turn wait for the following tick. Returns the number run.
    pub fn tick(&self) -> usize {
        let batch: Vec<Job> = {
            let mut queue = self.queue.borrow_mut();
            queue.tick += 1;
            queue.jobs.drain(..).collect()
        };
        let ran = batch.len();
        for job in batch {
            job();
        }
        self.queue.borrow_mut().executed += ran as u64;
        tracing::trace!(tick = self.ticks(), ran, pending = self.pending(), "tick");
        ran
    }

    /// Tick until no jobs remain. Returns the number of ticks run.
    ///
    /// There is no timeout: a producer that keeps re-queueing itself keeps
    /// this loop alive.
    pub fn run_until_idle(&self) -> u64 {
        let mut ticks = 0;
        while self.pending() > 0 {
            self.tick();
            ticks += 1;
        }
        ticks
    }

    /// Jobs waiting for the next tick.
    pub fn pending(&self) -> usize {
        self.queue.borrow().jobs.len()
    }

    /// Ticks run so far.
    pub fn ticks(&self) -> u64 {
        self.queue.borrow().tick
    }

    /// Jobs run so far.
    pub fn executed(&self) -> u64 {
        self.queue.borrow().executed
    }
}

/// Per-suspension bookkeeping: the one-shot flag, the pending step, and the
/// downstream callback still owed a violation report.
struct Guard<U, F> {
    delivered: bool,
    transform: Option<F>,
    downstream: Option<Delivery<U>>,
}

impl Sequencer for TaskScheduler {
    fn bind<T, U, F>(&self, value: Continuation<T>, transform: F) -> Continuation<U>
    where
        T: 'static,
        U: 'static,
        F: FnOnce(Outcome<T>) -> Continuation<U> + 'static,
    {
        let scheduler = self.clone();
        Continuation::new(move |callback: Delivery<U>| {
            let guard = Rc::new(RefCell::new(Guard {
                delivered: false,
                transform: Some(transform),
                downstream: Some(callback),
            }));

            value.resolve(Delivery::new(move |outcome: Outcome<T>| {
                let mut state = guard.borrow_mut();
                if state.delivered {
                    let owed = state.downstream.take();
                    drop(state);
                    match owed {
                        Some(downstream) => {
                            tracing::error!("continuation delivered its outcome twice");
                            downstream.fail(TaskError::CalledTwice);
                        }
                        None => match outcome {
                            Ok(_) => tracing::warn!("discarded repeated delivery of a result"),
                            Err(error) => {
                                tracing::warn!(%error, "discarded repeated delivery of an error")
                            }
                        },
                    }
                    return;
                }
                state.delivered = true;
                let Some(step) = state.transform.take() else {
                    return;
                };
                drop(state);

                // The step runs now; only its delivery waits for the tick. The
                // downstream is looked up then, so a violation reported in the
                // meantime leaves nothing to deliver to.
                let next = step(outcome);
                let owner = Rc::clone(&guard);
                scheduler.defer(move || {
                    let downstream = owner.borrow().downstream.clone();
                    match downstream {
                        Some(downstream) => next.resolve(downstream),
                        None => tracing::warn!("discarded result of a step whose producer delivered twice"),
                    }
                });
            }));
        })
    }
}

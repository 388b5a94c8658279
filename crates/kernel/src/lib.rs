//! Continuation kernel: unit/bind sequencing, the tick scheduler, and the
//! coroutine driver built on them.
//!
//! # Invariants
//! - A delivery callback receives at most one outcome per producer; the
//!   scheduler reports the first violation and discards the rest.
//! - Within one coroutine, a step never starts before the continuation it
//!   yielded has resolved.
//! - Everything is single-threaded; coroutines interleave only at ticks.

mod continuation;
mod coroutine;
mod driver;
mod error;
mod latch;
mod scheduler;
mod sequencer;

pub use continuation::{Continuation, Delivery};
pub use coroutine::{Body, Coroutine, FnCoroutine, Plain, Resume, Step, coroutine};
pub use driver::run;
pub use error::{Outcome, TaskError};
pub use latch::Latch;
pub use scheduler::TaskScheduler;
pub use sequencer::{Immediate, Sequencer};

pub fn crate_info() -> &'static str {
    "orbfield-kernel v0.1.0"
}

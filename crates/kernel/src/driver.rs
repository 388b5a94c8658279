use crate::continuation::Continuation;
use crate::coroutine::{Body, Coroutine, Resume, Step};
use crate::error::{Outcome, TaskError};
use crate::sequencer::Sequencer;

/// Turn a coroutine factory into a single continuation.
///
/// Nothing runs until the returned continuation is resolved. Then the
/// factory is called; a plain value resolves immediately, a coroutine is
/// resumed step by step, each yielded continuation bound through
/// `sequencer` and its outcome fed back in (`Next` for results, `Throw` for
/// errors). The run resolves with the coroutine's completion value, or with
/// the first error it fails to handle.
pub fn run<S, C, F>(sequencer: &S, factory: F) -> Continuation<C::Output>
where
    S: Sequencer,
    C: Coroutine,
    F: FnOnce() -> Result<Body<C>, TaskError> + 'static,
{
    let seq = sequencer.clone();
    sequencer.bind(sequencer.unit(Ok(())), move |_: Outcome<()>| match factory() {
        Err(error) => seq.unit(Err(error)),
        Ok(Body::Value(value)) => seq.unit(Ok(value)),
        Ok(Body::Suspend(coroutine)) => {
            let driver = seq.clone();
            seq.bind(seq.unit(Ok(())), move |_: Outcome<()>| {
                drive(driver, coroutine, Resume::Start)
            })
        }
    })
}

fn drive<S, C>(seq: S, mut coroutine: C, input: Resume<C::Yield>) -> Continuation<C::Output>
where
    S: Sequencer,
    C: Coroutine,
{
    match coroutine.resume(input) {
        Err(error) => {
            tracing::debug!(%error, "coroutine failed");
            seq.unit(Err(error))
        }
        Ok(Step::Complete(value)) => seq.unit(Ok(value)),
        Ok(Step::Yield(next)) => {
            let driver = seq.clone();
            seq.bind(next, move |outcome| {
                let input = match outcome {
                    Ok(value) => Resume::Next(value),
                    Err(error) => Resume::Throw(error),
                };
                drive(driver, coroutine, input)
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::continuation::Delivery;
    use crate::coroutine::{Plain, coroutine};
    use crate::scheduler::TaskScheduler;
    use crate::sequencer::Immediate;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recorder<T: 'static>() -> (Delivery<T>, Rc<RefCell<Vec<Outcome<T>>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        (Delivery::new(move |o| sink.borrow_mut().push(o)), log)
    }

    /// Yields one continuation, then doubles what it produced.
    fn doubler(c1: Continuation<i32>) -> impl Coroutine<Yield = i32, Output = i32> {
        let mut pending = Some(c1);
        coroutine(move |input: Resume<i32>| match input {
            Resume::Start => pending
                .take()
                .map(Step::Yield)
                .ok_or_else(|| TaskError::raised("restarted")),
            Resume::Next(v) => Ok(Step::Complete(v * 2)),
            Resume::Throw(e) => Err(e),
        })
    }

    #[test]
    fn yields_then_completes() {
        let s = TaskScheduler::new();
        let (cb, log) = recorder();
        run(&s, || Ok(Body::Suspend(doubler(Continuation::value(5))))).resolve(cb);
        s.run_until_idle();
        assert_eq!(*log.borrow(), vec![Ok(10)]);
    }

    #[test]
    fn nothing_runs_until_resolved() {
        let s = TaskScheduler::new();
        let called = Rc::new(RefCell::new(false));
        let flag = Rc::clone(&called);
        let pending = run(&s, move || {
            *flag.borrow_mut() = true;
            Ok(Body::plain(1))
        });
        s.run_until_idle();
        assert!(!*called.borrow());
        pending.resolve(Delivery::new(|_| {}));
        assert!(*called.borrow());
    }

    #[test]
    fn plain_value_resolves_directly() {
        let (cb, log) = recorder();
        run(&Immediate, || Ok(Body::plain("done"))).resolve(cb);
        assert_eq!(*log.borrow(), vec![Ok("done")]);
    }

    #[test]
    fn failing_factory_resolves_with_error() {
        let (cb, log) = recorder::<u8>();
        run(&Immediate, || -> Result<Body<Plain<u8>>, TaskError> {
            Err(TaskError::raised("factory"))
        })
        .resolve(cb);
        assert_eq!(*log.borrow(), vec![Err(TaskError::raised("factory"))]);
    }

    #[test]
    fn uncaught_upstream_error_propagates() {
        let s = TaskScheduler::new();
        let (cb, log) = recorder();
        let failing = Continuation::error(TaskError::fetch("a.js", "404"));
        run(&s, move || Ok(Body::Suspend(doubler(failing)))).resolve(cb);
        s.run_until_idle();
        assert_eq!(*log.borrow(), vec![Err(TaskError::fetch("a.js", "404"))]);
    }

    #[test]
    fn caught_error_allows_recovery() {
        let s = TaskScheduler::new();
        let (cb, log) = recorder();
        let mut first = true;
        let recovering = coroutine(move |input: Resume<i32>| match input {
            Resume::Start if first => {
                first = false;
                Ok(Step::Yield(Continuation::error(TaskError::raised("flaky"))))
            }
            Resume::Throw(_) => Ok(Step::Complete(-1)),
            Resume::Next(v) => Ok(Step::Complete(v)),
            Resume::Start => Err(TaskError::raised("restarted")),
        });
        run(&s, move || Ok(Body::Suspend(recovering))).resolve(cb);
        s.run_until_idle();
        assert_eq!(*log.borrow(), vec![Ok(-1)]);
    }

    #[test]
    fn coroutine_error_after_yields() {
        let s = TaskScheduler::new();
        let (cb, log) = recorder::<()>();
        let mut steps = 0;
        let co = coroutine(move |_input: Resume<()>| {
            steps += 1;
            if steps < 3 {
                Ok(Step::Yield(Continuation::value(())))
            } else {
                Err(TaskError::raised("gave up"))
            }
        });
        run(&s, move || Ok(Body::Suspend(co))).resolve(cb);
        s.run_until_idle();
        assert_eq!(*log.borrow(), vec![Err(TaskError::raised("gave up"))]);
    }

    #[test]
    fn delivers_exactly_once_on_success() {
        let s = TaskScheduler::new();
        let (cb, log) = recorder();
        let mut left = 10;
        let counter = coroutine(move |input: Resume<u32>| {
            let seen = match input {
                Resume::Start => 0,
                Resume::Next(v) => v,
                Resume::Throw(e) => return Err(e),
            };
            if left == 0 {
                return Ok(Step::Complete(seen));
            }
            left -= 1;
            Ok(Step::Yield(Continuation::value(seen + 1)))
        });
        run(&s, move || Ok(Body::Suspend(counter))).resolve(cb);
        s.run_until_idle();
        assert_eq!(*log.borrow(), vec![Ok(10)]);
    }

    #[test]
    fn nested_runs_compose() {
        let s = TaskScheduler::new();
        let (cb, log) = recorder();
        let inner_s = s.clone();
        let outer = coroutine(move |input: Resume<i32>| match input {
            Resume::Start => Ok(Step::Yield(run(&inner_s, || {
                Ok(Body::Suspend(doubler(Continuation::value(21))))
            }))),
            Resume::Next(v) => Ok(Step::Complete(v)),
            Resume::Throw(e) => Err(e),
        });
        run(&s, move || Ok(Body::Suspend(outer))).resolve(cb);
        s.run_until_idle();
        assert_eq!(*log.borrow(), vec![Ok(42)]);
    }

    #[test]
    fn independent_runs_interleave_per_tick() {
        let s = TaskScheduler::new();
        let trace = Rc::new(RefCell::new(Vec::new()));
        for name in ["a", "b"] {
            let trace = Rc::clone(&trace);
            let mut step = 0;
            let co = coroutine(move |_input: Resume<()>| {
                trace.borrow_mut().push(format!("{name}{step}"));
                step += 1;
                if step == 3 {
                    Ok(Step::Complete(()))
                } else {
                    Ok(Step::Yield(Continuation::value(())))
                }
            });
            run(&s, move || Ok(Body::Suspend(co))).resolve(Delivery::new(|_| {}));
        }
        s.run_until_idle();
        assert_eq!(
            *trace.borrow(),
            vec!["a0", "b0", "a1", "b1", "a2", "b2"]
        );
    }

    #[test]
    fn immediate_sequencer_drives_synchronously() {
        let (cb, log) = recorder();
        run(&Immediate, || Ok(Body::Suspend(doubler(Continuation::value(4))))).resolve(cb);
        assert_eq!(*log.borrow(), vec![Ok(8)]);
    }

    #[test]
    fn immediate_handles_long_ready_chains() {
        const STEPS: u32 = 200_000;
        let mut seen = 0;
        let counter = coroutine(move |input: Resume<()>| {
            if let Resume::Throw(e) = input {
                return Err(e);
            }
            if seen == STEPS {
                return Ok(Step::Complete(seen));
            }
            seen += 1;
            Ok(Step::Yield(Continuation::value(())))
        });
        let (cb, log) = recorder();
        run(&Immediate, move || Ok(Body::Suspend(counter))).resolve(cb);
        assert_eq!(*log.borrow(), vec![Ok(STEPS)]);
    }

    #[test]
    fn boxed_coroutines_are_driven() {
        let s = TaskScheduler::new();
        let (cb, log) = recorder();
        let boxed: Box<dyn Coroutine<Yield = i32, Output = i32>> =
            Box::new(doubler(Continuation::value(7)));
        run(&s, move || Ok(Body::Suspend(boxed))).resolve(cb);
        s.run_until_idle();
        assert_eq!(*log.borrow(), vec![Ok(14)]);
    }
}

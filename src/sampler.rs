use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::{Duration, Instant},
};

use crate::{
    error::EvalError,
    types::{CompiledFunction, Point, Value},
};

/// Evaluates a [`CompiledFunction`] with failure wrapping and an optional time budget.
///
/// The budget is cooperative: a slow evaluation runs to completion and is then rejected with
/// [`EvalError::Timeout`]. The only mutable state is an atomic evaluation counter, so a
/// `Sampler` can be shared between Rayon workers.
pub struct Sampler<'a> {
    function: &'a CompiledFunction,
    timeout: Option<Duration>,
    evaluations: AtomicUsize,
}

impl<'a> Sampler<'a> {
    pub fn new(function: &'a CompiledFunction) -> Self {
        Self {
            function,
            timeout: None,
            evaluations: AtomicUsize::new(0),
        }
    }

    /// Rejects any single evaluation that takes longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Evaluates the function at `point`.
    ///
    /// Non-finite coordinates are rejected without calling the function. Non-finite results
    /// become [`EvalError::NonFinite`].
    pub fn evaluate(&self, point: Point) -> Result<Value, EvalError> {
        if !point.x.is_finite() || !point.y.is_finite() {
            return Err(EvalError::NonFiniteInput {
                x: point.x,
                y: point.y,
            });
        }

        self.evaluations.fetch_add(1, Ordering::Relaxed);

        let started = Instant::now();
        let value = (self.function)(point)?;
        if let Some(budget) = self.timeout {
            let elapsed = started.elapsed();
            if elapsed > budget {
                return Err(EvalError::Timeout {
                    x: point.x,
                    y: point.y,
                    elapsed,
                    budget,
                });
            }
        }

        if !value.is_finite() {
            return Err(EvalError::NonFinite {
                x: point.x,
                y: point.y,
                value,
            });
        }
        Ok(value)
    }

    /// Like [`evaluate`](Sampler::evaluate) but logs and discards the error.
    pub fn evaluate_or_undefined(&self, point: Point) -> Option<Value> {
        match self.evaluate(point) {
            Ok(v) => Some(v),
            Err(err) => {
                tracing::trace!(%err, "undefined sample");
                None
            }
        }
    }

    /// Number of times the function has been called.
    pub fn evaluations(&self) -> usize {
        self.evaluations.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sampler_for(f: &CompiledFunction) -> Sampler<'_> {
        Sampler::new(f)
    }

    #[test]
    fn evaluates_and_counts() {
        let f = |p: Point| -> Result<Value, EvalError> { Ok(p.x + 2. * p.y) };
        let sampler = sampler_for(&f);
        assert_eq!(sampler.evaluate(Point::new(1., 2.)), Ok(5.));
        assert_eq!(sampler.evaluate(Point::new(0., 0.)), Ok(0.));
        assert_eq!(sampler.evaluations(), 2);
    }

    #[test]
    fn function_errors_pass_through() {
        let f = |p: Point| -> Result<Value, EvalError> {
            if p.x == 0. {
                Err(EvalError::function("division by zero"))
            } else {
                Ok(1. / p.x)
            }
        };
        let sampler = sampler_for(&f);
        assert_eq!(
            sampler.evaluate(Point::new(0., 1.)),
            Err(EvalError::Function("division by zero".into()))
        );
        assert_eq!(sampler.evaluate(Point::new(2., 1.)), Ok(0.5));
    }

    #[test]
    fn non_finite_results_are_errors() {
        let f = |p: Point| -> Result<Value, EvalError> { Ok(p.x.ln()) };
        let sampler = sampler_for(&f);
        assert!(matches!(
            sampler.evaluate(Point::new(-1., 0.)),
            Err(EvalError::NonFinite { .. })
        ));
        assert!(matches!(
            sampler.evaluate(Point::new(0., 0.)),
            Err(EvalError::NonFinite { .. })
        ));
    }

    #[test]
    fn non_finite_input_skips_the_function() {
        let f = |_p: Point| -> Result<Value, EvalError> { Ok(1.) };
        let sampler = sampler_for(&f);
        assert!(matches!(
            sampler.evaluate(Point::new(f64::NAN, 0.)),
            Err(EvalError::NonFiniteInput { .. })
        ));
        assert_eq!(sampler.evaluations(), 0);
    }

    #[test]
    fn slow_evaluations_time_out() {
        let f = |_p: Point| -> Result<Value, EvalError> {
            std::thread::sleep(Duration::from_millis(20));
            Ok(1.)
        };
        let sampler = sampler_for(&f).with_timeout(Some(Duration::from_millis(1)));
        assert!(matches!(
            sampler.evaluate(Point::new(0., 0.)),
            Err(EvalError::Timeout { .. })
        ));
        assert_eq!(sampler.evaluate_or_undefined(Point::new(0., 0.)), None);
    }
}

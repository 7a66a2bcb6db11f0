use std::time::Duration;

use derive_more::{Display, From};

use crate::types::Value;

pub type Result<T> = core::result::Result<T, CurveError>;

/// Errors surfaced to the caller of an extraction.
///
/// Everything except [`CurveError::EmptyResult`] and [`CurveError::Eval`] is a configuration
/// error and is reported by [`ImplicitCurve::new`](crate::curve::ImplicitCurve::new) before
/// the function is sampled even once.
#[derive(Debug, Display, From, Clone, PartialEq)]
pub enum CurveError {
    #[display("invalid bounding rectangle: x {x_min}..{x_max}, y {y_min}..{y_max}")]
    InvalidRange {
        x_min: Value,
        x_max: Value,
        y_min: Value,
        y_max: Value,
    },
    #[display("resolution must be at least 1x1, got {nx}x{ny}")]
    InvalidResolution { nx: usize, ny: usize },
    #[display("evaluation timeout must be positive")]
    InvalidTimeout,
    #[display("endpoint tolerance must be positive and finite, got {_0}")]
    InvalidTolerance(Value),
    #[display("iso level must be finite, got {_0}")]
    InvalidLevel(Value),
    #[display("undefined vertex fraction must lie in [0, 1], got {_0}")]
    InvalidUndefinedFraction(Value),
    #[display("unknown tie-break {_0:?}, expected \"positive\" or \"negative\"")]
    InvalidTieBreak(String),
    /// Too many lattice vertices failed to evaluate for the result to mean anything.
    #[display("{undefined} of {total} lattice vertices are undefined")]
    EmptyResult { undefined: usize, total: usize },
    #[from]
    #[display("{_0}")]
    Eval(EvalError),
}

impl std::error::Error for CurveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CurveError::Eval(e) => Some(e),
            _ => None,
        }
    }
}

/// Failure to evaluate the scalar field at one point.
#[derive(Debug, Display, Clone, PartialEq)]
pub enum EvalError {
    /// The function itself reported a failure (division by zero, domain error, ...).
    #[display("function failed: {_0}")]
    Function(String),
    #[display("function returned {value} at ({x}, {y})")]
    NonFinite { x: Value, y: Value, value: Value },
    #[display("non-finite sample point ({x}, {y})")]
    NonFiniteInput { x: Value, y: Value },
    #[display("evaluation at ({x}, {y}) took {elapsed:?}, budget is {budget:?}")]
    Timeout {
        x: Value,
        y: Value,
        elapsed: Duration,
        budget: Duration,
    },
}

impl EvalError {
    /// Convenience constructor for functions that fail with a message.
    pub fn function(message: impl Into<String>) -> Self {
        EvalError::Function(message.into())
    }
}

impl std::error::Error for EvalError {}

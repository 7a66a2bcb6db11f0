use nalgebra::Point2;

use crate::error::EvalError;

/// Scalar field value at a point in the plane.
pub type Value = f64;

/// A 2D point with [`Value`] components.
pub type Point = Point2<Value>;

/// A scalar field function: maps a [`Point`] to a [`Value`], or fails for that point.
///
/// Failures (domain errors, poles, ...) mark the lattice vertex as undefined; they never abort
/// the extraction on their own.
pub type CompiledFunction = dyn Fn(Point) -> Result<Value, EvalError> + Send + Sync;

/// Number of cells along X and Y.
pub type Resolution = (usize, usize);

/// Axis-aligned rectangle the curve is extracted over.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingRect {
    pub x_min: Value,
    pub x_max: Value,
    pub y_min: Value,
    pub y_max: Value,
}

impl BoundingRect {
    /// Builds a rectangle from `(min, max)` ranges. Validation happens in
    /// [`Grid::build`](crate::grid::Grid::build).
    pub fn from_ranges(x_range: (Value, Value), y_range: (Value, Value)) -> Self {
        Self {
            x_min: x_range.0,
            x_max: x_range.1,
            y_min: y_range.0,
            y_max: y_range.1,
        }
    }

    pub fn width(&self) -> Value {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> Value {
        self.y_max - self.y_min
    }

    /// `true` when both ranges are finite and strictly increasing.
    pub fn is_valid(&self) -> bool {
        [self.x_min, self.x_max, self.y_min, self.y_max]
            .iter()
            .all(|v| v.is_finite())
            && self.x_min < self.x_max
            && self.y_min < self.y_max
    }

    /// The four corners, counter-clockwise from `(x_min, y_min)`.
    pub fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.x_min, self.y_min),
            Point::new(self.x_max, self.y_min),
            Point::new(self.x_max, self.y_max),
            Point::new(self.x_min, self.y_max),
        ]
    }
}

/// How a corner whose value equals the iso level exactly is classified.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TieBreak {
    /// `value >= level` counts as positive.
    #[default]
    Positive,
    /// `value > level` counts as positive; the exact level is negative.
    Negative,
}

impl TieBreak {
    /// Returns `true` if `value` lies on the positive side of `level`.
    #[inline]
    pub fn is_positive(self, value: Value, level: Value) -> bool {
        match self {
            TieBreak::Positive => value >= level,
            TieBreak::Negative => value > level,
        }
    }
}

impl std::str::FromStr for TieBreak {
    type Err = crate::error::CurveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "positive" => Ok(TieBreak::Positive),
            "negative" => Ok(TieBreak::Negative),
            _ => Err(crate::error::CurveError::InvalidTieBreak(s.to_string())),
        }
    }
}

/// A straight piece of contour emitted by a single grid cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub start: Point,
    pub end: Point,
    /// Row-major index of the top-level cell that produced the segment.
    pub cell: usize,
    /// Emission order within that cell (saddles and refined cells emit several).
    pub order: usize,
}

impl Segment {
    pub fn new(start: Point, end: Point, cell: usize, order: usize) -> Self {
        Self {
            start,
            end,
            cell,
            order,
        }
    }

    pub fn length(&self) -> Value {
        (self.end - self.start).norm()
    }
}

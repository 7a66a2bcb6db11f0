use crate::types::{Point, Value};

/// Consumer of extracted curves, point by point.
///
/// This is the whole surface a rendering layer needs to implement: each polyline arrives as a
/// new path start followed by straight corner points. Closed polylines repeat their first point
/// before [`close_path`](PathSink::close_path) is called.
pub trait PathSink {
    /// Begins a new sub-path at `point`.
    fn start_new_path(&mut self, point: Point);

    /// Appends straight-line corners to the current sub-path.
    fn add_points_as_corners(&mut self, points: &[Point]);

    /// Marks the current sub-path as closed.
    fn close_path(&mut self) {}
}

/// Collects each path as its own point list.
impl PathSink for Vec<Vec<Point>> {
    fn start_new_path(&mut self, point: Point) {
        self.push(vec![point]);
    }

    fn add_points_as_corners(&mut self, points: &[Point]) {
        if let Some(path) = self.last_mut() {
            path.extend_from_slice(points);
        }
    }
}

/// An ordered sequence of connected points approximating part of a curve.
#[derive(Debug, Clone, PartialEq)]
pub struct Polyline {
    points: Vec<Point>,
    closed: bool,
}

impl Polyline {
    pub fn new(points: Vec<Point>, closed: bool) -> Self {
        Self { points, closed }
    }

    /// Builds a polyline, flagging it closed when it has at least 4 points (a triangle plus the
    /// repeated start) and its ends lie within `epsilon`.
    pub fn from_points(points: Vec<Point>, epsilon: Value) -> Self {
        let closed = points.len() >= 4
            && match (points.first(), points.last()) {
                (Some(a), Some(b)) => (a - b).norm() <= epsilon,
                _ => false,
            };
        Self { points, closed }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn into_points(self) -> Vec<Point> {
        self.points
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<&Point> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&Point> {
        self.points.last()
    }

    /// Total length along the polyline.
    pub fn arc_length(&self) -> Value {
        self.points.windows(2).map(|w| (w[1] - w[0]).norm()).sum()
    }

    /// Feeds this polyline to `sink` as one sub-path.
    pub fn emit_to<S: PathSink + ?Sized>(&self, sink: &mut S) {
        let Some((first, rest)) = self.points.split_first() else {
            return;
        };
        sink.start_new_path(*first);
        sink.add_points_as_corners(rest);
        if self.closed {
            sink.close_path();
        }
    }
}

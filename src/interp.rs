use crate::types::{Point, Value};

// Return the interpolation factor t corresponding to iso_val, or None when the
// edge is flat (v0 == v1) and has no single crossing.
pub fn find_t(v0: Value, v1: Value, iso_val: Value) -> Option<Value> {
    if v0 == v1 {
        return None;
    }
    Some((iso_val - v0) / (v1 - v0))
}

// Linear interpolation
pub fn lerp(a: Value, b: Value, t: Value) -> Value {
    a + (b - a) * t
}

// Linearly interpolate between two points by factor t
pub fn interpolate_points(p0: Point, p1: Point, t: Value) -> Point {
    Point::new(lerp(p0.x, p1.x, t), lerp(p0.y, p1.y, t))
}

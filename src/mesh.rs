use crate::{
    path::{PathSink, Polyline},
    types::Point,
};

/// Line-list vertex data produced from extracted polylines, ready for a GPU mesh.
///
/// Positions lie in the `z = 0` plane. Every pair of consecutive entries in `indices` is one
/// line segment:
///
/// ```text
/// indices = [a0, b0,  a1, b1,  ...]
///            \seg0/   \seg1/
/// ```
///
/// Closed polylines share their start vertex instead of storing it twice.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "plugin", derive(bevy::prelude::Component))]
pub struct LineMesh {
    /// Vertex positions: `[[x, y, 0.0], ...]`
    pub positions: Vec<[f32; 3]>,

    /// Line index pairs into `positions`.
    pub indices: Vec<u32>,

    /// First vertex of the sub-path being written.
    path_start: u32,
}

impl LineMesh {
    /// Creates an empty mesh with no vertices or lines.
    pub fn new_empty() -> Self {
        Self::default()
    }

    /// Builds line-list data for all `polylines`, in order.
    pub fn from_polylines(polylines: &[Polyline]) -> Self {
        let mut mesh = Self::new_empty();
        for polyline in polylines {
            polyline.emit_to(&mut mesh);
        }
        mesh
    }

    /// Number of line segments.
    pub fn line_count(&self) -> usize {
        self.indices.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    fn push_vertex(&mut self, point: Point) -> u32 {
        self.positions.push([point.x as f32, point.y as f32, 0.]);
        (self.positions.len() - 1) as u32
    }
}

impl PathSink for LineMesh {
    fn start_new_path(&mut self, point: Point) {
        self.path_start = self.push_vertex(point);
    }

    fn add_points_as_corners(&mut self, points: &[Point]) {
        for &point in points {
            let prev = (self.positions.len() - 1) as u32;
            let next = self.push_vertex(point);
            self.indices.extend([prev, next]);
        }
    }

    /// Folds the repeated start vertex of a closed path back onto the original.
    fn close_path(&mut self) {
        let last = (self.positions.len() - 1) as u32;
        let start = self.path_start;
        if last == start || self.positions[last as usize] != self.positions[start as usize] {
            return;
        }
        if let Some(end) = self.indices.last_mut() {
            if *end == last {
                *end = start;
                self.positions.pop();
            }
        }
    }
}

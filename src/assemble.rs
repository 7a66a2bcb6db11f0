use std::collections::{HashMap, VecDeque};

use crate::{
    path::Polyline,
    types::{Point, Segment, Value},
};

/// Which end of a segment an index entry refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum End {
    Start,
    End,
}

/// Smallest hash cell relative to the largest coordinate magnitude. Keeps keys well inside
/// `i64` for tiny tolerances or far-from-origin rectangles.
const MIN_CELL_RATIO: Value = 1e-15;

/// Spatial hash of segment endpoints with cells of at least `epsilon`.
///
/// A query scans the 3×3 neighbourhood of its key, so two endpoints within `epsilon` always
/// find each other even when they round to different keys.
struct EndpointIndex<'a> {
    segments: &'a [Segment],
    epsilon: Value,
    cell: Value,
    buckets: HashMap<(i64, i64), Vec<(usize, End)>>,
}

impl<'a> EndpointIndex<'a> {
    fn new(segments: &'a [Segment], epsilon: Value) -> Self {
        let magnitude = segments
            .iter()
            .flat_map(|s| [s.start, s.end])
            .fold(0.0, |m: Value, p| m.max(p.x.abs()).max(p.y.abs()));
        let mut index = Self {
            segments,
            epsilon,
            cell: epsilon.max(magnitude * MIN_CELL_RATIO),
            buckets: HashMap::with_capacity(segments.len() * 2),
        };
        for (id, segment) in segments.iter().enumerate() {
            let start_key = index.key(segment.start);
            index.buckets.entry(start_key).or_default().push((id, End::Start));
            let end_key = index.key(segment.end);
            index.buckets.entry(end_key).or_default().push((id, End::End));
        }
        index
    }

    fn key(&self, p: Point) -> (i64, i64) {
        (
            (p.x / self.cell).round() as i64,
            (p.y / self.cell).round() as i64,
        )
    }

    fn endpoint(&self, id: usize, end: End) -> Point {
        match end {
            End::Start => self.segments[id].start,
            End::End => self.segments[id].end,
        }
    }

    /// The lowest-ordered unused segment with an endpoint within `epsilon` of `p`, and the
    /// position of the endpoint *opposite* the match.
    fn next_unused(&self, p: Point, used: &[bool]) -> Option<(usize, Point)> {
        let (kx, ky) = self.key(p);
        let mut best: Option<(usize, End)> = None;

        for dx in -1..=1 {
            for dy in -1..=1 {
                let key = (kx.saturating_add(dx), ky.saturating_add(dy));
                let Some(bucket) = self.buckets.get(&key) else {
                    continue;
                };
                for &(id, end) in bucket {
                    if used[id] || (self.endpoint(id, end) - p).norm() > self.epsilon {
                        continue;
                    }
                    if best.is_none_or(|(best_id, _)| id < best_id) {
                        best = Some((id, end));
                    }
                }
            }
        }

        best.map(|(id, end)| {
            let far = match end {
                End::Start => End::End,
                End::End => End::Start,
            };
            (id, self.endpoint(id, far))
        })
    }
}

/// Stitches an unordered bag of segments into maximal polylines.
///
/// Segments are first ordered by `(cell, order)`. Each polyline is seeded by the first unused
/// segment in that order, extended forward from its end, and, unless the walk came back to its
/// start (closed), backward from its start. Polylines therefore come out in ascending order of
/// their lowest cell index, independent of hash iteration order.
pub fn assemble(mut segments: Vec<Segment>, epsilon: Value) -> Vec<Polyline> {
    segments.sort_by_key(|s| (s.cell, s.order));

    let index = EndpointIndex::new(&segments, epsilon);
    let mut used = vec![false; segments.len()];
    let mut polylines = Vec::new();

    for seed in 0..segments.len() {
        if used[seed] {
            continue;
        }
        used[seed] = true;

        let head = segments[seed].start;
        let mut points: VecDeque<Point> = VecDeque::from([head, segments[seed].end]);
        let mut closed = false;

        let mut tail = segments[seed].end;
        while let Some((id, next)) = index.next_unused(tail, &used) {
            used[id] = true;
            if (next - head).norm() <= epsilon {
                points.push_back(head);
                closed = true;
                break;
            }
            points.push_back(next);
            tail = next;
        }

        if !closed {
            let mut front = head;
            while let Some((id, next)) = index.next_unused(front, &used) {
                used[id] = true;
                points.push_front(next);
                front = next;
            }
        }

        polylines.push(Polyline::new(points.into(), closed));
    }

    tracing::trace!(
        segments = segments.len(),
        polylines = polylines.len(),
        "assembled polylines"
    );
    polylines
}

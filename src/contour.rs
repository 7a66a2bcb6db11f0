use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::{
    grid::SampledGrid,
    interp::interpolate_points,
    sampler::Sampler,
    tables::EDGE_TABLE,
    types::{Point, Segment, TieBreak, Value},
    utils::{cell_center, get_edge_crossings, get_state, is_saddle, segment_edges_from_state},
};

/// Per-cell contouring parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarchSettings {
    /// Iso level; the curve is `f(x, y) = level`.
    pub level: Value,
    pub tie_break: TieBreak,
    /// Split saddle cells 2×2 instead of resolving them directly.
    pub adaptive: bool,
    /// Maximum number of times a cell may be split.
    pub max_depth: u32,
    /// Segments shorter than this are dropped.
    pub epsilon: Value,
}

impl Default for MarchSettings {
    fn default() -> Self {
        Self {
            level: 0.,
            tie_break: TieBreak::Positive,
            adaptive: false,
            max_depth: 0,
            epsilon: 1e-9,
        }
    }
}

/// Segments produced by [`march`], plus counters for diagnostics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarchOutput {
    /// Segments in row-major cell order.
    pub segments: Vec<Segment>,
    /// Cells (or sub-cells) dropped because a corner or centre sample was undefined.
    pub skipped_cells: usize,
    /// Number of 2×2 splits performed by adaptive refinement.
    pub refined_cells: usize,
}

impl MarchOutput {
    fn append(&mut self, mut other: MarchOutput) {
        self.segments.append(&mut other.segments);
        self.skipped_cells += other.skipped_cells;
        self.refined_cells += other.refined_cells;
    }
}

/// Runs Marching Squares over every cell of `sampled`.
///
/// Work is parallelised over rows using Rayon when `parallel` is set. Rows are concatenated in
/// order, so the output is identical either way.
///
/// ```text
/// Per cell:
/// 1. cell_values            →  4 scalar values (or skip if any is undefined)
/// 2. get_state              →  16-entry lookup key
/// 3. EDGE_TABLE[state]      →  bitmask of crossed edges
/// 4. saddle?                →  sample the centre, or split the cell when adaptive
/// 5. get_edge_crossings     →  up to 4 interpolated points
/// 6. segment_edges_from_state → 1 or 2 segments
/// ```
pub fn march(
    sampled: &SampledGrid,
    sampler: &Sampler<'_>,
    settings: &MarchSettings,
    parallel: bool,
) -> MarchOutput {
    let grid = &sampled.grid;

    let march_row = |j: usize| -> MarchOutput {
        let mut marcher = CellMarcher {
            sampler,
            settings,
            output: MarchOutput::default(),
            order: 0,
        };

        for i in 0..grid.nx {
            let cell = grid.cell_index(i, j);
            marcher.order = 0;

            let Some(values) = sampled.cell_values(i, j) else {
                marcher.output.skipped_cells += 1;
                continue;
            };
            marcher.march_cell(cell, grid.cell_corners(i, j), values, 0);
        }
        marcher.output
    };

    let rows: Vec<MarchOutput> = if parallel {
        (0..grid.ny).into_par_iter().map(march_row).collect()
    } else {
        (0..grid.ny).map(march_row).collect()
    };

    let mut output = MarchOutput::default();
    for row in rows {
        output.append(row);
    }

    tracing::trace!(
        segments = output.segments.len(),
        skipped = output.skipped_cells,
        refined = output.refined_cells,
        "marched grid"
    );
    output
}

/// Contours cells one at a time, accumulating segments in emission order.
struct CellMarcher<'s, 'f> {
    sampler: &'s Sampler<'f>,
    settings: &'s MarchSettings,
    output: MarchOutput,
    /// Emission counter within the current top-level cell.
    order: usize,
}

impl CellMarcher<'_, '_> {
    fn march_cell(&mut self, cell: usize, corners: [Point; 4], values: [Value; 4], depth: u32) {
        let MarchSettings {
            level,
            tie_break,
            adaptive,
            max_depth,
            ..
        } = *self.settings;

        let state = get_state(&values, level, tie_break);
        let edges_mask = EDGE_TABLE[state];
        if edges_mask == 0 {
            return;
        }

        let center_positive = if is_saddle(state) {
            let Some(center_value) = self.sampler.evaluate_or_undefined(cell_center(&corners))
            else {
                self.output.skipped_cells += 1;
                return;
            };

            if adaptive && depth < max_depth {
                self.refine(cell, corners, values, center_value, depth);
                return;
            }
            Some(tie_break.is_positive(center_value, level))
        } else {
            None
        };

        let crossings = get_edge_crossings(edges_mask, &corners, &values, level);
        for [a, b] in segment_edges_from_state(state, center_positive) {
            let (Some(start), Some(end)) = (crossings[a], crossings[b]) else {
                continue;
            };
            self.emit(Segment::new(start, end, cell, self.order));
        }
    }

    /// Splits a cell into 2×2 sub-cells and contours each.
    ///
    /// Only the centre comes from the function. Edge midpoints take the linear interpolation of
    /// their end values, so a crossing on the cell boundary lands where an unsplit neighbour
    /// puts it and the curve stays connected across refinement levels.
    ///
    /// ```text
    ///   3----m32---2
    ///   | NW  | NE |
    ///  m03----c---m12
    ///   | SW  | SE |
    ///   0----m01---1
    /// ```
    fn refine(
        &mut self,
        cell: usize,
        corners: [Point; 4],
        values: [Value; 4],
        center_value: Value,
        depth: u32,
    ) {
        self.output.refined_cells += 1;

        let midpoint = |a: usize, b: usize| {
            (
                interpolate_points(corners[a], corners[b], 0.5),
                (values[a] + values[b]) / 2.,
            )
        };
        let (p01, v01) = midpoint(0, 1);
        let (p12, v12) = midpoint(1, 2);
        let (p32, v32) = midpoint(3, 2);
        let (p03, v03) = midpoint(0, 3);
        let c = cell_center(&corners);

        let children = [
            ([corners[0], p01, c, p03], [values[0], v01, center_value, v03]),
            ([p01, corners[1], p12, c], [v01, values[1], v12, center_value]),
            ([p03, c, p32, corners[3]], [v03, center_value, v32, values[3]]),
            ([c, p12, corners[2], p32], [center_value, v12, values[2], v32]),
        ];
        for (child_corners, child_values) in children {
            self.march_cell(cell, child_corners, child_values, depth + 1);
        }
    }

    fn emit(&mut self, segment: Segment) {
        if segment.length() <= self.settings.epsilon {
            return;
        }
        self.output.segments.push(segment);
        self.order += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::EvalError,
        grid::Grid,
        types::{BoundingRect, CompiledFunction},
    };
    use approx::assert_relative_eq;

    fn unit_cell() -> Grid {
        Grid::build(BoundingRect::from_ranges((0., 1.), (0., 1.)), (1, 1)).unwrap()
    }

    /// A single cell with the given corner values and a constant function for centre samples.
    fn march_single(values: [Value; 4], center: Value, settings: MarchSettings) -> MarchOutput {
        let grid = unit_cell();
        let f = move |_p: Point| -> Result<Value, EvalError> { Ok(center) };
        let f: &CompiledFunction = &f;
        let sampler = Sampler::new(f);
        let sampled = SampledGrid::from_rows(
            grid,
            vec![
                vec![Some(values[0]), Some(values[1])],
                vec![Some(values[3]), Some(values[2])],
            ],
        );
        march(&sampled, &sampler, &settings, false)
    }

    #[test]
    fn uniform_cells_emit_nothing() {
        for values in [[1., 2., 3., 4.], [-1., -2., -3., -4.], [0., 0., 0., 0.]] {
            let out = march_single(values, 0., MarchSettings::default());
            assert!(out.segments.is_empty(), "{values:?}");
        }
    }

    #[test]
    fn zero_corners_count_as_positive() {
        // Positive tie-break: all four corners are "positive", nothing crosses.
        let out = march_single([0., 0., 1., 1.], 0., MarchSettings::default());
        assert!(out.segments.is_empty());

        // Negative tie-break: the bottom edge is negative, the top positive.
        let settings = MarchSettings {
            tie_break: TieBreak::Negative,
            ..Default::default()
        };
        let out = march_single([0., 0., 1., 1.], 0., settings);
        assert_eq!(out.segments.len(), 1);
        let s = out.segments[0];
        assert_relative_eq!(s.start.y, 0.);
        assert_relative_eq!(s.end.y, 0.);
    }

    #[test]
    fn single_crossing_is_interpolated() {
        // f = x - 0.25 on the unit cell
        let out = march_single([-0.25, 0.75, 0.75, -0.25], 0., MarchSettings::default());
        assert_eq!(out.segments.len(), 1);
        let s = out.segments[0];
        assert_relative_eq!(s.start.x, 0.25);
        assert_relative_eq!(s.end.x, 0.25);
        assert_relative_eq!((s.start.y - s.end.y).abs(), 1.);
    }

    #[test]
    fn checkerboard_follows_center_sign() {
        // + - + - : corners 0 and 2 positive
        let values = [1., -1., 1., -1.];

        // Positive centre joins corners 0 and 2: segments isolate corners 1 and 3.
        let out = march_single(values, 0.5, MarchSettings::default());
        assert_eq!(out.segments.len(), 2);
        let near = |s: &Segment, corner: Point| {
            (s.start - corner).norm() < 0.75 && (s.end - corner).norm() < 0.75
        };
        assert!(near(&out.segments[0], Point::new(1., 0.)));
        assert!(near(&out.segments[1], Point::new(0., 1.)));

        // Negative centre joins corners 1 and 3: segments isolate corners 0 and 2.
        let out = march_single(values, -0.5, MarchSettings::default());
        assert_eq!(out.segments.len(), 2);
        assert!(near(&out.segments[0], Point::new(0., 0.)));
        assert!(near(&out.segments[1], Point::new(1., 1.)));
    }

    #[test]
    fn undefined_corner_skips_cell() {
        let grid = Grid::build(BoundingRect::from_ranges((0., 2.), (0., 1.)), (2, 1)).unwrap();
        let f = |_p: Point| -> Result<Value, EvalError> { Ok(0.) };
        let f: &CompiledFunction = &f;
        let sampler = Sampler::new(f);
        // f = x - 0.5 everywhere, except the top-right vertex is undefined
        let sampled = SampledGrid::from_rows(
            grid,
            vec![
                vec![Some(-0.5), Some(0.5), Some(1.5)],
                vec![Some(-0.5), Some(0.5), None],
            ],
        );
        let out = march(&sampled, &sampler, &MarchSettings::default(), false);
        assert_eq!(out.skipped_cells, 1);
        assert_eq!(out.segments.len(), 1);
        assert_eq!(out.segments[0].cell, 0);
    }

    #[test]
    fn undefined_center_skips_saddle() {
        let grid = unit_cell();
        let f = |_p: Point| -> Result<Value, EvalError> { Err(EvalError::function("nope")) };
        let f: &CompiledFunction = &f;
        let sampler = Sampler::new(f);
        let sampled = SampledGrid::from_rows(
            grid,
            vec![vec![Some(1.), Some(-1.)], vec![Some(-1.), Some(1.)]],
        );
        let out = march(&sampled, &sampler, &MarchSettings::default(), false);
        assert!(out.segments.is_empty());
        assert_eq!(out.skipped_cells, 1);
    }

    #[test]
    fn adaptive_refinement_splits_saddles() {
        let settings = MarchSettings {
            adaptive: true,
            max_depth: 1,
            ..Default::default()
        };
        let out = march_single([1., -1., 1., -1.], 0.5, settings);
        assert_eq!(out.refined_cells, 1);
        // every emitted point stays inside the cell
        for s in &out.segments {
            for p in [s.start, s.end] {
                assert!((0.0..=1.0).contains(&p.x) && (0.0..=1.0).contains(&p.y));
            }
        }
        assert!(!out.segments.is_empty());
        assert!(out.segments.iter().all(|s| s.cell == 0));
        let orders: Vec<usize> = out.segments.iter().map(|s| s.order).collect();
        assert_eq!(orders, (0..out.segments.len()).collect::<Vec<_>>());
    }

    #[test]
    fn depth_cap_bounds_refinement() {
        let settings = MarchSettings {
            adaptive: true,
            max_depth: 3,
            ..Default::default()
        };
        let out = march_single([1., -1., 1., -1.], 0., settings);
        assert!(out.refined_cells >= 1);
        assert!(out.refined_cells <= 1 + 4 + 16);
        assert_eq!(out.skipped_cells, 0);
    }
}

use ndarray::Array2;
use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::{
    error::{CurveError, Result},
    sampler::Sampler,
    types::{BoundingRect, Point, Resolution, Value},
};

/// A uniform lattice of vertices over a [`BoundingRect`].
///
/// The lattice has `(nx + 1) × (ny + 1)` vertices and `nx × ny` cells. Vertex `(i, j)` sits at
/// `(x_min + i·dx, y_min + j·dy)`; the last vertex on each axis is pinned to the rectangle's
/// max so rounding never shrinks the covered area.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    pub rect: BoundingRect,
    /// Number of cells along X.
    pub nx: usize,
    /// Number of cells along Y.
    pub ny: usize,
    /// Cell width.
    pub dx: Value,
    /// Cell height.
    pub dy: Value,
}

impl Grid {
    /// Builds a lattice with `resolution` cells over `rect`.
    ///
    /// Fails with [`CurveError::InvalidRange`] or [`CurveError::InvalidResolution`].
    pub fn build(rect: BoundingRect, resolution: Resolution) -> Result<Self> {
        if !rect.is_valid() {
            return Err(CurveError::InvalidRange {
                x_min: rect.x_min,
                x_max: rect.x_max,
                y_min: rect.y_min,
                y_max: rect.y_max,
            });
        }
        let (nx, ny) = resolution;
        if nx == 0 || ny == 0 {
            return Err(CurveError::InvalidResolution { nx, ny });
        }

        Ok(Self {
            rect,
            nx,
            ny,
            dx: rect.width() / nx as Value,
            dy: rect.height() / ny as Value,
        })
    }

    /// Plane coordinate of vertex `(i, j)`.
    #[inline]
    pub fn vertex(&self, i: usize, j: usize) -> Point {
        let x = if i == self.nx {
            self.rect.x_max
        } else {
            self.rect.x_min + i as Value * self.dx
        };
        let y = if j == self.ny {
            self.rect.y_max
        } else {
            self.rect.y_min + j as Value * self.dy
        };
        Point::new(x, y)
    }

    /// Returns the 4 corner indices `[i, j]` of the cell at `(i, j)`.
    ///
    /// Corners are ordered counter-clockwise:
    ///
    /// ```text
    ///   3----2        Y
    ///   |    |        |
    ///   |    |        *-- X
    ///   0----1
    ///
    ///  0 = (i,   j  )    2 = (i+1, j+1)
    ///  1 = (i+1, j  )    3 = (i,   j+1)
    /// ```
    #[inline]
    pub fn cell_corner_indices(&self, i: usize, j: usize) -> [[usize; 2]; 4] {
        [[i, j], [i + 1, j], [i + 1, j + 1], [i, j + 1]]
    }

    /// Plane coordinates of the 4 corners of cell `(i, j)`, in
    /// [`cell_corner_indices`](Grid::cell_corner_indices) order.
    #[inline]
    pub fn cell_corners(&self, i: usize, j: usize) -> [Point; 4] {
        self.cell_corner_indices(i, j).map(|[ci, cj]| self.vertex(ci, cj))
    }

    /// Row-major index of cell `(i, j)`.
    #[inline]
    pub fn cell_index(&self, i: usize, j: usize) -> usize {
        j * self.nx + i
    }

    pub fn cell_count(&self) -> usize {
        self.nx * self.ny
    }

    pub fn vertex_count(&self) -> usize {
        (self.nx + 1) * (self.ny + 1)
    }
}

/// A [`Grid`] with the scalar field sampled once at every vertex.
///
/// Values are indexed `[[j, i]]` (row = Y). `None` marks a vertex whose evaluation failed; any
/// cell touching it is skipped during contouring. Immutable once built, so Rayon workers read it
/// without locking.
#[derive(Debug, Clone)]
pub struct SampledGrid {
    pub grid: Grid,
    pub values: Array2<Option<Value>>,
    undefined: usize,
}

impl SampledGrid {
    /// Evaluates `sampler` at every vertex of `grid`, one row per Rayon task when `parallel`.
    pub fn sample(grid: Grid, sampler: &Sampler<'_>, parallel: bool) -> Self {
        let sample_row = |j: usize| -> Vec<Option<Value>> {
            (0..=grid.nx)
                .map(|i| sampler.evaluate_or_undefined(grid.vertex(i, j)))
                .collect()
        };

        let rows: Vec<Vec<Option<Value>>> = if parallel {
            (0..=grid.ny).into_par_iter().map(sample_row).collect()
        } else {
            (0..=grid.ny).map(sample_row).collect()
        };

        Self::from_rows(grid, rows)
    }

    /// Builds a sampled grid from precomputed rows (`rows[j][i]`).
    ///
    /// # Panics
    /// Panics if the rows don't match the lattice dimensions `(ny + 1) × (nx + 1)`.
    pub fn from_rows(grid: Grid, rows: Vec<Vec<Option<Value>>>) -> Self {
        let shape = (grid.ny + 1, grid.nx + 1);
        assert_eq!(rows.len(), shape.0, "row count must be ny + 1");
        let flat: Vec<Option<Value>> = rows.into_iter().flatten().collect();
        let values = Array2::from_shape_vec(shape, flat).expect("row length must be nx + 1");
        let undefined = values.iter().filter(|v| v.is_none()).count();
        Self {
            grid,
            values,
            undefined,
        }
    }

    /// Returns the sampled value at vertex `(i, j)`, `None` if undefined.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> Option<Value> {
        self.values[[j, i]]
    }

    /// Corner values of cell `(i, j)`, or `None` if any corner is undefined.
    #[inline]
    pub fn cell_values(&self, i: usize, j: usize) -> Option<[Value; 4]> {
        let [a, b, c, d] = self
            .grid
            .cell_corner_indices(i, j)
            .map(|[ci, cj]| self.get(ci, cj));
        Some([a?, b?, c?, d?])
    }

    pub fn undefined_count(&self) -> usize {
        self.undefined
    }

    pub fn undefined_fraction(&self) -> Value {
        self.undefined as Value / self.grid.vertex_count() as Value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::EvalError, types::CompiledFunction};
    use approx::assert_relative_eq;

    fn unit_grid(nx: usize, ny: usize) -> Grid {
        Grid::build(BoundingRect::from_ranges((-1., 1.), (0., 4.)), (nx, ny)).unwrap()
    }

    #[test]
    fn rejects_invalid_input() {
        let bad = BoundingRect::from_ranges((1., -1.), (0., 1.));
        assert!(matches!(
            Grid::build(bad, (4, 4)),
            Err(CurveError::InvalidRange { .. })
        ));
        let rect = BoundingRect::from_ranges((-1., 1.), (0., 1.));
        assert_eq!(
            Grid::build(rect, (0, 3)),
            Err(CurveError::InvalidResolution { nx: 0, ny: 3 })
        );
    }

    #[test]
    fn vertices_are_evenly_spaced() {
        let grid = unit_grid(4, 2);
        assert_relative_eq!(grid.dx, 0.5);
        assert_relative_eq!(grid.dy, 2.0);
        assert_eq!(grid.vertex(0, 0), Point::new(-1., 0.));
        assert_eq!(grid.vertex(1, 1), Point::new(-0.5, 2.));
        assert_eq!(grid.vertex(4, 2), Point::new(1., 4.));
        assert_eq!(grid.vertex_count(), 15);
        assert_eq!(grid.cell_count(), 8);
        assert_eq!(grid.cell_index(3, 1), 7);
    }

    #[test]
    fn last_vertex_is_pinned_to_max() {
        let rect = BoundingRect::from_ranges((0.1, 0.7), (0.1, 0.7));
        let grid = Grid::build(rect, (3, 7)).unwrap();
        assert_eq!(grid.vertex(3, 7), Point::new(0.7, 0.7));
    }

    #[test]
    fn samples_every_vertex_once() {
        let f = |p: Point| -> core::result::Result<Value, EvalError> { Ok(p.x + p.y) };
        let f: &CompiledFunction = &f;
        let sampler = Sampler::new(f);
        let sampled = SampledGrid::sample(unit_grid(4, 2), &sampler, true);
        assert_eq!(sampler.evaluations(), 15);
        assert_eq!(sampled.values.dim(), (3, 5));
        assert_relative_eq!(sampled.get(4, 2).unwrap(), 5.);
        assert_eq!(sampled.cell_values(0, 0), Some([-1., -0.5, 1.5, 1.]));
        assert_eq!(sampled.undefined_count(), 0);
    }

    #[test]
    fn failed_vertices_are_undefined() {
        let f = |p: Point| -> core::result::Result<Value, EvalError> {
            if p.x == 0. && p.y == 2. {
                Err(EvalError::function("pole"))
            } else {
                Ok(1.)
            }
        };
        let f: &CompiledFunction = &f;
        let sampler = Sampler::new(f);
        let sampled = SampledGrid::sample(unit_grid(4, 2), &sampler, false);
        assert_eq!(sampled.get(2, 1), None);
        assert_eq!(sampled.undefined_count(), 1);
        assert_relative_eq!(sampled.undefined_fraction(), 1. / 15.);
        // the four cells around the pole have no complete corner set
        assert_eq!(sampled.cell_values(1, 0), None);
        assert_eq!(sampled.cell_values(2, 1), None);
        assert!(sampled.cell_values(0, 0).is_some());
    }
}

use std::{sync::Arc, time::Duration};

use crate::{
    assemble::assemble,
    contour::{MarchSettings, march},
    error::{CurveError, EvalError, Result},
    grid::{Grid, SampledGrid},
    mesh::LineMesh,
    path::{PathSink, Polyline},
    sampler::Sampler,
    types::{BoundingRect, CompiledFunction, Point, Resolution, TieBreak, Value},
};

/// Extraction options.
///
/// ```rust
/// use bevy_implicit_curve::curve::CurveConfig;
///
/// let config = CurveConfig::default()
///     .with_resolution(128, 96)
///     .with_adaptive(3)
///     .with_eval_timeout_ms(50);
/// assert_eq!(config.resolution, (128, 96));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CurveConfig {
    /// Cells along X and Y. Default: `(64, 64)`.
    pub resolution: Resolution,
    /// Split saddle cells instead of resolving them from a single centre sample. Default: `false`.
    pub adaptive: bool,
    /// Maximum number of splits per cell when `adaptive` is set. Default: `0`.
    pub max_depth: u32,
    /// Budget for a single function evaluation; slower samples count as undefined.
    /// Default: `100 ms`.
    pub eval_timeout: Option<Duration>,
    /// Classification of samples exactly on the level. Default: [`TieBreak::Positive`].
    pub tie_break: TieBreak,
    /// Iso level; the curve is `f(x, y) = level`. Default: `0.0`.
    pub level: Value,
    /// Endpoints closer than this are the same point when stitching. Default: `1e-9`.
    pub epsilon: Value,
    /// Extraction fails with [`CurveError::EmptyResult`] when a larger fraction of lattice
    /// vertices is undefined. Default: `0.5`.
    pub max_undefined_fraction: Value,
    /// Sample and march rows on the Rayon thread pool. Default: `true`.
    pub parallel: bool,
}

impl Default for CurveConfig {
    fn default() -> Self {
        Self {
            resolution: (64, 64),
            adaptive: false,
            max_depth: 0,
            eval_timeout: Some(Duration::from_millis(100)),
            tie_break: TieBreak::Positive,
            level: 0.,
            epsilon: 1e-9,
            max_undefined_fraction: 0.5,
            parallel: true,
        }
    }
}

impl CurveConfig {
    pub fn with_resolution(mut self, nx: usize, ny: usize) -> Self {
        self.resolution = (nx, ny);
        self
    }

    /// Enables adaptive refinement of saddle cells, up to `max_depth` splits.
    pub fn with_adaptive(mut self, max_depth: u32) -> Self {
        self.adaptive = true;
        self.max_depth = max_depth;
        self
    }

    pub fn with_eval_timeout_ms(mut self, millis: u64) -> Self {
        self.eval_timeout = Some(Duration::from_millis(millis));
        self
    }

    /// Lets every evaluation run as long as it needs.
    pub fn without_eval_timeout(mut self) -> Self {
        self.eval_timeout = None;
        self
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    pub fn with_level(mut self, level: Value) -> Self {
        self.level = level;
        self
    }

    pub fn with_epsilon(mut self, epsilon: Value) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn with_max_undefined_fraction(mut self, fraction: Value) -> Self {
        self.max_undefined_fraction = fraction;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Checks every option that doesn't depend on the bounding rectangle.
    pub fn validate(&self) -> Result<()> {
        let (nx, ny) = self.resolution;
        if nx == 0 || ny == 0 {
            return Err(CurveError::InvalidResolution { nx, ny });
        }
        if self.eval_timeout.is_some_and(|t| t.is_zero()) {
            return Err(CurveError::InvalidTimeout);
        }
        if !(self.epsilon.is_finite() && self.epsilon > 0.) {
            return Err(CurveError::InvalidTolerance(self.epsilon));
        }
        if !self.level.is_finite() {
            return Err(CurveError::InvalidLevel(self.level));
        }
        if !(0.0..=1.0).contains(&self.max_undefined_fraction) {
            return Err(CurveError::InvalidUndefinedFraction(
                self.max_undefined_fraction,
            ));
        }
        Ok(())
    }

    fn march_settings(&self) -> MarchSettings {
        MarchSettings {
            level: self.level,
            tie_break: self.tie_break,
            adaptive: self.adaptive,
            max_depth: self.max_depth,
            epsilon: self.epsilon,
        }
    }
}

/// Counters collected during one extraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Diagnostics {
    /// Calls made to the function, lattice and centre samples together.
    pub evaluations: usize,
    /// Lattice vertices whose evaluation failed.
    pub undefined_vertices: usize,
    /// Cells skipped because of undefined samples.
    pub skipped_cells: usize,
    /// 2×2 splits made by adaptive refinement.
    pub refined_cells: usize,
    /// Segments emitted before stitching.
    pub segments: usize,
}

/// Result of [`ImplicitCurve::extract`].
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub polylines: Vec<Polyline>,
    pub diagnostics: Diagnostics,
}

/// The curve `f(x, y) = level` over a bounding rectangle.
///
/// Construction validates the rectangle and configuration; nothing is sampled until
/// [`extract`](ImplicitCurve::extract) (or one of the output helpers) is called. Each extraction
/// builds its own grid and discards it afterwards, so an `ImplicitCurve` can be shared across
/// threads and extracted any number of times with identical results.
///
/// ```rust
/// use bevy_implicit_curve::{curve::{CurveConfig, ImplicitCurve}, types::Point};
///
/// let circle = ImplicitCurve::new(
///     |p: Point| p.x * p.x + p.y * p.y - 1.0,
///     (-2.0, 2.0),
///     (-2.0, 2.0),
///     CurveConfig::default(),
/// )
/// .unwrap();
/// let polylines = circle.polylines().unwrap();
/// assert_eq!(polylines.len(), 1);
/// assert!(polylines[0].is_closed());
/// ```
#[derive(Clone)]
pub struct ImplicitCurve {
    function: Arc<CompiledFunction>,
    rect: BoundingRect,
    config: CurveConfig,
}

impl std::fmt::Debug for ImplicitCurve {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImplicitCurve")
            .field("rect", &self.rect)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ImplicitCurve {
    /// Creates a curve for an infallible function. Non-finite return values are treated as
    /// evaluation failures at that point.
    pub fn new<F>(
        function: F,
        x_range: (Value, Value),
        y_range: (Value, Value),
        config: CurveConfig,
    ) -> Result<Self>
    where
        F: Fn(Point) -> Value + Send + Sync + 'static,
    {
        Self::fallible(move |p| Ok(function(p)), x_range, y_range, config)
    }

    /// Creates a curve for a function that can fail at some points (poles, domain errors).
    pub fn fallible<F>(
        function: F,
        x_range: (Value, Value),
        y_range: (Value, Value),
        config: CurveConfig,
    ) -> Result<Self>
    where
        F: Fn(Point) -> core::result::Result<Value, EvalError> + Send + Sync + 'static,
    {
        let rect = BoundingRect::from_ranges(x_range, y_range);
        config.validate()?;
        Grid::build(rect, config.resolution)?;

        Ok(Self {
            function: Arc::new(function),
            rect,
            config,
        })
    }

    pub fn rect(&self) -> BoundingRect {
        self.rect
    }

    pub fn config(&self) -> &CurveConfig {
        &self.config
    }

    /// Evaluates the function at a single point, with the same checks used during extraction.
    pub fn evaluate(&self, point: Point) -> Result<Value> {
        let sampler = Sampler::new(self.function.as_ref()).with_timeout(self.config.eval_timeout);
        Ok(sampler.evaluate(point)?)
    }

    /// Runs the full pipeline: grid, sampling, Marching Squares and stitching.
    ///
    /// An empty polyline list is a valid result (no sign change anywhere). Fails only with
    /// [`CurveError::EmptyResult`] when too much of the lattice is undefined.
    pub fn extract(&self) -> Result<Extraction> {
        let _span = tracing::debug_span!("extract", rect = ?self.rect).entered();

        let grid = Grid::build(self.rect, self.config.resolution)?;
        let sampler = Sampler::new(self.function.as_ref()).with_timeout(self.config.eval_timeout);
        let sampled = SampledGrid::sample(grid, &sampler, self.config.parallel);

        let undefined = sampled.undefined_count();
        if sampled.undefined_fraction() > self.config.max_undefined_fraction {
            tracing::debug!(undefined, "too many undefined vertices");
            return Err(CurveError::EmptyResult {
                undefined,
                total: sampled.grid.vertex_count(),
            });
        }

        let marched = march(
            &sampled,
            &sampler,
            &self.config.march_settings(),
            self.config.parallel,
        );
        let diagnostics = Diagnostics {
            evaluations: sampler.evaluations(),
            undefined_vertices: undefined,
            skipped_cells: marched.skipped_cells,
            refined_cells: marched.refined_cells,
            segments: marched.segments.len(),
        };

        let polylines = assemble(marched.segments, self.config.epsilon);

        tracing::debug!(
            polylines = polylines.len(),
            closed = polylines.iter().filter(|p| p.is_closed()).count(),
            ?diagnostics,
            "extracted implicit curve"
        );
        Ok(Extraction {
            polylines,
            diagnostics,
        })
    }

    /// The extracted polylines, in deterministic order.
    pub fn polylines(&self) -> Result<Vec<Polyline>> {
        Ok(self.extract()?.polylines)
    }

    /// Extracts the curve and feeds every polyline to `sink`.
    pub fn generate_points<S: PathSink + ?Sized>(&self, sink: &mut S) -> Result<()> {
        for polyline in self.polylines()? {
            polyline.emit_to(sink);
        }
        Ok(())
    }

    /// Extracts the curve as line-list mesh data.
    pub fn line_mesh(&self) -> Result<LineMesh> {
        Ok(LineMesh::from_polylines(&self.polylines()?))
    }
}

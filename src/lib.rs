pub mod assemble;
pub mod contour;
pub mod curve;
pub mod error;
pub mod grid;
pub mod interp;
pub mod mesh;
pub mod path;
#[cfg(feature = "plugin")]
pub mod plugin;
pub mod sampler;
pub mod tables;
pub mod types;
pub mod utils;

pub use curve::{CurveConfig, ImplicitCurve};
#[cfg(feature = "plugin")]
pub use plugin::ImplicitCurvePlugin;

//! Geometry primitives.
//!
//! Integer rectangles and the power-of-two arithmetic that relates the
//! reference grid of a codestream to each of its resolution levels:
//!
//! - [`Rect`], [`Point`], [`Size`]: half-open sample-grid geometry
//! - [`frame_size`]: frame dimensions after discarding resolution levels
//! - [`determine_discard_levels`]: snap a requested frame onto an available one
//! - [`map_region_to_suitable_resolution_grid`] / [`map_region_to_high_resolution_grid`]:
//!   move a region between the requested frame, the served frame and the
//!   full-resolution reference grid

mod rect;
mod resolution;

pub use rect::{Point, Rect, Size};
pub use resolution::{
    ceil_div_i64, ceil_div_pow2, determine_discard_levels, floor_div_pow2, frame_size,
    map_region_to_high_resolution_grid, map_region_to_suitable_resolution_grid, mul_pow2,
    scale_down, RoundDirection,
};

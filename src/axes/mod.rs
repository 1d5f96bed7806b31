//! Axis classification, canonical naming and cell-bounds resolution.

mod bounds;
mod classify;
mod names;

pub use bounds::{check_time_bounds, compute_bounds, resolve_bounds, BoundsSource, BoundsSpec};
pub use classify::{classify_axes, AxisDescriptor, AxisRole, AxisSet};
pub use names::resolve_names;

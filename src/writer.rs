//! Output-side axis definitions.
//!
//! The pipeline ends by handing resolved axes to a sink. The trait
//! keeps the archival backend swappable; `TraceSink` records and logs
//! definitions, standing in for a real backend in dry runs and tests.

use crate::axes::BoundsSource;
use crate::error::Result;
use ndarray::{Array2, ArrayD};
use tracing::info;

/// Opaque identifier a sink returns for a defined axis or grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisHandle(pub usize);

/// Everything a backend needs to materialize one axis.
#[derive(Debug, Clone)]
pub struct AxisDefinition {
    /// Canonical archival name.
    pub canonical: String,
    /// Coordinate variable name in the model output.
    pub source_name: String,
    pub units: String,
    pub values: Vec<f64>,
    pub bounds: Option<Array2<f64>>,
    pub bounds_source: Option<BoundsSource>,
}

/// A curvilinear grid: 2-D coordinates over the index axes, with
/// optional cell vertices.
#[derive(Debug, Clone)]
pub struct GridDefinition {
    pub latitude: ArrayD<f64>,
    pub longitude: ArrayD<f64>,
    pub latitude_vertices: Option<ArrayD<f64>>,
    pub longitude_vertices: Option<ArrayD<f64>>,
    /// Handles of the j and i index axes, in that order.
    pub axes: Vec<AxisHandle>,
}

/// Backend receiving resolved axes.
pub trait AxisSink {
    fn define_axis(&mut self, def: &AxisDefinition) -> Result<AxisHandle>;
    fn define_grid(&mut self, def: &GridDefinition) -> Result<AxisHandle>;
}

/// Recording sink.
#[derive(Debug, Default)]
pub struct TraceSink {
    pub axes: Vec<AxisDefinition>,
    pub grids: Vec<GridDefinition>,
}

impl AxisSink for TraceSink {
    fn define_axis(&mut self, def: &AxisDefinition) -> Result<AxisHandle> {
        info!(
            "axis {} ({}): {} values, bounds {:?}",
            def.canonical,
            def.source_name,
            def.values.len(),
            def.bounds_source
        );
        self.axes.push(def.clone());
        Ok(AxisHandle(self.axes.len() - 1))
    }

    fn define_grid(&mut self, def: &GridDefinition) -> Result<AxisHandle> {
        info!(
            "grid over {} axes, {} cells, vertices: {}",
            def.axes.len(),
            def.latitude.len(),
            def.latitude_vertices.is_some()
        );
        self.grids.push(def.clone());
        Ok(AxisHandle(self.grids.len() - 1))
    }
}

//! Ancillary grid files.
//!
//! Model output on a curvilinear grid often ships without the 2-D
//! coordinate geometry; a per-realm grid file supplies the latitude and
//! longitude arrays, their cell vertices, and any bounds variables the
//! data files reference but do not carry.

use crate::config::{JobConfig, VertexNames};
use crate::error::{ClimopError, Result};
use ndarray::{ArrayD, IxDyn};
use std::path::Path;
use tracing::warn;

/// 2-D coordinate geometry of a curvilinear grid.
#[derive(Debug, Clone)]
pub struct GridCoords {
    pub latitude: ArrayD<f64>,
    pub longitude: ArrayD<f64>,
    pub latitude_vertices: Option<ArrayD<f64>>,
    pub longitude_vertices: Option<ArrayD<f64>>,
}

/// Read one bounds variable from a grid file. `Ok(None)` when the file
/// opens but lacks the variable, so the caller can fall back to
/// computing bounds.
pub fn read_bounds_var(path: &Path, name: &str) -> Result<Option<ArrayD<f64>>> {
    let file = netcdf::open(path).map_err(|e| {
        ClimopError::AncillaryMissing(format!("{}: {e}", path.display()))
    })?;
    match file.variable(name) {
        Some(var) => Ok(Some(read_array(&var)?)),
        None => Ok(None),
    }
}

/// Read the realm's grid geometry named by the vertex registry.
///
/// Vertex arrays are reoriented so the vertex dimension comes last;
/// longitudes are wrapped to [0, 360).
pub fn grid_coords(cfg: &JobConfig, vertices: &VertexNames) -> Result<GridCoords> {
    let path = cfg.ancil_grid().ok_or_else(|| {
        ClimopError::AncillaryMissing(format!("no grid file configured for realm {}", cfg.realm))
    })?;
    let table = vertices.for_realm(cfg.realm).ok_or_else(|| {
        ClimopError::AncillaryMissing(format!("no vertex registry entry for realm {}", cfg.realm))
    })?;
    let file = netcdf::open(&path)
        .map_err(|e| ClimopError::file_open(path.clone(), e.to_string()))?;

    let read_pair = |key: &str| -> Result<(ArrayD<f64>, Option<ArrayD<f64>>)> {
        let [coord_name, vert_name] = table.get(key).ok_or_else(|| {
            ClimopError::AncillaryMissing(format!(
                "no {key} entry for realm {} in the vertex registry",
                cfg.realm
            ))
        })?;
        let var = file.variable(coord_name).ok_or_else(|| {
            ClimopError::AncillaryMissing(format!("{coord_name} not in {}", path.display()))
        })?;
        let coord = read_array(&var)?;
        let verts = match file.variable(vert_name) {
            Some(v) => Some(orient_vertices(read_array(&v)?)),
            None => {
                warn!("{vert_name} not in {}, grid defined without vertices", path.display());
                None
            }
        };
        Ok((coord, verts))
    };

    let (latitude, latitude_vertices) = read_pair("latitude")?;
    let (mut longitude, mut longitude_vertices) = read_pair("longitude")?;
    longitude.mapv_inplace(wrap_lon);
    if let Some(v) = &mut longitude_vertices {
        v.mapv_inplace(wrap_lon);
    }
    Ok(GridCoords {
        latitude,
        longitude,
        latitude_vertices,
        longitude_vertices,
    })
}

fn read_array(var: &netcdf::Variable<'_>) -> Result<ArrayD<f64>> {
    let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
    let values = var.get_values::<f64, _>(..)?;
    ArrayD::from_shape_vec(IxDyn(&shape), values)
        .map_err(|e| ClimopError::NetCdf(format!("bad shape for {}: {e}", var.name())))
}

fn wrap_lon(v: f64) -> f64 {
    v.rem_euclid(360.0)
}

/// Move the vertex dimension last when the file stores it first.
fn orient_vertices(arr: ArrayD<f64>) -> ArrayD<f64> {
    if arr.ndim() == 3 && arr.shape()[0] == 4 && arr.shape()[2] != 4 {
        let moved = arr.permuted_axes(vec![1, 2, 0]);
        moved.as_standard_layout().to_owned()
    } else {
        arr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_dimension_moved_last() {
        let vals: Vec<f64> = (0..24).map(f64::from).collect();
        let arr = ArrayD::from_shape_vec(IxDyn(&[4, 2, 3]), vals).unwrap();
        let out = orient_vertices(arr);
        assert_eq!(out.shape(), &[2, 3, 4]);
        // Cell (0,0) keeps its four corners, one per source slab.
        assert_eq!(out[[0, 0, 0]], 0.0);
        assert_eq!(out[[0, 0, 1]], 6.0);
        assert_eq!(out[[0, 0, 3]], 18.0);
    }

    #[test]
    fn already_oriented_vertices_untouched() {
        let vals: Vec<f64> = (0..24).map(f64::from).collect();
        let arr = ArrayD::from_shape_vec(IxDyn(&[2, 3, 4]), vals.clone()).unwrap();
        let out = orient_vertices(arr.clone());
        assert_eq!(out, arr);
    }

    #[test]
    fn longitudes_wrap_to_positive_range() {
        assert_eq!(wrap_lon(-75.0), 285.0);
        assert_eq!(wrap_lon(370.0), 10.0);
        assert_eq!(wrap_lon(0.0), 0.0);
    }
}

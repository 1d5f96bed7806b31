//! NetCDF dataset access.
//!
//! Loads the parts of a file the axis pipeline needs: dimensions,
//! coordinate variables with their values and attributes, per-variable
//! dimension lists, and any `bounds`/`edges` variables referenced by a
//! coordinate. Data payloads of the physical variables are left to the
//! external calculation library.

use crate::error::{ClimopError, Result};
use ndarray::{concatenate, ArrayD, Axis, IxDyn};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A one-dimensional coordinate variable.
#[derive(Debug, Clone)]
pub struct CoordAxis {
    pub name: String,
    pub values: Vec<f64>,
    pub attrs: HashMap<String, String>,
}

impl CoordAxis {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }
}

/// Shape and metadata of a data variable; values are not loaded.
#[derive(Debug, Clone)]
pub struct VarInfo {
    pub name: String,
    pub dims: Vec<String>,
    pub attrs: HashMap<String, String>,
}

/// In-memory view of one file (or of a file list concatenated along
/// its time dimension).
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub path: PathBuf,
    pub dims: BTreeMap<String, usize>,
    pub coords: BTreeMap<String, CoordAxis>,
    pub variables: BTreeMap<String, VarInfo>,
    /// Bounds/edges variables referenced by a coordinate, read eagerly.
    pub extras: BTreeMap<String, ArrayD<f64>>,
}

impl Dataset {
    /// Read one file.
    pub fn open(path: &Path) -> Result<Self> {
        let file = netcdf::open(path)
            .map_err(|e| ClimopError::file_open(path.to_path_buf(), e.to_string()))?;

        let mut ds = Dataset {
            path: path.to_path_buf(),
            ..Default::default()
        };
        for dim in file.dimensions() {
            ds.dims.insert(dim.name().to_string(), dim.len());
        }
        for var in file.variables() {
            let name = var.name().to_string();
            let dims: Vec<String> = var.dimensions().iter().map(|d| d.name()).collect();
            let attrs = read_attrs(&var);
            if dims.len() == 1 && dims[0] == name {
                let values = var.get_values::<f64, _>(..)?;
                ds.coords.insert(
                    name.clone(),
                    CoordAxis {
                        name: name.clone(),
                        values,
                        attrs: attrs.clone(),
                    },
                );
            }
            ds.variables.insert(name.clone(), VarInfo { name, dims, attrs });
        }

        // Pull in every bounds/edges variable referenced by a coordinate,
        // so later stages never have to reopen the file.
        let wanted: Vec<String> = ds
            .coords
            .values()
            .flat_map(|c| {
                ["bounds", "edges"]
                    .iter()
                    .filter_map(|k| c.attr(k))
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .collect();
        for bname in wanted {
            if let Some(var) = file.variable(&bname) {
                let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
                let values = var.get_values::<f64, _>(..)?;
                let arr = ArrayD::from_shape_vec(IxDyn(&shape), values)
                    .map_err(|e| ClimopError::NetCdf(format!("bad shape for {bname}: {e}")))?;
                ds.extras.insert(bname, arr);
            } else {
                debug!("referenced bounds variable {bname} not in {}", path.display());
            }
        }
        Ok(ds)
    }

    /// Read a filtered file list as one dataset. Non-time axes are taken
    /// from the first file; the time coordinate and any bounds variable
    /// with a leading time dimension are concatenated across files in
    /// list order.
    pub fn open_many(paths: &[PathBuf], time_dim: Option<&str>) -> Result<Self> {
        let first = paths
            .first()
            .ok_or_else(|| ClimopError::DataAvailability("empty file list".into()))?;
        let mut ds = Dataset::open(first)?;
        let tdim = match time_dim {
            Some(t) => t.to_string(),
            None => return Ok(ds),
        };
        for path in &paths[1..] {
            let file = netcdf::open(path)
                .map_err(|e| ClimopError::file_open(path.to_path_buf(), e.to_string()))?;
            let Some(var) = file.variable(&tdim) else {
                warn!("{} has no '{tdim}' coordinate, skipped in concat", path.display());
                continue;
            };
            let values = var.get_values::<f64, _>(..)?;
            if let Some(coord) = ds.coords.get_mut(&tdim) {
                coord.values.extend(values);
                ds.dims.insert(tdim.clone(), coord.values.len());
            }
            for (bname, arr) in ds.extras.iter_mut() {
                let Some(bvar) = file.variable(bname) else {
                    continue;
                };
                if bvar.dimensions().first().map_or(true, |d| d.name() != tdim) {
                    continue;
                }
                let shape: Vec<usize> = bvar.dimensions().iter().map(|d| d.len()).collect();
                let values = bvar.get_values::<f64, _>(..)?;
                let more = ArrayD::from_shape_vec(IxDyn(&shape), values)
                    .map_err(|e| ClimopError::NetCdf(format!("bad shape for {bname}: {e}")))?;
                *arr = concatenate(Axis(0), &[arr.view(), more.view()]).map_err(|e| {
                    ClimopError::NetCdf(format!("cannot concatenate {bname}: {e}"))
                })?;
            }
        }
        Ok(ds)
    }

    pub fn coord(&self, name: &str) -> Option<&CoordAxis> {
        self.coords.get(name)
    }

    pub fn has_dim(&self, name: &str) -> bool {
        self.dims.contains_key(name)
    }

    /// Find the time dimension of the first requested variable present,
    /// and whether the dataset exposes more than one time axis.
    pub fn time_dim(&self, vin: &[String]) -> (Option<String>, bool) {
        let mut time_dim = None;
        if let Some(var) = vin.iter().find_map(|v| self.variables.get(v)) {
            for dim in &var.dims {
                let axis = self
                    .coord(dim)
                    .and_then(|c| c.attr("axis").or_else(|| c.attr("cartesian_axis")))
                    .unwrap_or("");
                if axis == "T" || dim.to_lowercase().contains("time") {
                    time_dim = Some(dim.clone());
                    break;
                }
            }
        }
        let count = self
            .dims
            .keys()
            .filter(|d| {
                d.to_lowercase().contains("time")
                    || self
                        .coord(d)
                        .and_then(|c| c.attr("axis"))
                        .map_or(false, |a| a == "T")
            })
            .count();
        (time_dim, count > 1)
    }
}

/// Cheap containment probe: variable names and their dimension names,
/// nothing else is read.
#[derive(Debug, Clone)]
pub struct FileProbe {
    pub path: PathBuf,
    pub variables: HashMap<String, Vec<String>>,
}

impl FileProbe {
    pub fn open(path: &Path) -> Result<Self> {
        let file = netcdf::open(path)
            .map_err(|e| ClimopError::file_open(path.to_path_buf(), e.to_string()))?;
        let mut variables = HashMap::new();
        for var in file.variables() {
            let dims: Vec<String> = var.dimensions().iter().map(|d| d.name()).collect();
            variables.insert(var.name().to_string(), dims);
        }
        Ok(Self {
            path: path.to_path_buf(),
            variables,
        })
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    /// The time-like dimension of a variable, judged by name only (the
    /// probe does not read coordinate attributes).
    pub fn time_dim_of(&self, name: &str) -> Option<&str> {
        self.variables.get(name).and_then(|dims| {
            dims.iter()
                .find(|d| d.to_lowercase().contains("time"))
                .map(String::as_str)
        })
    }
}

fn read_attrs(var: &netcdf::Variable<'_>) -> HashMap<String, String> {
    let mut attrs = HashMap::new();
    for attr in var.attributes() {
        attrs.insert(attr.name().to_string(), attr_value_to_string(&attr));
    }
    attrs
}

pub(crate) fn attr_value_to_string(attr: &netcdf::Attribute<'_>) -> String {
    use netcdf::AttributeValue;

    match attr.value() {
        Ok(AttributeValue::Str(v)) => v,
        Ok(AttributeValue::Strs(v)) => v.join(" "),
        Ok(AttributeValue::Double(v)) => format!("{v}"),
        Ok(AttributeValue::Float(v)) => format!("{v}"),
        Ok(AttributeValue::Int(v)) => format!("{v}"),
        Ok(AttributeValue::Uint(v)) => format!("{v}"),
        Ok(AttributeValue::Longlong(v)) => format!("{v}"),
        Ok(AttributeValue::Ulonglong(v)) => format!("{v}"),
        Ok(AttributeValue::Short(v)) => format!("{v}"),
        Ok(AttributeValue::Ushort(v)) => format!("{v}"),
        Ok(AttributeValue::Schar(v)) => format!("{v}"),
        Ok(AttributeValue::Uchar(v)) => format!("{v}"),
        Ok(other) => format!("{other:?}"),
        Err(_) => format!("{attr:?}"),
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{coord, dataset};

    #[test]
    fn time_dim_detection() {
        let ds = dataset(
            "tas",
            vec![
                coord("time", &[0.0, 30.0], &[("axis", "T")]),
                coord("lat", &[-45.0, 45.0], &[("axis", "Y")]),
            ],
            &[],
        );
        let (tdim, multiple) = ds.time_dim(&["tas".to_string()]);
        assert_eq!(tdim.as_deref(), Some("time"));
        assert!(!multiple);
    }

    #[test]
    fn multiple_time_axes_flagged() {
        let mut ds = dataset(
            "mld",
            vec![coord("time", &[0.0], &[("axis", "T")])],
            &[],
        );
        ds.dims.insert("time_bounds_dim".into(), 1);
        // A second dimension whose name contains "time" marks the set
        // as ambiguous for the fast filename path.
        ds.dims.insert("scalar_axis_time2".into(), 1);
        let (_, multiple) = ds.time_dim(&["mld".to_string()]);
        assert!(multiple);
    }
}

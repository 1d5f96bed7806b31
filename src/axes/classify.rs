//! Classification of dataset dimensions into canonical axis roles.

use crate::config::AxisNames;
use crate::dataset::Dataset;
use crate::error::{ClimopError, Result};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Canonical role of one dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisRole {
    Time,
    Latitude,
    Longitude,
    /// j index of a curvilinear (non-cartesian) grid.
    GridJ,
    /// i index of a curvilinear grid.
    GridI,
    /// Latitude values of a generic (reduced/curvilinear) grid.
    GenericLatitude,
    /// Longitude values of a generic grid.
    GenericLongitude,
    VerticalLevel,
    /// Half-level (interface) vertical coordinate.
    VerticalLevelHalf,
    /// Generic extra axis carried through to the output.
    PseudoLevel,
    /// Length-irrelevant auxiliary axis kept for metadata.
    Singleton,
    /// Dimension without an associated coordinate variable.
    Unclassified,
}

/// A classified dimension with its coordinate values and attributes.
#[derive(Debug, Clone)]
pub struct AxisDescriptor {
    pub name: String,
    pub role: AxisRole,
    pub values: Vec<f64>,
    pub attrs: HashMap<String, String>,
    /// Canonical archival name, filled in by name resolution.
    pub canonical: Option<String>,
}

impl AxisDescriptor {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    pub fn units(&self) -> &str {
        self.attr("units").unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// The axes of one variable, partitioned by role.
///
/// At most one time and one vertical axis per variable; lat/lon and
/// grid j/i are mutually exclusive (cartesian vs curvilinear).
#[derive(Debug, Clone, Default)]
pub struct AxisSet {
    pub time: Option<AxisDescriptor>,
    pub z: Option<AxisDescriptor>,
    pub lat: Option<AxisDescriptor>,
    pub lon: Option<AxisDescriptor>,
    pub grid_lat: Option<AxisDescriptor>,
    pub grid_lon: Option<AxisDescriptor>,
    pub j: Option<AxisDescriptor>,
    pub i: Option<AxisDescriptor>,
    pub pseudo: Vec<AxisDescriptor>,
    pub singleton: Vec<AxisDescriptor>,
    /// Dimensions that could not be classified (no coordinate variable).
    pub unclassified: Vec<String>,
}

impl AxisSet {
    /// All classified axes, in output order.
    pub fn iter(&self) -> impl Iterator<Item = &AxisDescriptor> {
        self.time
            .iter()
            .chain(self.z.iter())
            .chain(self.pseudo.iter())
            .chain(self.grid_lat.iter())
            .chain(self.lat.iter())
            .chain(self.grid_lon.iter())
            .chain(self.lon.iter())
            .chain(self.j.iter())
            .chain(self.i.iter())
            .chain(self.singleton.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut AxisDescriptor> {
        self.time
            .iter_mut()
            .chain(self.z.iter_mut())
            .chain(self.pseudo.iter_mut())
            .chain(self.grid_lat.iter_mut())
            .chain(self.lat.iter_mut())
            .chain(self.grid_lon.iter_mut())
            .chain(self.lon.iter_mut())
            .chain(self.j.iter_mut())
            .chain(self.i.iter_mut())
            .chain(self.singleton.iter_mut())
    }

    /// True when both curvilinear indices are present.
    pub fn is_curvilinear(&self) -> bool {
        self.j.is_some() && self.i.is_some()
    }
}

const J_NAMES: [&str; 3] = ["nj", "yu_ocean", "yt_ocean"];
const I_NAMES: [&str; 3] = ["ni", "xu_ocean", "xt_ocean"];

fn name_matches(dim: &str, candidates: &[&str]) -> bool {
    candidates.iter().any(|c| dim.contains(c))
}

fn set_once(slot: &mut Option<AxisDescriptor>, axis: AxisDescriptor, what: &str) {
    if let Some(existing) = slot {
        debug!(
            "second {what} axis {} ignored, keeping {}",
            axis.name, existing.name
        );
    } else {
        *slot = Some(axis);
    }
}

/// Assign each dimension of `var` to its axis role.
///
/// Classification precedence follows the orientation attribute (`axis`,
/// falling back to `cartesian_axis`) and a set of name heuristics; the
/// ocean j/i index conventions are also matched without an orientation
/// attribute because some simulations omit dimension-variable metadata.
pub fn classify_axes(ds: &Dataset, var: &str, names: &AxisNames) -> Result<AxisSet> {
    let info = ds
        .variables
        .get(var)
        .ok_or_else(|| ClimopError::DataAvailability(format!("variable {var} not in dataset")))?;
    let mut axes = AxisSet::default();
    for dim in &info.dims {
        let Some(coord) = ds.coord(dim) else {
            warn!("no coordinate variable associated with the dimension {dim}");
            axes.unclassified.push(dim.clone());
            continue;
        };
        let axis = AxisDescriptor {
            name: coord.name.clone(),
            role: AxisRole::Unclassified,
            values: coord.values.clone(),
            attrs: coord.attrs.clone(),
            canonical: None,
        };
        let orientation = coord
            .attr("axis")
            .or_else(|| coord.attr("cartesian_axis"))
            .unwrap_or("");
        let lower = dim.to_lowercase();
        debug!("classifying {dim}: orientation '{orientation}'");

        if orientation == "T" || lower.contains("time") {
            set_once(&mut axes.time, with_role(axis, AxisRole::Time), "time");
        } else if orientation.contains('Y') {
            if lower == "gridlat" {
                set_once(
                    &mut axes.grid_lat,
                    with_role(axis, AxisRole::GenericLatitude),
                    "generic latitude",
                );
            } else if lower.contains("lat") {
                set_once(&mut axes.lat, with_role(axis, AxisRole::Latitude), "latitude");
            } else if name_matches(&lower, &J_NAMES) {
                set_once(&mut axes.j, with_role(axis, AxisRole::GridJ), "grid j");
            } else {
                push_other(&mut axes, axis, names);
            }
        } else if name_matches(&lower, &J_NAMES) {
            set_once(&mut axes.j, with_role(axis, AxisRole::GridJ), "grid j");
        } else if orientation.contains('X') {
            if lower.contains("glon") {
                set_once(
                    &mut axes.grid_lon,
                    with_role(axis, AxisRole::GenericLongitude),
                    "generic longitude",
                );
            } else if lower.contains("lon") {
                set_once(&mut axes.lon, with_role(axis, AxisRole::Longitude), "longitude");
            } else if name_matches(&lower, &I_NAMES) {
                set_once(&mut axes.i, with_role(axis, AxisRole::GridI), "grid i");
            } else {
                push_other(&mut axes, axis, names);
            }
        } else if name_matches(&lower, &I_NAMES) {
            set_once(&mut axes.i, with_role(axis, AxisRole::GridI), "grid i");
        } else if orientation == "Z"
            || ["lev", "height", "depth"].iter().any(|k| dim.contains(k))
        {
            let role = if lower.contains("half") || lower.contains("edges") {
                AxisRole::VerticalLevelHalf
            } else {
                AxisRole::VerticalLevel
            };
            set_once(&mut axes.z, with_role(axis, role), "vertical");
        } else {
            push_other(&mut axes, axis, names);
        }
    }
    let detected: Vec<String> = axes
        .iter()
        .map(|a| format!("{:?}: {}", a.role, a.name))
        .collect();
    debug!("detected axes: {}", detected.join("; "));
    Ok(axes)
}

fn with_role(mut axis: AxisDescriptor, role: AxisRole) -> AxisDescriptor {
    axis.role = role;
    axis
}

/// Route an axis with no orientation match to the singleton registry or
/// the pseudo-axis bucket.
fn push_other(axes: &mut AxisSet, axis: AxisDescriptor, names: &AxisNames) {
    if names.is_singleton(&axis.name) {
        axes.singleton.push(with_role(axis, AxisRole::Singleton));
    } else {
        if axis.len() == 1 {
            warn!("axis 1 value but not singleton: {}", axis.name);
        }
        axes.pseudo.push(with_role(axis, AxisRole::PseudoLevel));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Reference;
    use crate::dataset::testing::{coord, dataset};

    fn names() -> AxisNames {
        Reference::load().unwrap().axis_names
    }

    #[test]
    fn cartesian_atmosphere_variable() {
        let ds = dataset(
            "tas",
            vec![
                coord("time", &[15.5, 45.0], &[("axis", "T")]),
                coord("lat", &[-30.0, 0.0, 30.0], &[("axis", "Y")]),
                coord("lon", &[0.0, 120.0, 240.0], &[("axis", "X")]),
            ],
            &[],
        );
        let axes = classify_axes(&ds, "tas", &names()).unwrap();
        assert_eq!(axes.time.as_ref().unwrap().role, AxisRole::Time);
        assert_eq!(axes.lat.as_ref().unwrap().name, "lat");
        assert_eq!(axes.lon.as_ref().unwrap().name, "lon");
        assert!(!axes.is_curvilinear());
    }

    #[test]
    fn curvilinear_ocean_indices_without_metadata() {
        // MOM files sometimes ship without orientation attributes on
        // the index dimensions; the name convention still classifies.
        let ds = dataset(
            "thetao",
            vec![
                coord("time", &[0.0], &[]),
                coord("st_ocean", &[5.0, 15.0], &[("cartesian_axis", "Z")]),
                coord("yt_ocean", &[0.5, 1.5], &[]),
                coord("xt_ocean", &[0.5, 1.5], &[]),
            ],
            &[],
        );
        let axes = classify_axes(&ds, "thetao", &names()).unwrap();
        assert_eq!(axes.j.as_ref().unwrap().role, AxisRole::GridJ);
        assert_eq!(axes.i.as_ref().unwrap().role, AxisRole::GridI);
        assert_eq!(axes.z.as_ref().unwrap().name, "st_ocean");
        assert!(axes.is_curvilinear());
    }

    #[test]
    fn half_levels_get_their_own_role() {
        let ds = dataset(
            "wmo",
            vec![coord(
                "st_edges_ocean",
                &[0.0, 10.0, 20.0],
                &[("cartesian_axis", "Z")],
            )],
            &[],
        );
        let axes = classify_axes(&ds, "wmo", &names()).unwrap();
        assert_eq!(axes.z.as_ref().unwrap().role, AxisRole::VerticalLevelHalf);
    }

    #[test]
    fn singleton_and_pseudo_split_by_registry() {
        let ds = dataset(
            "sconc",
            vec![
                coord("typesi", &[1.0], &[]),
                coord("basin", &[1.0, 2.0, 3.0], &[]),
            ],
            &[],
        );
        let axes = classify_axes(&ds, "sconc", &names()).unwrap();
        assert_eq!(axes.singleton.len(), 1);
        assert_eq!(axes.singleton[0].name, "typesi");
        assert_eq!(axes.pseudo.len(), 1);
        assert_eq!(axes.pseudo[0].role, AxisRole::PseudoLevel);
    }

    #[test]
    fn named_height_axes_resolve_through_the_vertical_registry() {
        // 2m/10m height axes carry a height name and classify as
        // vertical, not singleton.
        let ds = dataset("tas", vec![coord("height2m", &[2.0], &[])], &[]);
        let axes = classify_axes(&ds, "tas", &names()).unwrap();
        assert_eq!(axes.z.as_ref().unwrap().role, AxisRole::VerticalLevel);
    }

    #[test]
    fn generic_longitude_matches_anywhere_in_the_name() {
        let ds = dataset(
            "pr",
            vec![coord("av_glon", &[0.0, 120.0], &[("axis", "X")])],
            &[],
        );
        let axes = classify_axes(&ds, "pr", &names()).unwrap();
        assert_eq!(
            axes.grid_lon.as_ref().unwrap().role,
            AxisRole::GenericLongitude
        );
    }

    #[test]
    fn dimension_without_coordinate_is_unclassified() {
        let ds = dataset(
            "ta",
            vec![coord("time", &[0.0], &[("axis", "T")])],
            &[("nv", 2)],
        );
        let axes = classify_axes(&ds, "ta", &names()).unwrap();
        assert_eq!(axes.unclassified, vec!["nv".to_string()]);
    }
}

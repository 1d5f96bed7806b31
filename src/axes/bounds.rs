//! Cell-bounds resolution for classified axes.
//!
//! Bounds come from the file when the coordinate references a bounds or
//! edges variable, from the ancillary grid file when the data files
//! dropped it, and are computed from cell centers otherwise. Time
//! bounds are validated against the sampling frequency; spatial range
//! corrections apply only to computed bounds, trusted sources are
//! passed through untouched.

use crate::axes::classify::{AxisDescriptor, AxisRole};
use crate::calc::CalcRegistry;
use crate::calendar::TimeUnits;
use crate::config::{Frequency, JobConfig};
use crate::dataset::Dataset;
use crate::error::{ClimopError, Result};
use crate::ancillary;
use ndarray::{Array2, ArrayD, Axis};
use tracing::{debug, info, warn};

/// Provenance of a bounds array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundsSource {
    /// Read from a bounds/edges variable of the data files.
    File,
    /// Read from the configured ancillary grid file.
    Ancillary,
    /// Computed from cell centers.
    Computed,
}

/// Resolved bounds of one axis, one `[lower, upper]` row per cell.
#[derive(Debug, Clone)]
pub struct BoundsSpec {
    pub values: Array2<f64>,
    pub source: BoundsSource,
}

/// Resolve bounds for one axis.
///
/// When the job's calculation collapses or reinterprets the axis, or a
/// resample changes the time sampling, stored bounds no longer describe
/// the output cells and are recomputed unconditionally.
pub fn resolve_bounds(
    ds: &Dataset,
    axis: &AxisDescriptor,
    cfg: &JobConfig,
    calcs: &CalcRegistry,
) -> Result<BoundsSpec> {
    let n = axis.len();
    let mut spec = if bounds_changed(axis, cfg, calcs) {
        info!("recalculating bounds for {}: changed by calculation", axis.name);
        computed(axis)?
    } else if let Some(bname) = axis.attr("bounds").or_else(|| axis.attr("edges")) {
        match ds.extras.get(bname) {
            Some(arr) => match to_array2(arr, n) {
                Some(values) => BoundsSpec {
                    values,
                    source: BoundsSource::File,
                },
                None => {
                    warn!(
                        "{bname} shape {:?} unusable for {} ({n} cells), computing",
                        arr.shape(),
                        axis.name
                    );
                    computed(axis)?
                }
            },
            None => from_ancillary(axis, bname, cfg)?,
        }
    } else {
        debug!("no bounds variable referenced by {}, computing", axis.name);
        computed(axis)?
    };

    if axis.role == AxisRole::Time {
        let day_factor = TimeUnits::parse(axis.units())
            .map(|u| u.days_per_unit())
            .unwrap_or(1.0);
        if !check_time_bounds(&spec.values, day_factor, cfg.frequency) {
            if spec.source == BoundsSource::Computed {
                return Err(ClimopError::BoundsValidation {
                    axis: axis.name.clone(),
                    frequency: cfg.frequency.to_string(),
                });
            }
            warn!(
                "stored time bounds of {} inconsistent with frequency {}, recalculating",
                axis.name, cfg.frequency
            );
            spec = computed(axis)?;
            if !check_time_bounds(&spec.values, day_factor, cfg.frequency) {
                return Err(ClimopError::BoundsValidation {
                    axis: axis.name.clone(),
                    frequency: cfg.frequency.to_string(),
                });
            }
        }
    }

    if spec.source == BoundsSource::Computed {
        correct_computed(&mut spec.values, axis, cfg);
    }
    Ok(spec)
}

/// True when the configured calculation or resample invalidates the
/// stored bounds of this axis.
fn bounds_changed(axis: &AxisDescriptor, cfg: &JobConfig, calcs: &CalcRegistry) -> bool {
    if !cfg.resample.is_empty() && axis.role == AxisRole::Time {
        return true;
    }
    if cfg.calculation.is_empty() {
        return false;
    }
    let Ok(entry) = calcs.get(&cfg.calculation) else {
        return false;
    };
    let vertical = matches!(
        axis.role,
        AxisRole::VerticalLevel | AxisRole::VerticalLevelHalf
    );
    (entry.level_interp && vertical) || entry.reduces.iter().any(|r| axis.name.contains(r))
}

fn computed(axis: &AxisDescriptor) -> Result<BoundsSpec> {
    Ok(BoundsSpec {
        values: compute_bounds(&axis.name, &axis.values)?,
        source: BoundsSource::Computed,
    })
}

/// Approximate bounds from cell centers: interior edges at midpoints,
/// outer edges extrapolated half a step beyond the first/last center.
pub fn compute_bounds(name: &str, centers: &[f64]) -> Result<Array2<f64>> {
    let n = centers.len();
    if n < 2 {
        return Err(ClimopError::axis_resolution(
            name,
            "cannot compute bounds from fewer than 2 values",
        ));
    }
    let mut out = Array2::zeros((n, 2));
    for i in 0..n {
        out[[i, 0]] = if i == 0 {
            1.5 * centers[0] - 0.5 * centers[1]
        } else {
            0.5 * (centers[i - 1] + centers[i])
        };
        out[[i, 1]] = if i == n - 1 {
            1.5 * centers[n - 1] - 0.5 * centers[n - 2]
        } else {
            0.5 * (centers[i] + centers[i + 1])
        };
    }
    Ok(out)
}

/// Each cell span, converted to days, must sit strictly inside 10% of
/// the frequency's reference interval (monthly accepts (27, 33) days).
/// Time-invariant fields always pass.
pub fn check_time_bounds(values: &Array2<f64>, day_factor: f64, frequency: Frequency) -> bool {
    if frequency.is_fixed() {
        return true;
    }
    let approx = frequency.reference_days();
    values.rows().into_iter().all(|row| {
        let span = (row[1] - row[0]) * day_factor;
        span > 0.9 * approx && span < 1.1 * approx
    })
}

fn from_ancillary(axis: &AxisDescriptor, bname: &str, cfg: &JobConfig) -> Result<BoundsSpec> {
    let Some(path) = cfg.ancil_grid() else {
        return Err(ClimopError::AncillaryMissing(format!(
            "no grid file configured for realm {} while {} references {bname}",
            cfg.realm, axis.name
        )));
    };
    match ancillary::read_bounds_var(&path, bname)? {
        Some(arr) => to_array2(&arr, axis.len())
            .map(|values| BoundsSpec {
                values,
                source: BoundsSource::Ancillary,
            })
            .ok_or_else(|| {
                ClimopError::AncillaryMissing(format!(
                    "{bname} in {} has no usable shape for {}",
                    path.display(),
                    axis.name
                ))
            }),
        None => {
            warn!(
                "{bname} absent from {}, computing bounds for {}",
                path.display(),
                axis.name
            );
            computed(axis)
        }
    }
}

/// Coerce a stored bounds array to `(n, 2)`. Accepts edge vectors of
/// length n+1, `(n, 2)` pairs, and time-varying `(t, n, 2)` stacks
/// where only the first slice is kept.
fn to_array2(arr: &ArrayD<f64>, n: usize) -> Option<Array2<f64>> {
    match arr.ndim() {
        1 if arr.len() == n + 1 => {
            let edges = arr.as_slice()?;
            let mut out = Array2::zeros((n, 2));
            for i in 0..n {
                out[[i, 0]] = edges[i];
                out[[i, 1]] = edges[i + 1];
            }
            Some(out)
        }
        2 if arr.shape() == [n, 2] => arr
            .view()
            .into_dimensionality::<ndarray::Ix2>()
            .ok()
            .map(|v| v.to_owned()),
        3 => {
            let first = arr.index_axis(Axis(0), 0).to_owned().into_dyn();
            to_array2(&first, n)
        }
        _ => None,
    }
}

/// Range corrections for computed bounds. Trusted sources already
/// carry physically valid edges.
fn correct_computed(values: &mut Array2<f64>, axis: &AxisDescriptor, cfg: &JobConfig) {
    match axis.role {
        AxisRole::Latitude | AxisRole::GenericLatitude => {
            values.mapv_inplace(|v| v.clamp(-90.0, 90.0));
        }
        AxisRole::VerticalLevel | AxisRole::VerticalLevelHalf => {
            // Height coordinates never extend below the surface; other
            // vertical coordinates (sigma, z*) may well be negative.
            let label = axis.canonical.as_deref().unwrap_or(&axis.name);
            if label.contains("height") && values[[0, 0]] < 0.0 {
                values[[0, 0]] = 0.0;
            }
            // The OM2 sw_ocean grid has no cell past the last wet level.
            if axis.name == "sw_ocean" && cfg.model_version.contains("OM2") {
                if let Some(last) = axis.values.last() {
                    let n = values.nrows();
                    values[[n - 1, 1]] = *last;
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::testing::{coord, dataset};
    use ndarray::{ArrayD, IxDyn};
    use std::collections::HashMap;

    fn cfg(calculation: &str, model_version: &str) -> JobConfig {
        serde_yaml::from_str(&format!(
            r#"
variable_id: thetao
table: Omon
vin: [thetao]
infile: "/d/**/*.nc"
frequency: mon
realm: ocean
tstart: "19900101"
tend: "19991231"
calculation: "{calculation}"
axes: [time, olevel, gridlat, gridlon]
reference_date: "1850-01-01"
calendar: proleptic_gregorian
model_version: "{model_version}"
"#
        ))
        .unwrap()
    }

    fn axis(name: &str, role: AxisRole, values: &[f64], attrs: &[(&str, &str)]) -> AxisDescriptor {
        AxisDescriptor {
            name: name.to_string(),
            role,
            values: values.to_vec(),
            attrs: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            canonical: None,
        }
    }

    #[test]
    fn computed_bounds_are_contiguous() {
        let b = compute_bounds("lat", &[-60.0, 0.0, 60.0]).unwrap();
        assert_eq!(b[[0, 1]], b[[1, 0]]);
        assert_eq!(b[[1, 1]], b[[2, 0]]);
        assert_eq!(b[[0, 0]], -90.0);
        assert_eq!(b[[2, 1]], 90.0);
        assert!(compute_bounds("lat", &[1.0]).is_err());
    }

    #[test]
    fn monthly_spans_accepted_within_tolerance() {
        // Real month lengths in days-since units.
        let widths = [31.0, 28.0, 31.0, 30.0];
        let mut values = Array2::zeros((4, 2));
        let mut t = 0.0;
        for (i, w) in widths.iter().enumerate() {
            values[[i, 0]] = t;
            t += w;
            values[[i, 1]] = t;
        }
        assert!(check_time_bounds(&values, 1.0, Frequency::Monthly));
        // Ten-day spans are not monthly.
        let bad = compute_bounds("time", &[5.0, 15.0, 25.0]).unwrap();
        assert!(!check_time_bounds(&bad, 1.0, Frequency::Monthly));
        assert!(check_time_bounds(&bad, 1.0, Frequency::Fixed));
    }

    #[test]
    fn file_bounds_pass_through() {
        let mut ds = dataset(
            "thetao",
            vec![coord("lat", &[-45.0, 45.0], &[("axis", "Y"), ("bounds", "lat_bnds")])],
            &[],
        );
        ds.extras.insert(
            "lat_bnds".into(),
            ArrayD::from_shape_vec(IxDyn(&[2, 2]), vec![-90.0, 0.0, 0.0, 90.0]).unwrap(),
        );
        let a = axis(
            "lat",
            AxisRole::Latitude,
            &[-45.0, 45.0],
            &[("bounds", "lat_bnds")],
        );
        let spec = resolve_bounds(&ds, &a, &cfg("", ""), &CalcRegistry::builtin()).unwrap();
        assert_eq!(spec.source, BoundsSource::File);
        assert_eq!(spec.values[[1, 1]], 90.0);
    }

    #[test]
    fn edge_vectors_become_pairs() {
        let arr = ArrayD::from_shape_vec(IxDyn(&[4]), vec![0.0, 10.0, 25.0, 45.0]).unwrap();
        let b = to_array2(&arr, 3).unwrap();
        assert_eq!(b[[0, 1]], 10.0);
        assert_eq!(b[[2, 0]], 25.0);
        // Length mismatch is not coerced.
        assert!(to_array2(&arr, 5).is_none());
    }

    #[test]
    fn time_varying_bounds_keep_first_slice() {
        let arr =
            ArrayD::from_shape_vec(IxDyn(&[2, 2, 2]), vec![0.0, 1.0, 1.0, 2.0, 9.0, 9.0, 9.0, 9.0])
                .unwrap();
        let b = to_array2(&arr, 2).unwrap();
        assert_eq!(b[[1, 1]], 2.0);
    }

    #[test]
    fn latitude_clamped_only_when_computed() {
        let ds = dataset("tas", vec![coord("lat", &[-89.0, 0.0, 89.0], &[("axis", "Y")])], &[]);
        let a = axis("lat", AxisRole::Latitude, &[-89.0, 0.0, 89.0], &[]);
        let spec = resolve_bounds(&ds, &a, &cfg("", ""), &CalcRegistry::builtin()).unwrap();
        assert_eq!(spec.source, BoundsSource::Computed);
        assert_eq!(spec.values[[0, 0]], -90.0);
        assert_eq!(spec.values[[2, 1]], 90.0);
    }

    #[test]
    fn monthly_tolerance_is_an_open_interval() {
        let one = |span: f64| Array2::from_shape_vec((1, 2), vec![0.0, span]).unwrap();
        assert!(!check_time_bounds(&one(27.0), 1.0, Frequency::Monthly));
        assert!(check_time_bounds(&one(27.5), 1.0, Frequency::Monthly));
        assert!(check_time_bounds(&one(32.5), 1.0, Frequency::Monthly));
        assert!(!check_time_bounds(&one(33.0), 1.0, Frequency::Monthly));
    }

    #[test]
    fn mismatched_stored_bounds_fall_back_to_centers() {
        // A bounds array left over from a single source file no longer
        // matches the concatenated axis; recover from centers instead
        // of demanding an ancillary grid.
        let mut ds = dataset(
            "tas",
            vec![coord("lat", &[-60.0, 0.0, 60.0], &[("axis", "Y"), ("bounds", "lat_bnds")])],
            &[],
        );
        ds.extras.insert(
            "lat_bnds".into(),
            ArrayD::from_shape_vec(IxDyn(&[5, 2]), vec![0.0; 10]).unwrap(),
        );
        let a = axis(
            "lat",
            AxisRole::Latitude,
            &[-60.0, 0.0, 60.0],
            &[("bounds", "lat_bnds")],
        );
        let spec = resolve_bounds(&ds, &a, &cfg("", ""), &CalcRegistry::builtin()).unwrap();
        assert_eq!(spec.source, BoundsSource::Computed);
        assert_eq!(spec.values[[0, 0]], -90.0);
    }

    #[test]
    fn negative_vertical_coordinates_survive_computation() {
        // Sigma levels run negative; no floor applies to them.
        let ds = dataset("thetao", vec![], &[]);
        let a = axis("sigma_level", AxisRole::VerticalLevel, &[-0.9, -0.5, -0.1], &[]);
        let spec = resolve_bounds(&ds, &a, &cfg("", ""), &CalcRegistry::builtin()).unwrap();
        assert_eq!(spec.values[[0, 0]], -1.1);
        assert_eq!(spec.values[[2, 1]], 0.1);
    }

    #[test]
    fn height_axis_first_lower_edge_floored() {
        let ds = dataset("ta", vec![], &[]);
        let mut a = axis(
            "theta_level_height",
            AxisRole::VerticalLevel,
            &[20.0, 80.0],
            &[],
        );
        a.canonical = Some("hybrid_height2".into());
        let spec = resolve_bounds(&ds, &a, &cfg("", ""), &CalcRegistry::builtin()).unwrap();
        // Extrapolation would put the first lower edge at -10.
        assert_eq!(spec.values[[0, 0]], 0.0);
        assert_eq!(spec.values[[1, 1]], 110.0);
    }

    #[test]
    fn om2_depth_grid_last_edge_override() {
        let centers = [5.0, 15.0, 25.0];
        let ds = dataset("thetao", vec![], &[]);
        let a = axis("sw_ocean", AxisRole::VerticalLevel, &centers, &[]);
        let spec =
            resolve_bounds(&ds, &a, &cfg("", "ACCESS-OM2"), &CalcRegistry::builtin()).unwrap();
        assert_eq!(spec.values[[2, 1]], 25.0);
        // Without the legacy grid the extrapolated edge stands.
        let spec = resolve_bounds(&ds, &a, &cfg("", ""), &CalcRegistry::builtin()).unwrap();
        assert_eq!(spec.values[[2, 1]], 30.0);
    }

    #[test]
    fn inconsistent_stored_time_bounds_recomputed() {
        // Stored bounds claim daily spans but the axis is monthly data.
        let mut ds = dataset(
            "tas",
            vec![coord(
                "time",
                &[15.5, 45.0],
                &[("axis", "T"), ("bounds", "time_bnds"), ("units", "days since 1990-01-01")],
            )],
            &[],
        );
        ds.extras.insert(
            "time_bnds".into(),
            ArrayD::from_shape_vec(IxDyn(&[2, 2]), vec![15.0, 16.0, 44.5, 45.5]).unwrap(),
        );
        let a = axis(
            "time",
            AxisRole::Time,
            &[15.5, 45.0],
            &[("bounds", "time_bnds"), ("units", "days since 1990-01-01")],
        );
        let spec = resolve_bounds(&ds, &a, &cfg("", ""), &CalcRegistry::builtin()).unwrap();
        assert_eq!(spec.source, BoundsSource::Computed);
        // Midpoint split of [15.5, 45.0] gives ~29.5-day cells.
        assert!(check_time_bounds(&spec.values, 1.0, Frequency::Monthly));
    }

    #[test]
    fn unfixable_time_bounds_are_fatal() {
        let ds = dataset(
            "tas",
            vec![coord(
                "time",
                &[0.5, 1.5],
                &[("axis", "T"), ("units", "days since 1990-01-01")],
            )],
            &[],
        );
        // Daily spacing cannot satisfy a monthly frequency.
        let a = axis(
            "time",
            AxisRole::Time,
            &[0.5, 1.5],
            &[("units", "days since 1990-01-01")],
        );
        let err = resolve_bounds(&ds, &a, &cfg("", ""), &CalcRegistry::builtin()).unwrap_err();
        assert!(matches!(err, ClimopError::BoundsValidation { .. }));
    }

    #[test]
    fn calculation_invalidates_stored_vertical_bounds() {
        let mut ds = dataset(
            "thetao",
            vec![coord(
                "st_ocean",
                &[5.0, 15.0],
                &[("cartesian_axis", "Z"), ("edges", "st_edges_ocean")],
            )],
            &[],
        );
        ds.extras.insert(
            "st_edges_ocean".into(),
            ArrayD::from_shape_vec(IxDyn(&[3]), vec![0.0, 10.0, 20.0]).unwrap(),
        );
        let a = axis(
            "st_ocean",
            AxisRole::VerticalLevel,
            &[5.0, 15.0],
            &[("edges", "st_edges_ocean")],
        );
        let spec =
            resolve_bounds(&ds, &a, &cfg("depth_integral", ""), &CalcRegistry::builtin()).unwrap();
        assert_eq!(spec.source, BoundsSource::Computed);
        // Without the calculation the stored edges win.
        let spec = resolve_bounds(&ds, &a, &cfg("", ""), &CalcRegistry::builtin()).unwrap();
        assert_eq!(spec.source, BoundsSource::File);
        assert_eq!(spec.values[[1, 1]], 20.0);
    }
}

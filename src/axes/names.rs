//! Canonical archival names for classified axes.
//!
//! The mapping of one output variable lists the canonical axis names it
//! expects (e.g. `[time, olevel, gridlat, gridlon]`). Resolution pairs
//! each classified axis with its entry in that list; generic vertical
//! entries are disambiguated by the coordinate variable name.

use crate::axes::classify::{AxisDescriptor, AxisRole, AxisSet};
use crate::config::{AxisNames, JobConfig};
use crate::error::{ClimopError, Result};
use tracing::warn;

/// Fill in `canonical` for every axis in the set.
///
/// A generic vertical entry that cannot be disambiguated is fatal: the
/// produced axis name decides the output structure and guessing would
/// archive the field under the wrong vertical coordinate. Everywhere
/// else a missing mapping entry falls back to the raw axis name with a
/// warning.
pub fn resolve_names(axes: &mut AxisSet, cfg: &JobConfig, names: &AxisNames) -> Result<()> {
    if let Some(t) = &mut axes.time {
        t.canonical = Some(find_or_keep(&cfg.axes, "time", &[], t));
    }
    if let Some(lat) = &mut axes.lat {
        lat.canonical = Some(find_or_keep(&cfg.axes, "lat", &["grid"], lat));
    }
    if let Some(lon) = &mut axes.lon {
        lon.canonical = Some(find_or_keep(&cfg.axes, "lon", &["grid"], lon));
    }
    if let Some(glat) = &mut axes.grid_lat {
        glat.canonical = Some(find_or_keep(&cfg.axes, "gridlat", &[], glat));
    }
    if let Some(glon) = &mut axes.grid_lon {
        glon.canonical = Some(find_or_keep(&cfg.axes, "gridlon", &[], glon));
    }
    // Curvilinear index axes have fixed canonical names.
    if let Some(j) = &mut axes.j {
        j.canonical = Some("j_index".to_string());
    }
    if let Some(i) = &mut axes.i {
        i.canonical = Some("i_index".to_string());
    }
    if let Some(z) = &mut axes.z {
        z.canonical = Some(resolve_z(z, cfg, names)?);
    }
    for p in &mut axes.pseudo {
        let entry = cfg
            .axes
            .iter()
            .find(|a| names.pseudo_axes.contains(a))
            .cloned();
        p.canonical = Some(entry.unwrap_or_else(|| {
            warn!("no pseudo axis entry for {} in mapping axes, using as is", p.name);
            p.name.clone()
        }));
    }
    for s in &mut axes.singleton {
        s.canonical = Some(s.name.clone());
    }
    Ok(())
}

/// First mapping entry containing `needle` (and none of `exclude`),
/// falling back to the raw axis name.
fn find_or_keep(
    cfg_axes: &[String],
    needle: &str,
    exclude: &[&str],
    axis: &AxisDescriptor,
) -> String {
    cfg_axes
        .iter()
        .find(|a| a.contains(needle) && !exclude.iter().any(|e| a.contains(e)))
        .cloned()
        .unwrap_or_else(|| {
            warn!(
                "could not find a '{needle}' entry in mapping axes for {}, using as is",
                axis.name
            );
            axis.name.clone()
        })
}

fn resolve_z(axis: &AxisDescriptor, cfg: &JobConfig, names: &AxisNames) -> Result<String> {
    let entry = cfg.axes.iter().find(|a| names.z_axes.contains(a));
    match entry {
        Some(e) if names.is_generic(e) => {
            let name = generic_name(e, &axis.name).ok_or_else(|| {
                ClimopError::axis_resolution(
                    &axis.name,
                    format!("no expansion of generic '{e}' matches"),
                )
            })?;
            debug_assert!(names.generic[e.as_str()].iter().any(|c| c == name));
            Ok(name.to_string())
        }
        Some(e) => Ok(e.clone()),
        None => {
            warn!(
                "could not find a vertical entry in mapping axes for {}, using as is",
                axis.name
            );
            Ok(axis.name.clone())
        }
    }
}

/// Expansion of a generic vertical entry, selected by the coordinate
/// variable name of the model output.
fn generic_name(generic: &str, coord: &str) -> Option<&'static str> {
    match generic {
        "olevel" => matches!(coord, "st_ocean" | "sw_ocean").then_some("depth_coord"),
        "olevhalf" => {
            matches!(coord, "st_edges_ocean" | "sw_edges_ocean").then_some("depth_coord_half")
        }
        "alevel" => match coord {
            "theta_level_height" | "rho_level_height" => Some("hybrid_height2"),
            "model_level_number" | "level_number" => Some("hybrid_height"),
            _ => None,
        },
        "alevhalf" => (coord == "rho_level_number").then_some("hybrid_height_half"),
        _ => None,
    }
}

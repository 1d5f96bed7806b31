//! Per-job pipeline: pattern resolution, window filtering, axis
//! classification, naming, bounds, and axis definition through a sink.

use crate::axes::{classify_axes, resolve_bounds, resolve_names, AxisRole};
use crate::calc::CalcRegistry;
use crate::config::{JobConfig, NotesRegistry, Reference};
use crate::dataset::Dataset;
use crate::error::{ClimopError, Result};
use crate::files::{filter_files, finalize_duplicates, resolve_patterns};
use crate::writer::{AxisDefinition, AxisHandle, AxisSink, GridDefinition};
use crate::ancillary;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{error, info};

/// What one job produced.
#[derive(Debug, Default)]
pub struct JobReport {
    pub variable_id: String,
    pub table: String,
    /// Files selected per input pattern after window filtering.
    pub files: BTreeMap<String, Vec<PathBuf>>,
    pub axes: Vec<AxisHandle>,
    pub grid: Option<AxisHandle>,
    /// Notes to append to the output's global attributes.
    pub notes: Vec<String>,
}

/// Run one (variable, table, window) job end to end.
///
/// A pattern whose files all fall outside the window is logged and the
/// job continues; the job fails only when the primary input variable
/// ends up with no files at all.
pub fn run_job(cfg: &JobConfig, refs: &Reference, sink: &mut dyn AxisSink) -> Result<JobReport> {
    info!("preparing: {}-{}", cfg.variable_id, cfg.table);
    let calcs = CalcRegistry::builtin();
    calcs.validate(&cfg.calculation)?;
    let window = cfg.window()?;

    let mut sets = resolve_patterns(cfg)?;
    for (key, set) in sets.iter_mut() {
        if set.is_duplicate() || set.files.is_empty() {
            continue;
        }
        match Dataset::open(&set.files[0]) {
            Ok(first) => {
                let (tdim, multiple) = first.time_dim(&set.vars);
                set.time_dim = tdim;
                set.multiple_times = multiple;
            }
            Err(e) => error!("cannot inspect first file of {key}: {e}"),
        }
        let kept = filter_files(set, &window, &cfg.calendar);
        if kept.is_empty() {
            error!(
                "{}",
                ClimopError::DataAvailability(format!(
                    "no files of pattern {key} overlap [{}, {}]",
                    cfg.tstart, cfg.tend
                ))
            );
        }
        set.files = kept;
    }
    finalize_duplicates(&mut sets);

    let primary = cfg
        .vin
        .first()
        .ok_or_else(|| ClimopError::Config("job lists no input variables".into()))?;
    let (pkey, pset) = sets
        .iter()
        .find(|(_, s)| s.vars.iter().any(|v| v == primary))
        .ok_or_else(|| {
            ClimopError::DataAvailability(format!("variable {primary} not found in any pattern"))
        })?;
    if pset.files.is_empty() {
        return Err(ClimopError::DataAvailability(format!(
            "no files left for {primary} after window filtering"
        )));
    }
    info!("using {} files of pattern {pkey} for {primary}", pset.files.len());
    let ds = Dataset::open_many(&pset.files, pset.time_dim.as_deref())?;

    let mut axes = classify_axes(&ds, primary, &refs.axis_names)?;
    resolve_names(&mut axes, cfg, &refs.axis_names)?;

    let mut report = JobReport {
        variable_id: cfg.variable_id.clone(),
        table: cfg.table.clone(),
        ..Default::default()
    };
    for (key, set) in &sets {
        report.files.insert(key.clone(), set.files.clone());
    }

    let curvilinear = axes.is_curvilinear();
    let mut index_handles: Vec<AxisHandle> = Vec::new();
    for axis in axes.iter() {
        let bounds = match axis.role {
            AxisRole::Time
            | AxisRole::Latitude
            | AxisRole::Longitude
            | AxisRole::GenericLatitude
            | AxisRole::GenericLongitude
            | AxisRole::VerticalLevel
            | AxisRole::VerticalLevelHalf => Some(resolve_bounds(&ds, axis, cfg, &calcs)?),
            _ => None,
        };
        let def = AxisDefinition {
            canonical: axis
                .canonical
                .clone()
                .unwrap_or_else(|| axis.name.clone()),
            source_name: axis.name.clone(),
            units: axis.units().to_string(),
            values: axis.values.clone(),
            bounds: bounds.as_ref().map(|b| b.values.clone()),
            bounds_source: bounds.map(|b| b.source),
        };
        let handle = sink.define_axis(&def)?;
        report.axes.push(handle);
        if matches!(axis.role, AxisRole::GridJ | AxisRole::GridI) {
            index_handles.push(handle);
        }
    }
    if curvilinear {
        let grid = ancillary::grid_coords(cfg, &refs.vertices)?;
        let def = GridDefinition {
            latitude: grid.latitude,
            longitude: grid.longitude,
            latitude_vertices: grid.latitude_vertices,
            longitude_vertices: grid.longitude_vertices,
            axes: index_handles,
        };
        report.grid = Some(sink.define_grid(&def)?);
    }

    report.notes = job_notes(cfg, &refs.notes);
    Ok(report)
}

/// Collect the notes whose registry key matches the job. A key starting
/// with `~` matches as a substring of the field value, anything else
/// must match exactly.
pub fn job_notes(cfg: &JobConfig, notes: &NotesRegistry) -> Vec<String> {
    let fields = [
        ("calculation", cfg.calculation.as_str()),
        ("frequency", cfg.frequency.as_str()),
        ("realm", cfg.realm.as_str()),
    ];
    let mut out = Vec::new();
    for (field, value) in fields {
        let Some(table) = notes.notes.get(field) else {
            continue;
        };
        for (key, note) in table {
            let matched = match key.strip_prefix('~') {
                Some(sub) => value.contains(sub),
                None => key == value,
            };
            if matched {
                out.push(note.clone());
            }
        }
    }
    out
}

/// Run a list of jobs, logging each failure and carrying on: one broken
/// mapping should not sink a production batch.
pub fn run_all(jobs: &[JobConfig], refs: &Reference, sink: &mut dyn AxisSink) -> Vec<JobReport> {
    let mut reports = Vec::new();
    for cfg in jobs {
        match run_job(cfg, refs, sink) {
            Ok(report) => reports.push(report),
            Err(e) => error!("job {}-{} failed: {e}", cfg.variable_id, cfg.table),
        }
    }
    reports
}

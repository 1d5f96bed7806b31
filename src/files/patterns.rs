//! Glob-pattern expansion and variable-to-pattern assignment.

use crate::config::JobConfig;
use crate::dataset::FileProbe;
use crate::error::{ClimopError, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};
use walkdir::WalkDir;

/// The files resolved for one pattern (or derived sub-pattern).
#[derive(Debug, Clone, Default)]
pub struct FileSet {
    /// Matching files, sorted lexicographically by filename.
    pub files: Vec<PathBuf>,
    /// Requested variables found in the first file of the list.
    pub vars: Vec<String>,
    /// Key of the original pattern when this set is a synthetic
    /// duplicate created for a variable with its own time axis.
    pub duplicate_of: Option<String>,
    /// Name of the time dimension, filled in by the window filter step.
    pub time_dim: Option<String>,
    /// More than one time axis detected in the set's files.
    pub multiple_times: bool,
}

impl FileSet {
    pub fn is_duplicate(&self) -> bool {
        self.duplicate_of.is_some()
    }
}

/// Split a pattern at the last recursive-match marker into its fixed
/// root directory and the filename match expression.
pub fn split_pattern(pattern: &str) -> Result<(PathBuf, String)> {
    let at = pattern.rfind("**/").ok_or_else(|| {
        ClimopError::Config(format!("pattern '{pattern}' has no '**/' marker"))
    })?;
    let root = &pattern[..at];
    let expr = &pattern[at + 3..];
    if expr.is_empty() {
        return Err(ClimopError::Config(format!(
            "pattern '{pattern}' has an empty match expression"
        )));
    }
    Ok((PathBuf::from(root), expr.to_string()))
}

/// Collect all files under `root` whose filename matches `expr`,
/// sorted by filename as a proxy for chronological order.
fn collect_files(root: &Path, expr: &str) -> Result<Vec<PathBuf>> {
    let matcher = glob::Pattern::new(expr)
        .map_err(|e| ClimopError::Config(format!("bad glob '{expr}': {e}")))?;
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| matcher.matches(&entry.file_name().to_string_lossy()))
        .map(|entry| entry.into_path())
        .collect();
    files.sort_by_key(|p| p.file_name().map(|n| n.to_os_string()));
    Ok(files)
}

/// Expand the job's patterns into file sets and assign each requested
/// variable to the first pattern that supplies it.
///
/// Only the first file of each sorted list is opened, as a cheap
/// containment probe. When one pattern supplies variables with
/// different time dimensions the pattern is split: each extra variable
/// gets a synthetic `<pattern>-<i>` set marked as a duplicate.
///
/// A variable missing from every pattern is logged but not fatal; the
/// job proceeds with the sets that were built.
pub fn resolve_patterns(cfg: &JobConfig) -> Result<BTreeMap<String, FileSet>> {
    let patterns: Vec<&str> = cfg.infile.split_whitespace().collect();
    debug!("input file patterns: {patterns:?}");
    let mut sets: BTreeMap<String, FileSet> = BTreeMap::new();
    for p in &patterns {
        let (root, expr) = split_pattern(p)?;
        let files = collect_files(&root, &expr)?;
        if files.is_empty() {
            warn!("could not find files for pattern {p}; check the path is correct");
        }
        sets.insert(
            p.to_string(),
            FileSet {
                files,
                ..Default::default()
            },
        );
    }

    let mut missing: Vec<String> = cfg.vin.clone();
    for p in &patterns {
        if missing.is_empty() {
            break;
        }
        let files = sets[*p].files.clone();
        let Some(first) = files.first() else {
            continue;
        };
        let probe = match FileProbe::open(first) {
            Ok(probe) => probe,
            Err(e) => {
                error!("cannot probe first file of pattern {p}: {e}");
                continue;
            }
        };
        let found: Vec<String> = missing
            .iter()
            .filter(|v| probe.has_variable(v))
            .cloned()
            .collect();
        missing.retain(|v| !probe.has_variable(v));
        let tdims: BTreeSet<&str> = found
            .iter()
            .filter_map(|v| probe.time_dim_of(v))
            .collect();
        let split = tdims.len() > 1;
        debug!("pattern {p}: found {found:?}, distinct time dims {tdims:?}");
        assign_found(&mut sets, p, &files, &found, split);
    }

    if !missing.is_empty() {
        error!("input vars {missing:?} not in files {}", cfg.infile);
    }
    Ok(sets)
}

/// Attach found variables to a pattern's set, splitting the pattern
/// when the variables use different time axes.
fn assign_found(
    sets: &mut BTreeMap<String, FileSet>,
    pattern: &str,
    files: &[PathBuf],
    found: &[String],
    split: bool,
) {
    if found.is_empty() {
        return;
    }
    if !split {
        if let Some(set) = sets.get_mut(pattern) {
            set.vars = found.to_vec();
        }
        return;
    }
    if let Some(set) = sets.get_mut(pattern) {
        set.vars = vec![found[0].clone()];
    }
    for (i, var) in found[1..].iter().enumerate() {
        sets.insert(
            format!("{pattern}-{i}"),
            FileSet {
                files: files.to_vec(),
                vars: vec![var.clone()],
                duplicate_of: Some(pattern.to_string()),
                ..Default::default()
            },
        );
    }
}

/// Copy the (filtered) file list of each original set into its
/// duplicates. Run after all window filtering is finalized.
pub fn finalize_duplicates(sets: &mut BTreeMap<String, FileSet>) {
    let originals: BTreeMap<String, Vec<PathBuf>> = sets
        .iter()
        .filter(|(_, s)| !s.is_duplicate())
        .map(|(k, s)| (k.clone(), s.files.clone()))
        .collect();
    for set in sets.values_mut() {
        if let Some(orig) = &set.duplicate_of {
            match originals.get(orig) {
                Some(files) => set.files = files.clone(),
                None => warn!("duplicate set references unknown pattern {orig}"),
            }
        }
    }
}

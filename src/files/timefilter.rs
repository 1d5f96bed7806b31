//! Time-window filtering of resolved file lists.
//!
//! Two tiers: a fast filename-timestamp heuristic, and an exact
//! fallback that opens each file and inspects its time coordinate.
//! Opening every file is expensive at scale, so the fast path is always
//! tried first unless the set is known to carry multiple time axes.

use crate::calendar::{decode_stamp, Calendar, TimeUnits};
use crate::config::TimeWindow;
use crate::dataset::attr_value_to_string;
use crate::files::FileSet;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, error, info, warn};

/// Date-like token patterns in decreasing order of reliability. The
/// first group expects a plausible leading year digit; the second
/// covers short years written without the leading zero.
fn date_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"[012]\d{7}",
            r"[012]\d{5}",
            r"[012]\d{3}-\d{2}-\d{2}",
            r"[012]\d{3}-\d{2}",
            r"[012]\d{3}",
            r"\d{7}",
            r"\d{5}",
            r"\d{3}-\d{2}-\d{2}",
            r"\d{3}-\d{2}",
            r"\d{3}",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("static regex"))
        .collect()
    })
}

/// Extract the date-like token of a filename: separators normalized,
/// tokens scanned from the end against the pattern list.
pub(crate) fn timestamp_token(name: &str) -> Option<String> {
    let underscored = name.replace('.', "_");
    underscored
        .split('_')
        .rev()
        .find(|tok| date_patterns().iter().any(|re| re.is_match(tok)))
        .map(str::to_string)
}

/// Normalize a token to a comparable digit stamp. Hyphens are removed,
/// a trailing `T<hhmm>` suffix is stripped, and 3/5/7-digit stamps get
/// a leading zero (short years written without zero padding).
fn normalize_token(token: &str) -> String {
    let mut stamp = token.replace('-', "");
    if let Some((date, _hhmm)) = stamp.split_once('T') {
        stamp = date.to_string();
    }
    if !stamp.starts_with(|c: char| c.is_ascii_digit()) {
        stamp.retain(|c| c.is_ascii_digit());
    }
    if matches!(stamp.len(), 3 | 5 | 7) {
        stamp.insert(0, '0');
    }
    stamp
}

/// Fast path: guess each file's coverage from its filename timestamp.
///
/// Returns `None` when any filename yields no date-like token; the
/// caller then falls back to exact time-axis inspection. Stamps shorter
/// than 8 digits truncate the window to the matching precision (4 =
/// year, 6 = year+month) before the inclusive lexicographic test.
///
/// This is a heuristic: unusual naming schemes may under- or
/// over-select and are expected to be caught by the fallback.
pub fn filter_by_timestamp(files: &[PathBuf], window: &TimeWindow) -> Option<Vec<PathBuf>> {
    info!("checking files timestamp ...");
    let start8 = window.start8();
    let end8 = window.end8();
    let mut inrange = Vec::new();
    for file in files {
        let name = file.file_name()?.to_string_lossy();
        let Some(token) = timestamp_token(&name) else {
            debug!("couldn't find timestamp for {}", file.display());
            return None;
        };
        let stamp = normalize_token(&token);
        let cmp_len = match stamp.len() {
            4 => 4,
            6 => 6,
            _ => 8,
        };
        if stamp.len() < cmp_len {
            debug!("timestamp '{stamp}' too short in {}", file.display());
            return None;
        }
        let start = &start8[..cmp_len];
        let end = &end8[..cmp_len];
        let probe = &stamp[..cmp_len];
        debug!("stamp for {name}: {probe} against [{start}, {end}]");
        if start <= probe && probe <= end {
            inrange.push(file.clone());
        }
    }
    Some(inrange)
}

/// Read the first and last values of a file's time coordinate as
/// fixed-width stamps.
fn time_extent(path: &Path, tdim: &str, default_calendar: &str) -> Option<(String, String)> {
    let file = match netcdf::open(path) {
        Ok(f) => f,
        Err(e) => {
            error!("cannot open file: {} - {e}", path.display());
            return None;
        }
    };
    // Patterns can span heterogeneous files; a file without this time
    // axis is simply not a candidate.
    let var = file.variable(tdim)?;
    let len = var.dimensions().first().map(|d| d.len())?;
    if len == 0 {
        return None;
    }
    let units = var
        .attribute("units")
        .map(|a| attr_value_to_string(&a))
        .unwrap_or_default();
    let calendar = var
        .attribute("calendar")
        .map(|a| attr_value_to_string(&a))
        .unwrap_or_else(|| default_calendar.to_string());
    let cal: Calendar = match calendar.parse() {
        Ok(c) => c,
        Err(e) => {
            error!("{}: {e}", path.display());
            return None;
        }
    };
    let units = match TimeUnits::parse(&units) {
        Ok(u) => u,
        Err(e) => {
            error!("{}: {e}", path.display());
            return None;
        }
    };
    let read = |idx: usize| -> Option<f64> {
        match var.get_value::<f64, _>([idx]) {
            Ok(v) => Some(v),
            Err(e) => {
                error!("cannot read {tdim}[{idx}] of {}: {e}", path.display());
                None
            }
        }
    };
    let first = read(0)?;
    let last = read(len - 1)?;
    let tmin = decode_stamp(&units, cal, first).ok()?;
    let tmax = decode_stamp(&units, cal, last).ok()?;
    Some((tmin, tmax))
}

/// Exact fallback: open each file and keep it unless its time extent is
/// disjoint from the window. Files that fail to open are skipped with a
/// logged error; files lacking the time dimension are skipped silently.
pub fn filter_by_time_axis(
    files: &[PathBuf],
    tdim: &str,
    window: &TimeWindow,
    default_calendar: &str,
) -> Vec<PathBuf> {
    let tstart = window.start_full();
    let tend = window.end_full();
    debug!("time dimension: {tdim}; window [{tstart}, {tend}]");
    let mut inrange = Vec::new();
    for file in files {
        let Some((tmin, tmax)) = time_extent(file, tdim, default_calendar) else {
            continue;
        };
        debug!("tmin, tmax from time dim: {tmin}, {tmax}");
        if !(tmin.as_str() > tend.as_str() || tmax.as_str() < tstart.as_str()) {
            inrange.push(file.clone());
        }
    }
    debug!("number of files in time range: {}", inrange.len());
    inrange
}

/// Reduce a file set to the files overlapping the window.
///
/// Time-invariant fields keep exactly the first file. Sets with
/// multiple time axes skip the filename heuristic, whose semantics
/// would be ambiguous; everything else tries the fast path first.
pub fn filter_files(set: &FileSet, window: &TimeWindow, default_calendar: &str) -> Vec<PathBuf> {
    if window.frequency.is_fixed() {
        return set.files.first().cloned().into_iter().collect();
    }
    let fallback = |reason: &str| -> Vec<PathBuf> {
        debug!("{reason}; trying time axis");
        match &set.time_dim {
            Some(tdim) => filter_by_time_axis(&set.files, tdim, window, default_calendar),
            None => {
                warn!("no time dimension resolved for set; keeping all files");
                set.files.clone()
            }
        }
    };
    if set.multiple_times {
        return fallback("multiple time axes present");
    }
    match filter_by_timestamp(&set.files, window) {
        Some(files) => files,
        None => fallback("using timestamp failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Frequency;

    fn window(start: &str, end: &str, f: Frequency) -> TimeWindow {
        TimeWindow::new(start, end, f).unwrap()
    }

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn extracts_trailing_date_token() {
        assert_eq!(
            timestamp_token("tas_Amon_ACCESS_199001-199012.nc").as_deref(),
            Some("199001-199012")
        );
        assert_eq!(
            timestamp_token("ocean_month.nc-19900630").as_deref(),
            Some("nc-19900630")
        );
        assert_eq!(timestamp_token("grid_spec.nc"), None);
    }

    #[test]
    fn normalizes_short_and_suffixed_tokens() {
        assert_eq!(normalize_token("19900101T0130"), "19900101");
        assert_eq!(normalize_token("0501-01"), "050101");
        // 7-digit short year gains a leading zero.
        assert_eq!(normalize_token("5010101"), "05010101");
        assert_eq!(normalize_token("nc-19900630"), "19900630");
    }

    #[test]
    fn monthly_range_files_select_by_window() {
        let files = paths(&[
            "tas_Amon_199001-199012.nc",
            "tas_Amon_200001-200012.nc",
        ]);
        let w = window("19900101", "19991231", Frequency::Monthly);
        let kept = filter_by_timestamp(&files, &w).unwrap();
        assert_eq!(kept, paths(&["tas_Amon_199001-199012.nc"]));
    }

    #[test]
    fn eight_digit_stamps_inclusive_at_edges() {
        let files = paths(&["pr_19891231.nc", "pr_19900101.nc", "pr_19991231.nc"]);
        let w = window("19900101", "19991231", Frequency::Daily);
        let kept = filter_by_timestamp(&files, &w).unwrap();
        assert_eq!(kept, paths(&["pr_19900101.nc", "pr_19991231.nc"]));
    }

    #[test]
    fn short_stamps_truncate_window() {
        // Year-only stamps compare on 4 digits.
        let files = paths(&["tas_1989.nc", "tas_1990.nc", "tas_1999.nc"]);
        let w = window("19900601", "19991231", Frequency::Yearly);
        let kept = filter_by_timestamp(&files, &w).unwrap();
        // 1990 is kept even though the window starts mid-year: the
        // truncated comparison favors inclusion.
        assert_eq!(kept, paths(&["tas_1990.nc", "tas_1999.nc"]));
    }

    #[test]
    fn six_digit_stamps_compare_year_month() {
        let files = paths(&["tas_199005.nc", "tas_199012.nc", "tas_200001.nc"]);
        let w = window("19900601", "19991231", Frequency::Monthly);
        let kept = filter_by_timestamp(&files, &w).unwrap();
        assert_eq!(kept, paths(&["tas_199012.nc"]));
    }

    #[test]
    fn missing_token_fails_fast_path() {
        let files = paths(&["tas_199001.nc", "grid_spec.nc"]);
        let w = window("19900101", "19991231", Frequency::Monthly);
        assert!(filter_by_timestamp(&files, &w).is_none());
    }

    #[test]
    fn fixed_frequency_keeps_first_file_only() {
        let set = FileSet {
            files: paths(&["areacella.nc", "other.nc"]),
            ..Default::default()
        };
        let w = window("19900101", "19991231", Frequency::Fixed);
        let kept = filter_files(&set, &w, "standard");
        assert_eq!(kept, paths(&["areacella.nc"]));
    }
}

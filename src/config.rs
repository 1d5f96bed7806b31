//! Job configuration and static reference tables.
//!
//! One job processes a single (variable, table, time window) combination.
//! The `JobConfig` is immutable and passed by reference into every
//! component entry point; the reference tables are loaded once per
//! process from YAML embedded in the binary.

use crate::error::{ClimopError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Sampling frequency of the output field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Frequency {
    #[serde(rename = "dec")]
    Decadal,
    #[serde(rename = "yr")]
    Yearly,
    #[serde(rename = "mon")]
    Monthly,
    #[serde(rename = "day")]
    Daily,
    #[serde(rename = "6hr")]
    SixHourly,
    #[serde(rename = "3hr")]
    ThreeHourly,
    #[serde(rename = "1hr")]
    Hourly,
    #[serde(rename = "10min")]
    TenMinute,
    #[serde(rename = "fx")]
    Fixed,
}

impl Frequency {
    /// Reference span of one sampling interval in days, used by the
    /// bounds frequency-consistency check.
    pub fn reference_days(self) -> f64 {
        match self {
            Frequency::Decadal => 3650.0,
            Frequency::Yearly => 365.0,
            Frequency::Monthly => 30.0,
            Frequency::Daily => 1.0,
            Frequency::SixHourly => 0.25,
            Frequency::ThreeHourly => 0.125,
            Frequency::Hourly => 0.041667,
            Frequency::TenMinute => 0.006944,
            Frequency::Fixed => 0.0,
        }
    }

    /// True for time-invariant fields.
    pub fn is_fixed(self) -> bool {
        matches!(self, Frequency::Fixed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Frequency::Decadal => "dec",
            Frequency::Yearly => "yr",
            Frequency::Monthly => "mon",
            Frequency::Daily => "day",
            Frequency::SixHourly => "6hr",
            Frequency::ThreeHourly => "3hr",
            Frequency::Hourly => "1hr",
            Frequency::TenMinute => "10min",
            Frequency::Fixed => "fx",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = ClimopError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "dec" => Ok(Frequency::Decadal),
            "yr" => Ok(Frequency::Yearly),
            "mon" => Ok(Frequency::Monthly),
            "day" => Ok(Frequency::Daily),
            "6hr" => Ok(Frequency::SixHourly),
            "3hr" => Ok(Frequency::ThreeHourly),
            "1hr" => Ok(Frequency::Hourly),
            "10min" => Ok(Frequency::TenMinute),
            "fx" => Ok(Frequency::Fixed),
            other => Err(ClimopError::Config(format!("unknown frequency: {other}"))),
        }
    }
}

/// Physical domain of the processed variable. Selects the ancillary
/// grid file and the coordinate registry entries that apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Realm {
    Atmos,
    Ocean,
    Seaice,
    Land,
}

impl Realm {
    pub fn as_str(self) -> &'static str {
        match self {
            Realm::Atmos => "atmos",
            Realm::Ocean => "ocean",
            Realm::Seaice => "seaice",
            Realm::Land => "land",
        }
    }
}

impl fmt::Display for Realm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive [start, end] selection window with its sampling frequency.
///
/// Stamps are kept as zero-padded digit strings (year down to minute)
/// so that window membership reduces to lexicographic comparison.
#[derive(Debug, Clone)]
pub struct TimeWindow {
    start: String,
    end: String,
    pub frequency: Frequency,
}

/// Strip separators from a calendar timestamp, keeping digits only.
fn normalize_stamp(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Pad a digit stamp to 12 characters (YYYYMMDDhhmm). The template is
/// 8 characters covering MMDDhhmm; missing trailing parts are filled
/// from the corresponding template position.
fn pad_stamp(digits: &str, template: &str) -> String {
    let take = digits.len().min(12);
    let mut s = digits[..take].to_string();
    if s.len() < 12 {
        s.push_str(&template[s.len() - 4..]);
    }
    s.truncate(12);
    s
}

impl TimeWindow {
    /// Build a window from configuration timestamps such as
    /// `1990-01-01T00:00` or `19900101`.
    pub fn new(tstart: &str, tend: &str, frequency: Frequency) -> Result<Self> {
        let start = normalize_stamp(tstart);
        let end = normalize_stamp(tend);
        if start.len() < 4 || end.len() < 4 {
            return Err(ClimopError::Config(format!(
                "time window needs at least a year: [{tstart}, {tend}]"
            )));
        }
        Ok(Self {
            start,
            end,
            frequency,
        })
    }

    /// Window start truncated/padded to 8 digits (YYYYMMDD).
    pub fn start8(&self) -> String {
        let mut s = self.start_full();
        s.truncate(8);
        s
    }

    /// Window end truncated/padded to 8 digits (YYYYMMDD).
    pub fn end8(&self) -> String {
        let mut s = self.end_full();
        s.truncate(8);
        s
    }

    /// Full-precision window start (YYYYMMDDhhmm), padded down.
    pub fn start_full(&self) -> String {
        pad_stamp(&self.start, "01010000")
    }

    /// Full-precision window end (YYYYMMDDhhmm). Missing parts are
    /// padded towards the end of the interval so that boundary-adjacent
    /// data is included rather than dropped.
    pub fn end_full(&self) -> String {
        pad_stamp(&self.end, "12312359")
    }
}

fn default_string() -> String {
    String::new()
}

/// Immutable per-job configuration, consumed (not owned) by the core.
#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    /// Identifier of the output variable.
    pub variable_id: String,
    /// Output table name, used in diagnostics.
    pub table: String,
    /// Raw input variable names required for this output.
    pub vin: Vec<String>,
    /// Space-separated glob patterns of the form `<root>**/<glob>`.
    pub infile: String,
    pub frequency: Frequency,
    pub realm: Realm,
    /// Window start, calendar timestamp (`1990-01-01T00:00` or digits).
    pub tstart: String,
    /// Window end, inclusive.
    pub tend: String,
    /// Calculation identifier resolved through the registry; empty for
    /// a plain copy of the input variable.
    #[serde(default = "default_string")]
    pub calculation: String,
    /// Resample operation identifier; empty when no resampling runs.
    #[serde(default = "default_string")]
    pub resample: String,
    /// Canonical axis names expected for this variable mapping.
    pub axes: Vec<String>,
    /// Directory holding ancillary grid files.
    #[serde(default)]
    pub ancils_path: Option<PathBuf>,
    /// Ancillary grid file name per realm.
    #[serde(default)]
    pub ancil_grids: BTreeMap<Realm, String>,
    /// Date origin for the output time axis, e.g. `1850-01-01`.
    pub reference_date: String,
    /// CF calendar of the experiment.
    pub calendar: String,
    /// Model version string; drives legacy grid corrections.
    #[serde(default = "default_string")]
    pub model_version: String,
}

impl JobConfig {
    /// The job's selection window.
    pub fn window(&self) -> Result<TimeWindow> {
        TimeWindow::new(&self.tstart, &self.tend, self.frequency)
    }

    /// Ancillary grid file configured for the job's realm, if any.
    pub fn ancil_grid(&self) -> Option<PathBuf> {
        let dir = self.ancils_path.as_ref()?;
        let name = self.ancil_grids.get(&self.realm)?;
        Some(dir.join(name))
    }
}

/// Axis-name registry: canonical vertical/pseudo/singleton names and
/// the expansions of generic vertical entries.
#[derive(Debug, Clone, Deserialize)]
pub struct AxisNames {
    pub z_axes: Vec<String>,
    pub generic: BTreeMap<String, Vec<String>>,
    pub pseudo_axes: Vec<String>,
    pub singleton_axes: Vec<String>,
}

impl AxisNames {
    pub fn is_generic(&self, name: &str) -> bool {
        self.generic.contains_key(name)
    }

    pub fn is_singleton(&self, name: &str) -> bool {
        self.singleton_axes.iter().any(|s| s == name)
    }
}

/// Realm → coordinate name → [ancillary variable, vertices variable].
#[derive(Debug, Clone, Deserialize)]
pub struct VertexNames(pub BTreeMap<String, BTreeMap<String, [String; 2]>>);

impl VertexNames {
    pub fn for_realm(&self, realm: Realm) -> Option<&BTreeMap<String, [String; 2]>> {
        self.0.get(realm.as_str())
    }
}

/// Per-field notes appended to the global attributes of produced files.
#[derive(Debug, Clone, Deserialize)]
pub struct NotesRegistry {
    pub notes: BTreeMap<String, BTreeMap<String, String>>,
}

/// Read-only reference tables, loaded once per process.
#[derive(Debug, Clone)]
pub struct Reference {
    pub axis_names: AxisNames,
    pub vertices: VertexNames,
    pub notes: NotesRegistry,
}

impl Reference {
    /// Load the reference tables embedded in the binary.
    pub fn load() -> Result<Self> {
        Ok(Self {
            axis_names: serde_yaml::from_str(include_str!("../data/axes_names.yaml"))?,
            vertices: serde_yaml::from_str(include_str!("../data/latlon_vertices.yaml"))?,
            notes: serde_yaml::from_str(include_str!("../data/notes.yaml"))?,
        })
    }
}

//! Error types for climop.
//!
//! This module provides a unified error handling approach using `thiserror`.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for climop operations.
pub type Result<T> = std::result::Result<T, ClimopError>;

/// Errors that can occur while selecting files and resolving axes.
#[derive(Debug, Error)]
pub enum ClimopError {
    /// No files matched a pattern or a required variable was absent
    /// from every pattern. Non-fatal: the job continues with partial
    /// data and fails later only if the variable is dereferenced.
    #[error("Data unavailable: {0}")]
    DataAvailability(String),

    /// Failed to open an input file.
    #[error("Failed to open file: {path}: {reason}")]
    FileOpen { path: PathBuf, reason: String },

    /// A generic vertical axis could not be mapped to a canonical name.
    #[error("Cannot resolve canonical name for axis '{axis}' ({detail})")]
    AxisResolution { axis: String, detail: String },

    /// Time bounds failed the frequency-consistency check even after
    /// recomputation from cell centers.
    #[error("Bounds for axis '{axis}' inconsistent with frequency '{frequency}'")]
    BoundsValidation { axis: String, frequency: String },

    /// Ancillary grid file unset or absent while coordinate geometry
    /// cannot be recovered from the data files.
    #[error("Ancillary grid file not set or inexistent: {0}")]
    AncillaryMissing(String),

    /// Calculation identifier not present in the registry.
    #[error("Unknown calculation identifier: {0}")]
    UnknownCalculation(String),

    /// Failed to decode a CF time coordinate.
    #[error("Cannot decode time coordinate: {0}")]
    TimeDecode(String),

    /// Failed to read a NetCDF file.
    #[error("NetCDF error: {0}")]
    NetCdf(String),

    /// Malformed configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed registry or configuration file.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ClimopError {
    /// Create a FileOpen error.
    pub fn file_open(path: PathBuf, reason: impl Into<String>) -> Self {
        Self::FileOpen {
            path,
            reason: reason.into(),
        }
    }

    /// Create an AxisResolution error.
    pub fn axis_resolution(axis: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::AxisResolution {
            axis: axis.into(),
            detail: detail.into(),
        }
    }
}

impl From<netcdf::Error> for ClimopError {
    fn from(err: netcdf::Error) -> Self {
        Self::NetCdf(err.to_string())
    }
}

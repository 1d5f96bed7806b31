//! Climop - post-processing front end for climate model output.
//!
//! Climop takes per-variable mappings of a simulation archive, selects
//! the raw output files covering a requested time window, classifies
//! each dimension of the input variable into a canonical axis role,
//! resolves archival axis names and cell bounds, and hands the result
//! to a pluggable archival backend.
//!
//! # Pipeline
//!
//! - Glob patterns expand to sorted file lists, with one pattern split
//!   per time axis when its variables disagree
//! - A fast filename-timestamp filter narrows the lists to the window,
//!   with an exact time-axis fallback
//! - Axes classify by orientation attributes and naming conventions
//! - Generic vertical entries resolve against the coordinate registry
//! - Bounds come from the files, the ancillary grid, or cell centers
//!
//! # Example
//!
//! ```ignore
//! use climop::config::{JobConfig, Reference};
//! use climop::job::run_job;
//! use climop::writer::TraceSink;
//!
//! let cfg: JobConfig = serde_yaml::from_str(&mapping_text)?;
//! let refs = Reference::load()?;
//! let mut sink = TraceSink::default();
//! let report = run_job(&cfg, &refs, &mut sink)?;
//! println!("{} axes defined", report.axes.len());
//! ```

#![warn(missing_debug_implementations, rust_2018_idioms, unreachable_pub)]
#![deny(unsafe_code)]

pub mod ancillary;
pub mod axes;
pub mod calc;
pub mod calendar;
pub mod config;
pub mod dataset;
pub mod error;
pub mod files;
pub mod job;
pub mod writer;

pub use error::{ClimopError, Result};

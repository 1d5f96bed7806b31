//! Input file selection.
//!
//! This module expands the job's glob patterns into per-pattern file
//! sets and reduces each set to the files overlapping the requested
//! time window.

mod patterns;
mod timefilter;

pub use patterns::{finalize_duplicates, resolve_patterns, split_pattern, FileSet};
pub use timefilter::{filter_by_time_axis, filter_by_timestamp, filter_files};

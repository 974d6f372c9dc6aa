//! # ftd-core
//!
//! Shared building blocks for the footprint tools: the genomic interval
//! model, ordered interval sets read from BED-like files, and plain/gzip
//! reader and writer helpers.

pub mod errors;
pub mod models;
pub mod utils;

pub use errors::IntervalError;
pub use models::{GenomicInterval, IntervalSet};

//! # ftd-posterior
//!
//! Genome-wide posterior scoring of nuclease protection. Readers pull
//! per-dataset count rows for each interval into a bounded work queue;
//! processors score every position against the per-dataset dispersion
//! models and write qualifying positions to private chunk files, which are
//! concatenated into the final output once every worker has stopped.
//!
//! ```no_run
//! use std::io;
//! use std::path::Path;
//!
//! use ftd_core::models::IntervalSet;
//! use ftd_posterior::{
//!     ModelRegistry, PosteriorConfig, PosteriorScorer, ScoringPipeline, open_count_store,
//!     read_metadata,
//! };
//!
//! # fn main() -> anyhow::Result<()> {
//! let rows = read_metadata(Path::new("datasets.tsv"))?;
//! let registry = ModelRegistry::load(&rows)?;
//! let stores = registry
//!     .count_stores()
//!     .iter()
//!     .map(|p| open_count_store(p))
//!     .collect::<Result<Vec<_>, _>>()?;
//!
//! let config = PosteriorConfig::default();
//! let scorer = PosteriorScorer::new(&registry, &config);
//! let intervals = IntervalSet::try_from("peaks.bed")?;
//! ScoringPipeline::new(&config, &stores, &scorer).run(&intervals, &mut io::stdout())?;
//! # Ok(())
//! # }
//! ```

pub mod arrays;
pub mod config;
pub mod consts;
pub mod errors;
pub mod merge;
pub mod models;
pub mod pipeline;
pub mod processor;
pub mod queue;
pub mod reader;
pub mod stats;
pub mod store;

// re-exports
pub use arrays::{PerDatasetArrays, WorkItem};
pub use config::PosteriorConfig;
pub use errors::{CountStoreError, ModelError, ScoringError};
pub use models::{BetaPrior, DatasetMetadata, DispersionModel, ModelRegistry, read_metadata};
pub use pipeline::{PipelineSummary, ScoringPipeline};
pub use processor::{IntervalScorer, PosteriorScorer, ScoredPosition};
pub use queue::{Message, WorkQueue};
pub use store::{CountRow, CountStore, MemoryCountStore, TabixCountStore, open_count_store};

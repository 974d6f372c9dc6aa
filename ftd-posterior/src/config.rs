use std::path::PathBuf;
use std::thread;

use anyhow::Result;

use crate::consts::{
    DEFAULT_FDR_CUTOFF, DEFAULT_HIGH_WATER_MARK, DEFAULT_POST_CUTOFF, DEFAULT_READERS,
    DEFAULT_WINDOW_RADIUS,
};

///
/// Tunables for one posterior run.
///
#[derive(Debug, Clone)]
pub struct PosteriorConfig {
    /// Positions with FDR at or below this value feed the prior and effect-size estimates.
    pub fdr_cutoff: f64,
    /// Posterior cutoff, applied as `-ln(post_cutoff)`.
    pub post_cutoff: f64,
    pub processors: usize,
    pub readers: usize,
    /// Records in flight before readers block.
    pub high_water_mark: usize,
    pub window_radius: usize,
    /// Parent directory for the per-processor chunk files.
    pub tmp_dir: Option<PathBuf>,
    /// Leave the chunk files on disk after the merge.
    pub keep_chunks: bool,
    pub show_progress: bool,
}

impl Default for PosteriorConfig {
    fn default() -> Self {
        PosteriorConfig {
            fdr_cutoff: DEFAULT_FDR_CUTOFF,
            post_cutoff: DEFAULT_POST_CUTOFF,
            processors: default_processors(),
            readers: DEFAULT_READERS,
            high_water_mark: DEFAULT_HIGH_WATER_MARK,
            window_radius: DEFAULT_WINDOW_RADIUS,
            tmp_dir: None,
            keep_chunks: false,
            show_progress: false,
        }
    }
}

impl PosteriorConfig {
    ///
    /// Score threshold in negative-log space.
    ///
    pub fn score_threshold(&self) -> f64 {
        -self.post_cutoff.ln()
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.fdr_cutoff > 0.0 && self.fdr_cutoff <= 1.0) {
            anyhow::bail!("FDR cutoff must be in (0, 1], got {}", self.fdr_cutoff);
        }
        if !(self.post_cutoff > 0.0 && self.post_cutoff <= 1.0) {
            anyhow::bail!("Posterior cutoff must be in (0, 1], got {}", self.post_cutoff);
        }
        if self.processors == 0 {
            anyhow::bail!("At least one processor is required");
        }
        if self.readers == 0 {
            anyhow::bail!("At least one reader is required");
        }
        if self.high_water_mark == 0 {
            anyhow::bail!("Queue size must be at least 1");
        }
        Ok(())
    }
}

///
/// Available parallelism minus the units reserved for the default reader pair.
///
pub fn default_processors() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .saturating_sub(DEFAULT_READERS)
        .max(1)
}

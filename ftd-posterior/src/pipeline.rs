//! Orchestration of readers, processors and the final merge.
//!
//! The shutdown order is fixed:
//!
//! 1. start readers and processors
//! 2. join every reader
//! 3. wait until every enqueued item has been acknowledged
//! 4. enqueue one sentinel per processor
//! 5. join every processor
//! 6. merge the chunk files in processor order
//!
//! Step 3 guarantees that no sentinel is enqueued while real work is still
//! queued or being scored.
//!
//! Output rows come out grouped by processor, and within a processor in the
//! order it happened to dequeue intervals. That order is not the input
//! interval order; sort the output downstream if that matters.

use std::io::Write;
use std::path::PathBuf;
use std::thread;
use std::time::Instant;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use ftd_core::models::IntervalSet;

use crate::arrays::WorkItem;
use crate::config::PosteriorConfig;
use crate::merge::{ChunkDir, merge_chunks};
use crate::processor::{IntervalScorer, ProcessorStats, run_processor};
use crate::queue::WorkQueue;
use crate::reader::{ReaderStats, run_reader};
use crate::store::CountStore;

/// Everything observed during one run.
#[derive(Debug, Clone, Default)]
pub struct PipelineSummary {
    pub readers: Vec<ReaderStats>,
    pub processors: Vec<ProcessorStats>,
    pub sentinels_sent: usize,
    /// Byte size of each chunk before the merge, in processor order.
    pub chunk_bytes: Vec<u64>,
    pub bytes_written: u64,
    /// Chunk files left on disk when `keep_chunks` is set, in processor order.
    pub kept_chunks: Vec<PathBuf>,
}

impl PipelineSummary {
    pub fn intervals_read(&self) -> usize {
        self.readers.iter().map(|r| r.intervals).sum()
    }

    pub fn intervals_scored(&self) -> usize {
        self.processors.iter().map(|p| p.items).sum()
    }

    pub fn rows_written(&self) -> usize {
        self.processors.iter().map(|p| p.rows).sum()
    }
}

pub struct ScoringPipeline<'a, S: IntervalScorer + ?Sized> {
    config: &'a PosteriorConfig,
    stores: &'a [Box<dyn CountStore>],
    scorer: &'a S,
}

impl<'a, S: IntervalScorer + ?Sized> ScoringPipeline<'a, S> {
    pub fn new(config: &'a PosteriorConfig, stores: &'a [Box<dyn CountStore>], scorer: &'a S) -> Self {
        ScoringPipeline {
            config,
            stores,
            scorer,
        }
    }

    ///
    /// Score every interval and write the merged output to `out`.
    ///
    /// Configuration problems and failure to create the chunk files are
    /// reported before any thread starts. Per-interval problems are logged
    /// and absorbed.
    ///
    pub fn run<W: Write + ?Sized>(&self, intervals: &IntervalSet, out: &mut W) -> Result<PipelineSummary> {
        self.config.validate()?;

        let started = Instant::now();
        let processors = self.config.processors;
        let (chunk_dir, chunk_files) =
            ChunkDir::create(self.config.tmp_dir.as_deref(), processors)?;
        log::debug!("Chunk files in {}", chunk_dir.path().display());

        let queue: WorkQueue<WorkItem> = WorkQueue::bounded(self.config.high_water_mark);
        let progress = self.progress_bar(intervals.len() as u64);
        let partitions = intervals.partition(self.config.readers);

        log::info!(
            "Scoring {} intervals across {} datasets with {} readers and {} processors",
            intervals.len(),
            self.stores.len(),
            partitions.len(),
            processors
        );

        let (readers, processor_stats) = thread::scope(|s| {
            let processor_handles: Vec<_> = chunk_files
                .into_iter()
                .enumerate()
                .map(|(id, chunk)| {
                    let queue = &queue;
                    let progress = &progress;
                    let scorer = self.scorer;
                    s.spawn(move || run_processor(id, queue, scorer, chunk, progress))
                })
                .collect();

            let reader_handles: Vec<_> = partitions
                .iter()
                .enumerate()
                .map(|(id, part)| {
                    let queue = &queue;
                    let stores = self.stores;
                    s.spawn(move || run_reader(id, stores, part, queue))
                })
                .collect();

            let readers: Vec<ReaderStats> = reader_handles
                .into_iter()
                .enumerate()
                .map(|(id, h)| {
                    h.join().unwrap_or_else(|_| {
                        log::error!("reader {} panicked; its remaining intervals are lost", id);
                        ReaderStats::default()
                    })
                })
                .collect();

            queue.release_workers(processors);

            let processor_stats: Vec<ProcessorStats> = processor_handles
                .into_iter()
                .enumerate()
                .map(|(id, h)| {
                    h.join().unwrap_or_else(|_| {
                        log::error!("processor {} panicked", id);
                        ProcessorStats::default()
                    })
                })
                .collect();

            (readers, processor_stats)
        });

        progress.finish_and_clear();

        let chunk_bytes = chunk_dir
            .chunk_sizes()
            .context("Failed to inspect chunk files")?;
        let merged = merge_chunks(chunk_dir.chunk_paths(), out);
        let kept_chunks = if self.config.keep_chunks {
            chunk_dir.keep()
        } else {
            chunk_dir.cleanup();
            Vec::new()
        };
        let bytes_written = merged?;

        let summary = PipelineSummary {
            readers,
            processors: processor_stats,
            sentinels_sent: processors,
            chunk_bytes,
            bytes_written,
            kept_chunks,
        };

        let write_errors: usize = summary.processors.iter().map(|p| p.write_errors).sum();
        if write_errors > 0 {
            anyhow::bail!("{} chunk write errors; output is incomplete", write_errors);
        }

        log::info!(
            "Done in {:.1?}: {} intervals read, {} scored, {} rows written",
            started.elapsed(),
            summary.intervals_read(),
            summary.intervals_scored(),
            summary.rows_written()
        );

        Ok(summary)
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(len);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        pb.set_message("intervals scored");
        pb
    }
}

use std::fs::File;
use std::io::{BufWriter, Write};
use std::panic::{self, AssertUnwindSafe};

use indicatif::ProgressBar;
use ndarray::Array2;

use crate::arrays::WorkItem;
use crate::config::PosteriorConfig;
use crate::errors::ScoringError;
use crate::models::ModelRegistry;
use crate::queue::{Ack, Message, WorkQueue};
use crate::stats::{delta_prior, log_posterior, nanmax_by_position, prior_weighted, select_positions};

///
/// One emitted output row: a genomic position and every dataset's score
/// there, in dataset order.
///
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPosition {
    pub chrom: String,
    pub position: u32,
    pub scores: Vec<f64>,
}

impl ScoredPosition {
    pub fn write_to<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        write!(out, "{}\t{}\t{}", self.chrom, self.position, self.position + 1)?;
        for score in &self.scores {
            write!(out, "\t{}", score)?;
        }
        writeln!(out)
    }
}

///
/// Turns one work item into the rows to emit. Implementations are shared
/// by every processor thread.
///
pub trait IntervalScorer: Send + Sync {
    fn score(&self, item: &WorkItem) -> Result<Vec<ScoredPosition>, ScoringError>;
}

///
/// Posterior scoring against the per-dataset models in a [ModelRegistry].
///
pub struct PosteriorScorer<'a> {
    registry: &'a ModelRegistry,
    fdr_cutoff: f64,
    threshold: f64,
    window_radius: usize,
}

impl<'a> PosteriorScorer<'a> {
    pub fn new(registry: &'a ModelRegistry, config: &PosteriorConfig) -> Self {
        PosteriorScorer {
            registry,
            fdr_cutoff: config.fdr_cutoff,
            threshold: config.score_threshold(),
            window_radius: config.window_radius,
        }
    }

    ///
    /// Clamped posterior scores for every dataset and position of an item.
    ///
    pub fn posterior(&self, item: &WorkItem) -> Result<Array2<f64>, ScoringError> {
        let arrays = &item.arrays;
        if arrays.datasets() != self.registry.len() {
            return Err(ScoringError::DatasetMismatch {
                expected: self.registry.len(),
                found: arrays.datasets(),
            });
        }

        let prior = prior_weighted(&arrays.fdr, &arrays.w, self.fdr_cutoff);
        let delta = delta_prior(
            &arrays.obs,
            &arrays.exp,
            &arrays.fdr,
            &arrays.w,
            self.registry.priors(),
            self.fdr_cutoff,
        );

        let mut ll_on = Array2::zeros(arrays.obs.raw_dim());
        let mut ll_off = Array2::zeros(arrays.obs.raw_dim());
        for d in 0..arrays.datasets() {
            let model = self.registry.model(d);
            let obs = arrays.obs.row(d);
            let exp = arrays.exp.row(d);

            ll_on
                .row_mut(d)
                .assign(&model.log_likelihood(obs, exp, Some(delta.row(d)), self.window_radius));
            ll_off
                .row_mut(d)
                .assign(&model.log_likelihood(obs, exp, None, self.window_radius));
        }

        Ok(log_posterior(&prior, &ll_on, &ll_off))
    }
}

impl IntervalScorer for PosteriorScorer<'_> {
    fn score(&self, item: &WorkItem) -> Result<Vec<ScoredPosition>, ScoringError> {
        let post = self.posterior(item)?;
        let maxes = nanmax_by_position(&post);

        Ok(select_positions(&maxes, self.threshold)
            .into_iter()
            .map(|j| ScoredPosition {
                chrom: item.interval.chrom().to_string(),
                position: item.interval.start() + j as u32,
                scores: post.column(j).to_vec(),
            })
            .collect())
    }
}

/// What a processor did before it saw its sentinel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessorStats {
    pub items: usize,
    pub rows: usize,
    pub scoring_errors: usize,
    pub write_errors: usize,
    pub saw_sentinel: bool,
}

///
/// Drain the queue into a private chunk file until a sentinel arrives.
///
/// Every dequeued message is acknowledged exactly once, whether scoring and
/// writing succeed or not. A failing or panicking item is logged and
/// skipped; the processor only stops on its sentinel, so the queue keeps
/// draining and [WorkQueue::join_all] can always complete.
///
pub fn run_processor<S: IntervalScorer + ?Sized>(
    id: usize,
    queue: &WorkQueue<WorkItem>,
    scorer: &S,
    chunk: File,
    progress: &ProgressBar,
) -> ProcessorStats {
    let mut stats = ProcessorStats::default();
    let mut writer = BufWriter::new(chunk);

    loop {
        let message = queue.get();
        let _ack = Ack::new(queue);

        let item = match message {
            Message::Item(item) => item,
            Message::Sentinel => {
                stats.saw_sentinel = true;
                break;
            }
        };

        stats.items += 1;
        let scored = panic::catch_unwind(AssertUnwindSafe(|| scorer.score(&item)));
        match scored {
            Ok(Ok(rows)) => {
                for row in &rows {
                    if let Err(e) = row.write_to(&mut writer) {
                        stats.write_errors += 1;
                        log::warn!("processor {}: write failed: {}", id, e);
                        break;
                    }
                    stats.rows += 1;
                }
            }
            Ok(Err(e)) => {
                stats.scoring_errors += 1;
                log::warn!(
                    "processor {}: can't score {}: {}",
                    id,
                    item.interval.region_string(),
                    e
                );
            }
            Err(_) => {
                stats.scoring_errors += 1;
                log::warn!(
                    "processor {}: scoring panicked on {}",
                    id,
                    item.interval.region_string()
                );
            }
        }
        progress.inc(1);
    }

    if let Err(e) = writer.flush() {
        stats.write_errors += 1;
        log::warn!("processor {}: flushing chunk failed: {}", id, e);
    }

    log::debug!(
        "processor {}: done ({} items, {} rows)",
        id,
        stats.items,
        stats.rows
    );

    stats
}

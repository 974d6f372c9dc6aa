use ftd_core::models::GenomicInterval;

use crate::arrays::{PerDatasetArrays, WorkItem};
use crate::queue::WorkQueue;
use crate::store::{CountCursor, CountStore};

/// Counters reported by a reader when its partition is exhausted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReaderStats {
    pub intervals: usize,
    pub rows: usize,
    pub failed_queries: usize,
}

///
/// Build the per-dataset arrays for one interval.
///
/// Each dataset is queried independently. A failed query, or a dataset
/// whose cursor could not be opened (`None`), leaves that dataset's row at
/// the missing-data defaults; the other datasets are unaffected. Rows
/// outside the interval are ignored.
///
pub fn extract_interval(
    cursors: &mut [Option<Box<dyn CountCursor + '_>>],
    interval: &GenomicInterval,
    stats: &mut ReaderStats,
) -> PerDatasetArrays {
    let mut arrays = PerDatasetArrays::new(cursors.len(), interval.len());

    for (dataset, cursor) in cursors.iter_mut().enumerate() {
        let Some(cursor) = cursor else {
            continue;
        };

        match cursor.fetch(interval) {
            Ok(rows) => {
                for row in rows.iter() {
                    if let Some(offset) = interval.offset_of(row.position) {
                        arrays.record(dataset, offset, row);
                        stats.rows += 1;
                    }
                }
            }
            Err(e) => {
                stats.failed_queries += 1;
                log::warn!(
                    "Count query failed for dataset {} at {}: {}",
                    dataset,
                    interval.region_string(),
                    e
                );
            }
        }
    }

    arrays
}

///
/// Fetch counts for each assigned interval, in order, and enqueue one
/// [WorkItem] per interval. Blocks in `put` while the queue is full.
///
/// Cursors are opened once up front. The reader never enqueues a sentinel.
///
pub fn run_reader(
    id: usize,
    stores: &[Box<dyn CountStore>],
    intervals: &[GenomicInterval],
    queue: &WorkQueue<WorkItem>,
) -> ReaderStats {
    let mut stats = ReaderStats::default();

    let mut cursors: Vec<Option<Box<dyn CountCursor + '_>>> = stores
        .iter()
        .enumerate()
        .map(|(dataset, store)| match store.open() {
            Ok(cursor) => Some(cursor),
            Err(e) => {
                log::warn!("reader {}: can't open dataset {}: {}", id, dataset, e);
                None
            }
        })
        .collect();

    log::debug!("reader {}: {} intervals assigned", id, intervals.len());

    for interval in intervals {
        let arrays = extract_interval(&mut cursors, interval, &mut stats);
        queue.put(WorkItem::new(interval.clone(), arrays));
        stats.intervals += 1;
    }

    // cursors close here
    drop(cursors);
    log::debug!(
        "reader {}: done ({} intervals, {} rows, {} failed queries)",
        id,
        stats.intervals,
        stats.rows,
        stats.failed_queries
    );

    stats
}

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rstest::*;
use tempfile::{TempDir, tempdir};

use ftd_core::models::{GenomicInterval, IntervalSet};
use ftd_posterior::errors::ScoringError;
use ftd_posterior::models::{BetaPrior, DispersionModel, ModelRegistry, read_metadata};
use ftd_posterior::queue::{Ack, Message, WorkQueue};
use ftd_posterior::reader::{ReaderStats, extract_interval};
use ftd_posterior::stats::nanmax_by_position;
use ftd_posterior::store::{CountCursor, CountRow, CountStore, MemoryCountStore};
use ftd_posterior::{
    CountStoreError, IntervalScorer, ModelError, PosteriorConfig, PosteriorScorer,
    ScoredPosition, ScoringPipeline, WorkItem,
};

const NB_MODEL_JSON: &str = r#"{
    "mu": [0.5, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0],
    "r": [2.0, 2.0, 2.0, 2.5, 2.5, 3.0, 3.0, 3.0, 3.5, 3.5, 4.0],
    "mu_params": [0.0, 1.0],
    "r_params": [1.0, 0.3]
}"#;

/// Likelihood 0 everywhere, so "on" and "off" never differ.
struct FlatModel;

impl DispersionModel for FlatModel {
    fn log_pmf(&self, _observed: f64, _expected: f64, _scale: f64) -> f64 {
        0.0
    }
}

/// Records every item it is handed and emits nothing.
#[derive(Default)]
struct RecordingScorer {
    seen: Mutex<Vec<WorkItem>>,
}

impl IntervalScorer for RecordingScorer {
    fn score(&self, item: &WorkItem) -> Result<Vec<ScoredPosition>, ScoringError> {
        self.seen.lock().unwrap().push(item.clone());
        Ok(Vec::new())
    }
}

/// Panics on every `chr2` interval and emits one row for the rest.
struct PanickingScorer;

impl IntervalScorer for PanickingScorer {
    fn score(&self, item: &WorkItem) -> Result<Vec<ScoredPosition>, ScoringError> {
        if item.interval.chrom() == "chr2" {
            panic!("scoring failed on {}", item.interval.region_string());
        }
        Ok(vec![ScoredPosition {
            chrom: item.interval.chrom().to_string(),
            position: item.interval.start(),
            scores: vec![0.5],
        }])
    }
}

struct FailingStore;

struct FailingCursor;

impl CountCursor for FailingCursor {
    fn fetch(&mut self, interval: &GenomicInterval) -> Result<Vec<CountRow>, CountStoreError> {
        Err(CountStoreError::Query {
            region: interval.region_string(),
            reason: "simulated outage".to_string(),
        })
    }
}

impl CountStore for FailingStore {
    fn open(&self) -> Result<Box<dyn CountCursor + '_>, CountStoreError> {
        Ok(Box::new(FailingCursor))
    }
}

#[fixture]
fn tiled_intervals() -> IntervalSet {
    let intervals: Vec<GenomicInterval> = (0..57)
        .map(|i| {
            let chrom = if i % 2 == 0 { "chr1" } else { "chr2" };
            GenomicInterval::new(chrom, i * 100, i * 100 + 20).unwrap()
        })
        .collect();
    IntervalSet::from(intervals)
}

fn flat_registry(datasets: usize) -> ModelRegistry {
    ModelRegistry::from_parts(
        (0..datasets).map(|d| format!("ds{}", d)).collect(),
        (0..datasets)
            .map(|_| Arc::new(FlatModel) as Arc<dyn DispersionModel>)
            .collect(),
        vec![BetaPrior::default(); datasets],
    )
}

fn config(processors: usize, readers: usize, tmp: &TempDir) -> PosteriorConfig {
    PosteriorConfig {
        processors,
        readers,
        high_water_mark: 4,
        tmp_dir: Some(tmp.path().to_owned()),
        ..Default::default()
    }
}

fn write(dir: &Path, name: &str, contents: &str) -> String {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path.to_string_lossy().into_owned()
}

mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[rstest]
    #[case(1, 1)]
    #[case(2, 3)]
    #[case(3, 8)]
    fn test_every_interval_is_scored_exactly_once(
        tiled_intervals: IntervalSet,
        #[case] readers: usize,
        #[case] processors: usize,
    ) {
        let tmp = tempdir().unwrap();
        let stores: Vec<Box<dyn CountStore>> = vec![Box::new(MemoryCountStore::new())];
        let scorer = RecordingScorer::default();
        let config = config(processors, readers, &tmp);

        let mut out = Vec::new();
        let summary = ScoringPipeline::new(&config, &stores, &scorer)
            .run(&tiled_intervals, &mut out)
            .unwrap();

        let mut counts: HashMap<GenomicInterval, usize> = HashMap::new();
        for item in scorer.seen.lock().unwrap().iter() {
            *counts.entry(item.interval.clone()).or_default() += 1;
        }

        assert_eq!(counts.len(), tiled_intervals.len());
        assert!(tiled_intervals.iter().all(|i| counts.get(i) == Some(&1)));
        assert_eq!(summary.intervals_read(), tiled_intervals.len());
        assert_eq!(summary.intervals_scored(), tiled_intervals.len());
        assert!(summary.processors.iter().all(|p| p.saw_sentinel));
        assert!(out.is_empty());
    }

    #[rstest]
    #[case(7)]
    #[case(42)]
    #[case(2024)]
    fn test_sentinels_follow_all_real_items(#[case] seed: u64) {
        #[derive(Debug, PartialEq)]
        enum Event {
            Item,
            Sentinel,
        }

        let producers = 2;
        let consumers = 3;
        let per_producer = 40;
        let queue: WorkQueue<u64> = WorkQueue::bounded(5);
        let events = Mutex::new(Vec::new());

        thread::scope(|s| {
            let consumer_handles: Vec<_> = (0..consumers)
                .map(|c| {
                    let queue = &queue;
                    let events = &events;
                    s.spawn(move || {
                        let mut rng = StdRng::seed_from_u64(seed + 100 + c as u64);
                        loop {
                            let message = queue.get();
                            let _ack = Ack::new(queue);
                            match message {
                                Message::Item(_) => {
                                    thread::sleep(Duration::from_micros(rng.random_range(0..400)));
                                    events.lock().unwrap().push(Event::Item);
                                }
                                Message::Sentinel => {
                                    events.lock().unwrap().push(Event::Sentinel);
                                    break;
                                }
                            }
                        }
                    })
                })
                .collect();

            let producer_handles: Vec<_> = (0..producers)
                .map(|p| {
                    let queue = &queue;
                    s.spawn(move || {
                        let mut rng = StdRng::seed_from_u64(seed + p as u64);
                        for i in 0..per_producer {
                            thread::sleep(Duration::from_micros(rng.random_range(0..200)));
                            queue.put(i);
                        }
                    })
                })
                .collect();

            for h in producer_handles {
                h.join().unwrap();
            }
            queue.release_workers(consumers);
            for h in consumer_handles {
                h.join().unwrap();
            }
        });

        let events = events.into_inner().unwrap();
        let first_sentinel = events
            .iter()
            .position(|e| *e == Event::Sentinel)
            .unwrap();

        assert_eq!(first_sentinel, producers * per_producer as usize);
        assert!(events[first_sentinel..].iter().all(|e| *e == Event::Sentinel));
        assert_eq!(events.len() - first_sentinel, consumers);
        assert_eq!(queue.unfinished(), 0);
    }

    #[rstest]
    fn test_missing_dataset_rows_keep_defaults() {
        let empty = MemoryCountStore::new();
        let other_chrom: MemoryCountStore =
            [("chr9", CountRow::new(3, 4.0, 4.0, 0.01))].into_iter().collect();
        let interval = GenomicInterval::new("chr1", 0, 6).unwrap();
        let mut cursors = vec![Some(empty.open().unwrap()), Some(other_chrom.open().unwrap())];

        let arrays = extract_interval(&mut cursors, &interval, &mut ReaderStats::default());
        for d in 0..2 {
            assert!(arrays.exp.row(d).iter().all(|&v| v == 0.0));
            assert!(arrays.obs.row(d).iter().all(|&v| v == 0.0));
            assert!(arrays.fdr.row(d).iter().all(|&v| v == 1.0));
            assert!(arrays.w.row(d).iter().all(|&v| v == 0.0));
        }
    }

    #[rstest]
    #[case(1)]
    #[case(99)]
    fn test_scores_are_floored_and_filtered(#[case] seed: u64) {
        let tmp = tempdir().unwrap();
        let model_path = write(tmp.path(), "nb.json", NB_MODEL_JSON);
        let model = ftd_posterior::models::NegativeBinomialModel::from_json_file(Path::new(
            &model_path,
        ))
        .unwrap();
        let registry = ModelRegistry::from_parts(
            vec!["a".to_string(), "b".to_string()],
            vec![Arc::new(model.clone()), Arc::new(model)],
            vec![BetaPrior::default(), BetaPrior::new(0.5, 1.5)],
        );
        let config = PosteriorConfig::default();
        let scorer = PosteriorScorer::new(&registry, &config);
        let threshold = config.score_threshold();

        let mut rng = StdRng::seed_from_u64(seed);
        for _ in 0..20 {
            let interval = GenomicInterval::new("chr3", 1000, 1040).unwrap();
            let mut arrays = ftd_posterior::PerDatasetArrays::new(2, interval.len());
            for d in 0..2 {
                for offset in 0..interval.len() {
                    if rng.random_bool(0.2) {
                        continue;
                    }
                    let expected = rng.random_range(0.0..15.0_f64).round();
                    let observed = if rng.random_bool(0.5) {
                        0.0
                    } else {
                        rng.random_range(0.0..20.0_f64).round()
                    };
                    let fdr = rng.random_range(0.0..0.2);
                    let row = CountRow::new(1000 + offset as u64, expected, observed, fdr);
                    arrays.record(d, offset, &row);
                }
            }
            let item = WorkItem::new(interval, arrays);

            let post = scorer.posterior(&item).unwrap();
            assert!(post.iter().all(|v| v.is_nan() || *v >= 0.0));

            let maxes = nanmax_by_position(&post);
            let emitted: Vec<u32> = scorer
                .score(&item)
                .unwrap()
                .iter()
                .map(|row| {
                    assert!(row.scores.iter().all(|v| !(*v < 0.0)));
                    row.position - 1000
                })
                .collect();
            let expected: Vec<u32> = (0..maxes.len())
                .filter(|&j| maxes[j] > threshold)
                .map(|j| j as u32)
                .collect();
            assert_eq!(emitted, expected);
        }
    }

    #[rstest]
    fn test_output_is_the_concatenation_of_chunks() {
        let tmp = tempdir().unwrap();
        let store: MemoryCountStore = (0..30)
            .map(|p| ("chr1", CountRow::new(p, 10.0, 0.0, 0.001)))
            .collect();
        let stores: Vec<Box<dyn CountStore>> = vec![Box::new(store)];
        let model_path = write(tmp.path(), "nb.json", NB_MODEL_JSON);
        let model =
            ftd_posterior::models::NegativeBinomialModel::from_json_file(Path::new(&model_path))
                .unwrap();
        let registry = ModelRegistry::from_parts(
            vec!["a".to_string()],
            vec![Arc::new(model)],
            vec![BetaPrior::default()],
        );
        let config = PosteriorConfig {
            keep_chunks: true,
            ..config(3, 2, &tmp)
        };
        let scorer = PosteriorScorer::new(&registry, &config);
        let intervals = IntervalSet::from(
            (0..3)
                .map(|i| GenomicInterval::new("chr1", i * 10, i * 10 + 10).unwrap())
                .collect::<Vec<_>>(),
        );

        let mut out = Vec::new();
        let summary = ScoringPipeline::new(&config, &stores, &scorer)
            .run(&intervals, &mut out)
            .unwrap();

        assert_eq!(summary.chunk_bytes.len(), 3);
        assert_eq!(summary.chunk_bytes.iter().sum::<u64>(), out.len() as u64);
        assert_eq!(summary.bytes_written, out.len() as u64);

        assert_eq!(summary.kept_chunks.len(), 3);
        let mut concatenated = Vec::new();
        for (chunk, &size) in summary.kept_chunks.iter().zip(&summary.chunk_bytes) {
            let bytes = fs::read(chunk).unwrap();
            assert_eq!(bytes.len() as u64, size);
            concatenated.extend(bytes);
        }
        assert_eq!(concatenated, out);

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), summary.rows_written());
        for line in text.lines() {
            let fields: Vec<&str> = line.split('\t').collect();
            assert_eq!(fields.len(), 4);
            assert_eq!(fields[0], "chr1");
            let start: u32 = fields[1].parse().unwrap();
            let end: u32 = fields[2].parse().unwrap();
            assert_eq!(end, start + 1);
        }
    }

    #[rstest]
    fn test_flat_model_single_interval() {
        let tmp = tempdir().unwrap();
        let store: MemoryCountStore = [("chr1", CountRow::new(101, 10.0, 10.0, 0.01))]
            .into_iter()
            .collect();
        let stores: Vec<Box<dyn CountStore>> = vec![Box::new(store)];
        let interval = GenomicInterval::new("chr1", 100, 103).unwrap();

        let mut cursors = vec![Some(stores[0].open().unwrap())];
        let arrays = extract_interval(&mut cursors, &interval, &mut ReaderStats::default());
        drop(cursors);
        assert_eq!(arrays.exp.row(0).to_vec(), vec![0.0, 10.0, 0.0]);
        assert_eq!(arrays.obs.row(0).to_vec(), vec![0.0, 10.0, 0.0]);
        assert_eq!(arrays.fdr.row(0).to_vec(), vec![1.0, 0.01, 1.0]);
        assert_eq!(arrays.w.row(0).to_vec(), vec![0.0, 1.0, 0.0]);

        let registry = flat_registry(1);
        let config = config(2, 2, &tmp);
        let scorer = PosteriorScorer::new(&registry, &config);
        let post = scorer
            .posterior(&WorkItem::new(interval.clone(), arrays))
            .unwrap();
        assert_eq!(post.row(0).to_vec(), vec![0.0, 0.0, 0.0]);

        // a score of exactly 0 never clears the positive default threshold
        let mut out = Vec::new();
        let summary = ScoringPipeline::new(&config, &stores, &scorer)
            .run(&IntervalSet::from(vec![interval]), &mut out)
            .unwrap();
        assert_eq!(summary.intervals_scored(), 1);
        assert!(out.is_empty());
    }

    #[rstest]
    fn test_metadata_priors_load_in_row_order() {
        let tmp = tempdir().unwrap();
        let dir = tmp.path();
        let model = write(dir, "nb.json", NB_MODEL_JSON);
        let counts_a = write(dir, "a.tsv", "chr1\t0\t1\t1\t1\t0\t0\t0.5\n");
        let counts_b = write(dir, "b.tsv", "chr1\t0\t1\t1\t1\t0\t0\t0.5\n");
        let prior = write(dir, "a.prior", "0.5\t1.5\n");
        let metadata = write(
            dir,
            "datasets.tsv",
            &format!(
                "# id\tmodel\tcounts\tprior\nsample_a\t{}\t{}\t{}\nsample_b\t{}\t{}\t!\n",
                model, counts_a, prior, model, counts_b
            ),
        );

        let rows = read_metadata(Path::new(&metadata)).unwrap();
        let registry = ModelRegistry::load(&rows).unwrap();

        assert_eq!(registry.ids(), &["sample_a".to_string(), "sample_b".to_string()]);
        assert_eq!(
            registry.priors(),
            &[BetaPrior::new(0.5, 1.5), BetaPrior::new(1.0, 1.0)]
        );
    }

    #[rstest]
    fn test_missing_count_store_is_fatal() {
        let tmp = tempdir().unwrap();
        let model = write(tmp.path(), "nb.json", NB_MODEL_JSON);
        let metadata = write(
            tmp.path(),
            "datasets.tsv",
            &format!("sample_a\t{}\t/no/such/counts.bgz\t!\n", model),
        );

        let rows = read_metadata(Path::new(&metadata)).unwrap();
        assert!(matches!(
            ModelRegistry::load(&rows),
            Err(ModelError::MissingFile { .. })
        ));
    }

    #[rstest]
    fn test_failing_dataset_does_not_hide_other_datasets() {
        let tmp = tempdir().unwrap();
        let good: MemoryCountStore = [("chr1", CountRow::new(52, 6.0, 2.0, 0.01))]
            .into_iter()
            .collect();
        let stores: Vec<Box<dyn CountStore>> = vec![Box::new(FailingStore), Box::new(good)];
        let scorer = RecordingScorer::default();
        let config = config(2, 1, &tmp);
        let interval = GenomicInterval::new("chr1", 50, 55).unwrap();

        let mut out = Vec::new();
        let summary = ScoringPipeline::new(&config, &stores, &scorer)
            .run(&IntervalSet::from(vec![interval]), &mut out)
            .unwrap();

        let seen = scorer.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let arrays = &seen[0].arrays;
        assert_eq!(arrays.w.row(0).to_vec(), vec![0.0; 5]);
        assert_eq!(arrays.w.row(1).to_vec(), vec![0.0, 0.0, 1.0, 0.0, 0.0]);
        assert_eq!(arrays.obs[[1, 2]], 2.0);
        assert_eq!(summary.readers[0].failed_queries, 1);
    }

    #[rstest]
    fn test_no_work_still_stops_every_processor() {
        let tmp = tempdir().unwrap();
        let stores: Vec<Box<dyn CountStore>> = vec![Box::new(MemoryCountStore::new())];
        let scorer = RecordingScorer::default();
        let config = config(3, 2, &tmp);

        let mut out = Vec::new();
        let summary = ScoringPipeline::new(&config, &stores, &scorer)
            .run(&IntervalSet::default(), &mut out)
            .unwrap();

        assert_eq!(summary.sentinels_sent, 3);
        assert_eq!(summary.processors.len(), 3);
        assert!(summary.processors.iter().all(|p| p.saw_sentinel && p.items == 0));
        assert_eq!(summary.chunk_bytes, vec![0, 0, 0]);
        assert_eq!(summary.bytes_written, 0);
        assert!(summary.kept_chunks.is_empty());
        assert!(out.is_empty());

        // the chunk directory is gone once the merge is done
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[rstest]
    fn test_panicking_scorer_does_not_hang_the_run(tiled_intervals: IntervalSet) {
        let tmp = tempdir().unwrap();
        let stores: Vec<Box<dyn CountStore>> = vec![Box::new(MemoryCountStore::new())];
        let scorer = PanickingScorer;
        let config = PosteriorConfig {
            high_water_mark: 1,
            ..config(3, 2, &tmp)
        };

        let mut out = Vec::new();
        let summary = ScoringPipeline::new(&config, &stores, &scorer)
            .run(&tiled_intervals, &mut out)
            .unwrap();

        assert_eq!(summary.intervals_scored(), tiled_intervals.len());
        assert!(summary.processors.iter().all(|p| p.saw_sentinel));
        let errors: usize = summary.processors.iter().map(|p| p.scoring_errors).sum();
        assert_eq!(errors, tiled_intervals.iter().filter(|i| i.chrom() == "chr2").count());
        assert_eq!(
            String::from_utf8(out).unwrap().lines().count(),
            tiled_intervals.len() - errors
        );
    }

    #[rstest]
    fn test_invalid_config_fails_before_any_work() {
        let tmp = tempdir().unwrap();
        let stores: Vec<Box<dyn CountStore>> = vec![Box::new(MemoryCountStore::new())];
        let scorer = RecordingScorer::default();
        let config = PosteriorConfig {
            processors: 0,
            ..config(1, 1, &tmp)
        };

        let mut out = Vec::new();
        let result = ScoringPipeline::new(&config, &stores, &scorer)
            .run(&IntervalSet::from(vec![GenomicInterval::new("chr1", 0, 5).unwrap()]), &mut out);
        assert!(result.is_err());
        assert!(scorer.seen.lock().unwrap().is_empty());
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 0);
    }
}

//! Per-dataset count stores, queried by genomic range.
//!
//! Readers open one [CountCursor] per dataset and reuse it for every interval
//! they are assigned. Two stores are provided: a bgzip-compressed,
//! tabix-indexed table read with `noodles`, and an in-memory table for small
//! inputs.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use noodles::bgzf;
use noodles::core::Region;
use noodles::tabix;

use ftd_core::models::GenomicInterval;
use ftd_core::utils::get_dynamic_reader;

use crate::consts::{EXPECTED_COLUMN, FDR_COLUMN, OBSERVED_COLUMN, POSITION_COLUMN};
use crate::errors::CountStoreError;

///
/// One count store row, reduced to the columns scoring needs.
///
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CountRow {
    /// 0-based genomic position
    pub position: u64,
    pub expected: f64,
    pub observed: f64,
    pub fdr: f64,
}

impl CountRow {
    pub fn new(position: u64, expected: f64, observed: f64, fdr: f64) -> Self {
        CountRow {
            position,
            expected,
            observed,
            fdr,
        }
    }

    ///
    /// Parse a tab-separated row; position, expected, observed and FDR are
    /// read from columns 1, 3, 4 and 7 (0-based).
    ///
    pub fn from_line(line: &str) -> Result<Self, CountStoreError> {
        let fields: Vec<&str> = line.split('\t').collect();
        let malformed = || CountStoreError::MalformedRow(line.to_string());

        if fields.len() <= FDR_COLUMN {
            return Err(malformed());
        }

        let position = fields[POSITION_COLUMN]
            .parse::<u64>()
            .map_err(|_| malformed())?;
        let parse = |idx: usize| fields[idx].parse::<f64>().map_err(|_| malformed());

        Ok(CountRow {
            position,
            expected: parse(EXPECTED_COLUMN)?,
            observed: parse(OBSERVED_COLUMN)?,
            fdr: parse(FDR_COLUMN)?,
        })
    }
}

/// Random-access cursor over one dataset's counts.
pub trait CountCursor {
    /// Rows overlapping `[interval.start, interval.end)`.
    fn fetch(&mut self, interval: &GenomicInterval) -> Result<Vec<CountRow>, CountStoreError>;
}

/// Source of cursors. Stores are shared between reader threads; each reader
/// opens its own cursor.
pub trait CountStore: Send + Sync {
    fn open(&self) -> Result<Box<dyn CountCursor + '_>, CountStoreError>;
}

///
/// Bgzip-compressed table with a tabix index next to it (`<path>.tbi`).
///
#[derive(Debug, Clone)]
pub struct TabixCountStore {
    path: PathBuf,
}

impl TabixCountStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        TabixCountStore { path: path.into() }
    }

    pub fn index_path(path: &Path) -> PathBuf {
        let mut index = path.as_os_str().to_owned();
        index.push(".tbi");
        PathBuf::from(index)
    }
}

impl CountStore for TabixCountStore {
    fn open(&self) -> Result<Box<dyn CountCursor + '_>, CountStoreError> {
        let reader = tabix::io::indexed_reader::Builder::default()
            .build_from_path(&self.path)
            .map_err(|e| CountStoreError::Open {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;

        Ok(Box::new(TabixCursor { reader }))
    }
}

struct TabixCursor {
    reader: noodles::csi::io::IndexedReader<bgzf::Reader<File>, tabix::Index>,
}

impl CountCursor for TabixCursor {
    fn fetch(&mut self, interval: &GenomicInterval) -> Result<Vec<CountRow>, CountStoreError> {
        let raw_region = interval.region_string();
        let region: Region = raw_region
            .parse()
            .map_err(|_| CountStoreError::InvalidRegion(raw_region.clone()))?;

        let query = self
            .reader
            .query(&region)
            .map_err(|e| CountStoreError::Query {
                region: raw_region.clone(),
                reason: e.to_string(),
            })?;

        let mut rows = Vec::new();
        for result in query {
            let record = result?;
            match CountRow::from_line(record.as_ref()) {
                Ok(row) => rows.push(row),
                Err(e) => log::debug!("Skipping row in {}: {}", raw_region, e),
            }
        }

        Ok(rows)
    }
}

///
/// Count table held in memory, keyed by chromosome with rows sorted by
/// position.
///
#[derive(Debug, Clone, Default)]
pub struct MemoryCountStore {
    rows: HashMap<String, Vec<CountRow>>,
}

impl MemoryCountStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, chrom: &str, row: CountRow) {
        let rows = self.rows.entry(chrom.to_string()).or_default();
        let idx = rows.partition_point(|r| r.position <= row.position);
        rows.insert(idx, row);
    }

    ///
    /// Load a plain (optionally gzipped) count table. Column 0 holds the
    /// chromosome; malformed rows are skipped.
    ///
    pub fn from_path(path: &Path) -> Result<Self, CountStoreError> {
        let reader = get_dynamic_reader(path).map_err(|e| CountStoreError::Open {
            path: path.to_owned(),
            reason: format!("{:#}", e),
        })?;

        let mut store = MemoryCountStore::new();
        let mut skipped = 0usize;
        for line in reader.lines() {
            let line = line?;
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let chrom = line.split('\t').next().unwrap_or_default();
            match CountRow::from_line(&line) {
                Ok(row) => store.insert(chrom, row),
                Err(_) => skipped += 1,
            }
        }

        if skipped > 0 {
            log::warn!("Skipped {} malformed rows in {}", skipped, path.display());
        }

        Ok(store)
    }
}

impl<'a> FromIterator<(&'a str, CountRow)> for MemoryCountStore {
    fn from_iter<T: IntoIterator<Item = (&'a str, CountRow)>>(iter: T) -> Self {
        let mut store = MemoryCountStore::new();
        for (chrom, row) in iter {
            store.insert(chrom, row);
        }
        store
    }
}

impl CountStore for MemoryCountStore {
    fn open(&self) -> Result<Box<dyn CountCursor + '_>, CountStoreError> {
        Ok(Box::new(MemoryCursor { store: self }))
    }
}

struct MemoryCursor<'a> {
    store: &'a MemoryCountStore,
}

impl CountCursor for MemoryCursor<'_> {
    fn fetch(&mut self, interval: &GenomicInterval) -> Result<Vec<CountRow>, CountStoreError> {
        let Some(rows) = self.store.rows.get(interval.chrom()) else {
            return Ok(Vec::new());
        };

        let start = interval.start() as u64;
        let end = interval.end() as u64;
        let lo = rows.partition_point(|r| r.position < start);
        let hi = rows.partition_point(|r| r.position < end);

        Ok(rows[lo..hi].to_vec())
    }
}

///
/// Open the count store at `path`: tabix-indexed when a `.tbi` index sits
/// next to it, otherwise loaded into memory.
///
pub fn open_count_store(path: &Path) -> Result<Box<dyn CountStore>, CountStoreError> {
    if TabixCountStore::index_path(path).exists() {
        Ok(Box::new(TabixCountStore::new(path)))
    } else {
        log::info!(
            "No tabix index for {}, loading count table into memory",
            path.display()
        );
        Ok(Box::new(MemoryCountStore::from_path(path)?))
    }
}

use ndarray::Array2;

use ftd_core::models::GenomicInterval;

use crate::store::CountRow;

///
/// Four aligned `datasets x length` matrices for one interval.
///
/// Positions without a source row keep the defaults: `exp = 0`, `obs = 0`,
/// `fdr = 1.0`, `w = 0`. `w` is the authoritative missingness flag; an
/// FDR of exactly 1.0 can also be real data.
///
#[derive(Debug, Clone, PartialEq)]
pub struct PerDatasetArrays {
    pub exp: Array2<f64>,
    pub obs: Array2<f64>,
    pub fdr: Array2<f64>,
    pub w: Array2<f64>,
}

impl PerDatasetArrays {
    pub fn new(datasets: usize, length: usize) -> Self {
        let shape = (datasets, length);
        PerDatasetArrays {
            exp: Array2::zeros(shape),
            obs: Array2::zeros(shape),
            fdr: Array2::from_elem(shape, 1.0),
            w: Array2::zeros(shape),
        }
    }

    pub fn datasets(&self) -> usize {
        self.exp.nrows()
    }

    pub fn len(&self) -> usize {
        self.exp.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store one row at `[dataset][offset]` and mark the cell present.
    pub fn record(&mut self, dataset: usize, offset: usize, row: &CountRow) {
        self.exp[[dataset, offset]] = row.expected;
        self.obs[[dataset, offset]] = row.observed;
        self.fdr[[dataset, offset]] = row.fdr;
        self.w[[dataset, offset]] = 1.0;
    }

    pub fn is_present(&self, dataset: usize, offset: usize) -> bool {
        self.w[[dataset, offset]] != 0.0
    }
}

///
/// One unit of work: an interval and its extracted counts. Ownership moves
/// from the reader that built it to the single processor that dequeues it.
///
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub interval: GenomicInterval,
    pub arrays: PerDatasetArrays,
}

impl WorkItem {
    pub fn new(interval: GenomicInterval, arrays: PerDatasetArrays) -> Self {
        WorkItem { interval, arrays }
    }
}

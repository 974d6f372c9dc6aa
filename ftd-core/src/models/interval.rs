use std::fmt::{self, Display};

use crate::errors::IntervalError;

///
/// A half-open, 0-based genomic interval `[start, end)` on one chromosome.
///
/// Values are immutable once built; [GenomicInterval::new] rejects
/// intervals whose end precedes their start.
///
#[derive(Eq, PartialEq, Hash, Debug, Clone)]
pub struct GenomicInterval {
    chrom: String,
    start: u32,
    end: u32,
}

impl GenomicInterval {
    pub fn new(chrom: impl Into<String>, start: u32, end: u32) -> Result<Self, IntervalError> {
        let chrom = chrom.into();
        if end < start {
            return Err(IntervalError::InvertedInterval(format!(
                "{}:{}-{}",
                chrom, start, end
            )));
        }
        Ok(GenomicInterval { chrom, start, end })
    }

    pub fn chrom(&self) -> &str {
        &self.chrom
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    ///
    /// Number of nucleotides covered: `end - start`
    ///
    pub fn len(&self) -> usize {
        (self.end - self.start) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    ///
    /// Offset of a genomic position relative to the interval start, or
    /// `None` when the position falls outside `[start, end)`.
    ///
    pub fn offset_of(&self, position: u64) -> Option<usize> {
        if position >= self.start as u64 && position < self.end as u64 {
            Some((position - self.start as u64) as usize)
        } else {
            None
        }
    }

    ///
    /// Region string in 1-based, fully closed coordinates (`chr1:11-20`),
    /// the form expected by indexed readers.
    ///
    pub fn region_string(&self) -> String {
        format!("{}:{}-{}", self.chrom, self.start + 1, self.end)
    }

    pub fn as_string(&self) -> String {
        format!("{}\t{}\t{}", self.chrom, self.start, self.end)
    }
}

impl Display for GenomicInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

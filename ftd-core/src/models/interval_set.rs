use std::io::BufRead;
use std::path::{Path, PathBuf};

use crate::errors::IntervalError;
use crate::models::GenomicInterval;
use crate::utils::get_dynamic_reader;

///
/// IntervalSet struct, the ordered collection of intervals read from a
/// BED-like file.
///
/// Unlike a sorted region set, the file order is kept verbatim: it is the
/// order intervals are handed out to readers.
///
#[derive(Clone, Debug, Default)]
pub struct IntervalSet {
    pub intervals: Vec<GenomicInterval>,
    pub header: Option<String>,
    pub path: Option<PathBuf>,
}

impl TryFrom<&Path> for IntervalSet {
    type Error = IntervalError;

    ///
    /// Create a new [IntervalSet] from a bed file (optionally gzipped).
    ///
    /// # Arguments:
    /// - value: path to bed file on disk.
    fn try_from(value: &Path) -> Result<Self, Self::Error> {
        let reader = get_dynamic_reader(value)
            .map_err(|e| IntervalError::FileReadError(format!("{}: {}", value.display(), e)))?;

        let mut intervals: Vec<GenomicInterval> = Vec::new();
        let mut header = String::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let line_no = idx + 1;

            if line.trim().is_empty() {
                continue;
            }

            if line.starts_with("browser") | line.starts_with("track") | line.starts_with('#') {
                header.push_str(&line);
                continue;
            }

            let mut fields = line.split('\t');
            let chrom = fields.next().unwrap_or_default();
            let start = parse_coordinate(fields.next(), "start", line_no)?;
            let end = parse_coordinate(fields.next(), "end", line_no)?;

            let interval = GenomicInterval::new(chrom, start, end).map_err(|e| {
                IntervalError::IntervalParseError {
                    line: line_no,
                    reason: e.to_string(),
                }
            })?;

            if interval.is_empty() {
                log::warn!("Skipping zero-length interval on line {}: {}", line_no, interval);
                continue;
            }

            intervals.push(interval);
        }

        if intervals.is_empty() {
            log::warn!("No intervals found in {}", value.display());
        }

        Ok(IntervalSet {
            intervals,
            header: match header.is_empty() {
                true => None,
                false => Some(header),
            },
            path: Some(value.to_owned()),
        })
    }
}

impl TryFrom<&str> for IntervalSet {
    type Error = IntervalError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        IntervalSet::try_from(Path::new(value))
    }
}

impl TryFrom<PathBuf> for IntervalSet {
    type Error = IntervalError;

    fn try_from(value: PathBuf) -> Result<Self, Self::Error> {
        IntervalSet::try_from(value.as_path())
    }
}

impl From<Vec<GenomicInterval>> for IntervalSet {
    fn from(intervals: Vec<GenomicInterval>) -> Self {
        IntervalSet {
            intervals,
            header: None,
            path: None,
        }
    }
}

impl<'a> IntoIterator for &'a IntervalSet {
    type Item = &'a GenomicInterval;
    type IntoIter = std::slice::Iter<'a, GenomicInterval>;

    fn into_iter(self) -> Self::IntoIter {
        self.intervals.iter()
    }
}

impl IntervalSet {
    pub fn iter(&self) -> std::slice::Iter<'_, GenomicInterval> {
        self.intervals.iter()
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    ///
    /// Split the set into `parts` contiguous, static slices.
    ///
    /// Slice `i` covers `[i*M/parts, (i+1)*M/parts)`, so two parts split at
    /// `M/2` (rounded down). Every interval lands in exactly one slice; slices
    /// may be empty when there are fewer intervals than parts.
    ///
    pub fn partition(&self, parts: usize) -> Vec<&[GenomicInterval]> {
        let parts = parts.max(1);
        let total = self.intervals.len();

        (0..parts)
            .map(|i| {
                let lo = i * total / parts;
                let hi = (i + 1) * total / parts;
                &self.intervals[lo..hi]
            })
            .collect()
    }

    ///
    /// Total number of nucleotides covered, counting overlaps repeatedly.
    ///
    pub fn nucleotides_length(&self) -> u64 {
        self.intervals.iter().map(|i| i.len() as u64).sum()
    }
}

fn parse_coordinate(field: Option<&str>, name: &str, line: usize) -> Result<u32, IntervalError> {
    let field = field.ok_or_else(|| IntervalError::IntervalParseError {
        line,
        reason: format!("missing {} field", name),
    })?;

    field
        .trim()
        .parse::<u32>()
        .map_err(|e| IntervalError::IntervalParseError {
            line,
            reason: format!("invalid {} '{}': {}", name, field, e),
        })
}

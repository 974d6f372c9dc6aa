use thiserror::Error;

#[derive(Error, Debug)]
pub enum IntervalError {
    #[error("Can't read file: {0}")]
    FileReadError(String),

    #[error("Error parsing interval on line {line}: {reason}")]
    IntervalParseError { line: usize, reason: String },

    #[error("Interval end precedes start: {0}")]
    InvertedInterval(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

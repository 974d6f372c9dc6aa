use std::path::PathBuf;

use thiserror::Error;

/// Failures while loading the dataset registry. All of them are fatal and
/// surface before any worker thread is started.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("{kind} file not found for dataset '{dataset}': {path}")]
    MissingFile {
        dataset: String,
        kind: &'static str,
        path: PathBuf,
    },

    #[error("Can't read metadata file {0}")]
    MetadataRead(String),

    #[error("Malformed metadata row {line}: {reason}")]
    MalformedMetadata { line: usize, reason: String },

    #[error("No datasets found in metadata file: {0}")]
    EmptyMetadata(String),

    #[error("Can't parse dispersion model {path}: {reason}")]
    InvalidDispersionModel { path: PathBuf, reason: String },

    #[error("Can't parse beta prior {path}: {reason}")]
    InvalidBetaPrior { path: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failures of a single count store cursor. Readers never propagate these:
/// the affected dataset/interval keeps its missing-data defaults.
#[derive(Error, Debug)]
pub enum CountStoreError {
    #[error("Can't open count store {path}: {reason}")]
    Open { path: PathBuf, reason: String },

    #[error("Invalid query region {0}")]
    InvalidRegion(String),

    #[error("Query failed for {region}: {reason}")]
    Query { region: String, reason: String },

    #[error("Malformed count row: {0}")]
    MalformedRow(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failures scoring one work item.
#[derive(Error, Debug)]
pub enum ScoringError {
    #[error("Work item carries {found} datasets but {expected} models are loaded")]
    DatasetMismatch { expected: usize, found: usize },
}

/// FDR at or below which a position counts as evidence for protection.
pub const DEFAULT_FDR_CUTOFF: f64 = 0.05;

/// Posterior cutoff; positions are emitted when their score exceeds `-ln(cutoff)`.
pub const DEFAULT_POST_CUTOFF: f64 = 0.2;

/// Readers share the interval list through a static contiguous split.
pub const DEFAULT_READERS: usize = 2;

/// Records allowed to sit in the work queue before readers block.
pub const DEFAULT_HIGH_WATER_MARK: usize = 100;

/// Positions on either side summed into each log-likelihood.
pub const DEFAULT_WINDOW_RADIUS: usize = 3;

/// Metadata value meaning "no beta prior file".
pub const NO_PRIOR_MARKER: &str = "!";

pub const CHUNK_DIR_PREFIX: &str = "ftd-posterior-";
pub const CHUNK_FILE_EXT: &str = "tsv";

// column indices of a count store row
pub const POSITION_COLUMN: usize = 1;
pub const EXPECTED_COLUMN: usize = 3;
pub const OBSERVED_COLUMN: usize = 4;
pub const FDR_COLUMN: usize = 7;

use std::fs::{self, File};
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::TempDir;

use crate::consts::{CHUNK_DIR_PREFIX, CHUNK_FILE_EXT};

///
/// Temporary directory holding one chunk file per processor.
///
/// The directory is removed by [ChunkDir::cleanup]; a failure to remove it
/// is logged and otherwise ignored.
///
pub struct ChunkDir {
    dir: TempDir,
    paths: Vec<PathBuf>,
}

impl ChunkDir {
    ///
    /// Create the directory (under `parent`, or the system temp dir) and one
    /// empty chunk file per processor. Returns the open handles in processor
    /// order.
    ///
    pub fn create(parent: Option<&Path>, processors: usize) -> Result<(Self, Vec<File>)> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(CHUNK_DIR_PREFIX);
        let dir = match parent {
            Some(parent) => builder.tempdir_in(parent),
            None => builder.tempdir(),
        }
        .context("Failed to create temporary chunk directory")?;

        let mut paths = Vec::with_capacity(processors);
        let mut files = Vec::with_capacity(processors);
        for i in 0..processors {
            let path = dir.path().join(format!("chunk_{:04}.{}", i, CHUNK_FILE_EXT));
            let file = File::create(&path)
                .with_context(|| format!("Failed to create chunk file: {}", path.display()))?;
            paths.push(path);
            files.push(file);
        }

        Ok((ChunkDir { dir, paths }, files))
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn chunk_paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Byte size of every chunk, in processor order.
    pub fn chunk_sizes(&self) -> io::Result<Vec<u64>> {
        self.paths
            .iter()
            .map(|p| fs::metadata(p).map(|m| m.len()))
            .collect()
    }

    ///
    /// Leave the directory and its chunks on disk and return their paths,
    /// in processor order.
    ///
    pub fn keep(self) -> Vec<PathBuf> {
        let path = self.dir.keep();
        log::info!("merger: kept chunk files in {}", path.display());
        self.paths
    }

    pub fn cleanup(self) {
        let path = self.dir.path().to_owned();
        if let Err(e) = self.dir.close() {
            log::warn!(
                "merger: failed to remove temporary directory {}: {}",
                path.display(),
                e
            );
        }
    }
}

///
/// Copy every chunk, verbatim and in the given order, to `out`.
///
/// Rows keep the order their processor wrote them in, which follows queue
/// scheduling rather than input interval order.
///
pub fn merge_chunks<W: Write + ?Sized>(chunks: &[PathBuf], out: &mut W) -> Result<u64> {
    let mut total = 0u64;
    for path in chunks {
        let file = File::open(path)
            .with_context(|| format!("Failed to open chunk file: {}", path.display()))?;
        total += io::copy(&mut BufReader::new(file), out)
            .with_context(|| format!("Failed to copy chunk file: {}", path.display()))?;
    }
    out.flush()?;

    Ok(total)
}

use std::ffi::OsStr;
use std::fs::File;
use std::io::prelude::*;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;

///
/// Get a reader for either a gzip'd or non-gzip'd file.
///
/// # Arguments
///
/// - path: path to the file to read
///
pub fn get_dynamic_reader(path: &Path) -> Result<BufReader<Box<dyn Read>>> {
    let is_gzipped = path.extension() == Some(OsStr::new("gz"));
    let file = File::open(path).with_context(|| format!("Failed to open file: {:?}", path))?;
    let file: Box<dyn Read> = match is_gzipped {
        true => Box::new(MultiGzDecoder::new(file)),
        false => Box::new(file),
    };

    let reader = BufReader::new(file);

    Ok(reader)
}

/// Get a buffered writer for a file path, or stdout when the path is `-`.
pub fn get_dynamic_writer(file_path_str: &str) -> Result<BufWriter<Box<dyn Write>>> {
    let sink: Box<dyn Write> = if file_path_str == "-" {
        Box::new(std::io::stdout())
    } else {
        let file = File::create(file_path_str)
            .with_context(|| format!("Failed to create output file: {}", file_path_str))?;
        Box::new(file)
    };

    Ok(BufWriter::new(sink))
}

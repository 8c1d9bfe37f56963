//! Opening input files.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};

/// Opens `path` for decoding.
///
/// The reader is buffered: the decoder issues many small seek-then-read
/// pairs for headers and string tables.
pub fn open(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    Ok(BufReader::new(file))
}

//! Intercept Distribution Files
//!
//! Raw per-trial intercepts for offline inspection, one file per
//! `(strategy, size)`. Each line is `<set> <run> <intercept>` with the
//! intercept in microseconds.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// One valid trial's intercept
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterceptRecord {
    pub set: usize,
    pub run: usize,
    pub intercept_us: f64,
}

/// File name for a `(strategy, size)` pair inside the output directory
pub fn distribution_path(dir: &Path, strategy_name: &str, size: usize) -> PathBuf {
    let safe: String = strategy_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    dir.join(format!("{safe}-n{size}.txt"))
}

/// Write intercept lines to any sink
pub fn write_intercepts<W: Write>(mut out: W, records: &[InterceptRecord]) -> io::Result<()> {
    for r in records {
        writeln!(out, "{} {} {:.6}", r.set, r.run, r.intercept_us)?;
    }
    out.flush()
}

/// Write the distribution file, creating the directory if needed.
///
/// Returns the path written.
pub fn write_distribution(
    dir: &Path,
    strategy_name: &str,
    size: usize,
    records: &[InterceptRecord],
) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = distribution_path(dir, strategy_name, size);
    let file = File::create(&path)?;
    write_intercepts(BufWriter::new(file), records)?;
    tracing::debug!(path = %path.display(), lines = records.len(), "wrote intercept distribution");
    Ok(path)
}

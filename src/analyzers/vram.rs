//! VRAM extraction from per-run `gpu_metrics.csv` files.
//!
//! The telemetry tools that write these files do not agree on column names
//! ("GPU Memory Used (MiB)", " vram_mib", ...), so the column is found by
//! substring match on the normalized header.

use anyhow::Result;
use csv::ReaderBuilder;
use std::fs::File;
use std::path::Path;
use tracing::{debug, warn};

use crate::stats::VramRecord;

/// Header substrings (lowercase) that identify a VRAM column.
const VRAM_COLUMN_MARKERS: &[&str] = &["memory used", "vram"];

fn is_vram_column(header: &str) -> bool {
    let normalized = header.trim().to_lowercase();
    VRAM_COLUMN_MARKERS.iter().any(|m| normalized.contains(m))
}

/// Extracts peak and minimum VRAM usage from a telemetry CSV.
///
/// Returns `None` when the file has no VRAM column, no parsable samples, or
/// cannot be read at all. Read failures are logged, never propagated.
#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub fn extract_vram(path: &Path) -> Option<VramRecord> {
    let samples = match read_vram_samples(path) {
        Ok(samples) => samples,
        Err(e) => {
            warn!(error = %e, "Failed to read VRAM samples");
            return None;
        }
    };

    debug!(samples = samples.len(), "VRAM samples collected");
    VramRecord::from_samples(&samples)
}

/// Collects one sample per row from the first VRAM column.
///
/// Rows whose VRAM cell is missing or not a number contribute nothing.
fn read_vram_samples(path: &Path) -> Result<Vec<f64>> {
    let file = File::open(path)?;
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(file);

    let Some(column) = rdr.headers()?.iter().position(is_vram_column) else {
        debug!("No VRAM column in header");
        return Ok(Vec::new());
    };

    let mut samples = Vec::new();
    for result in rdr.records() {
        let record = result?;
        if let Some(value) = record.get(column).and_then(|v| v.trim().parse().ok()) {
            samples.push(value);
        }
    }

    Ok(samples)
}

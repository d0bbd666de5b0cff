//! Output formatting and persistence for merged benchmark rows.
//!
//! Supports writing the combined CSV and rendering the per-model summary table.

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::Path;
use tracing::{info, warn};

use crate::stats::MergedRow;
use csv::WriterBuilder;

/// File written into the benchmark directory by the `metrics` command.
pub const COMPREHENSIVE_METRICS_FILE: &str = "comprehensive_metrics.csv";

const RULE_WIDTH: usize = 130;

/// Throughput per GiB of peak VRAM. Returns 0.0 when no VRAM was recorded.
pub fn efficiency(fps: f64, vram_mib: f64) -> f64 {
    if vram_mib > 0.0 {
        fps / (vram_mib / 1024.0)
    } else {
        0.0
    }
}

/// Writes merged rows, with the localized header, to a new CSV file.
///
/// Returns `false` without touching the file system when there is nothing to write.
pub fn save_to_csv(rows: &[MergedRow], path: &Path) -> Result<bool> {
    if rows.is_empty() {
        warn!("No data to save");
        return Ok(false);
    }

    let mut writer = WriterBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;

    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    info!(path = %path.display(), rows = rows.len(), "Saved merged metrics");
    Ok(true)
}

/// Renders the rows as a text table grouped by model, followed by totals.
///
/// Rows are expected in key order so that each model forms one contiguous group.
pub fn render_summary_table(rows: &[MergedRow]) -> String {
    let mut out = String::new();
    let rule = "=".repeat(RULE_WIDTH);
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "Performance and VRAM usage summary");
    let _ = writeln!(out, "{rule}");

    let mut current_model: Option<&str> = None;
    for row in rows {
        if current_model != Some(row.model.as_str()) {
            current_model = Some(row.model.as_str());
            let _ = writeln!(out, "\n{}:", row.model);
            let _ = writeln!(
                out,
                "  {:>3}  {:>10}  {:>13}  {:>13}  {:>13}  {:>13}",
                "BS", "FPS", "Lat-Med(ms)", "Lat-Avg(ms)", "PeakVRAM(MiB)", "FPS/GiB"
            );
            let _ = writeln!(
                out,
                "  {}  {}  {}  {}  {}  {}",
                "-".repeat(3),
                "-".repeat(10),
                "-".repeat(13),
                "-".repeat(13),
                "-".repeat(13),
                "-".repeat(13)
            );
        }

        let _ = writeln!(
            out,
            "  {:>3}  {:>10.2}  {:>13.2}  {:>13.2}  {:>13.2}  {:>13.2}",
            row.batch_size,
            row.fps,
            row.latency_median_ms,
            row.latency_avg_ms,
            row.peak_vram_mib,
            efficiency(row.fps, row.peak_vram_mib)
        );
    }

    let models: BTreeSet<&str> = rows.iter().map(|r| r.model.as_str()).collect();
    let _ = writeln!(out, "\n{rule}");
    let _ = writeln!(
        out,
        "Total: {} models, {} configurations",
        models.len(),
        rows.len()
    );
    let _ = writeln!(out, "{rule}");

    out
}

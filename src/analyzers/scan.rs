use anyhow::{Context, Result};
use regex::Regex;
use std::fs::{self, DirEntry};
use std::path::Path;
use std::sync::LazyLock;
use tracing::{info, warn};

use crate::analyzers::types::BenchmarkData;
use crate::analyzers::vram::extract_vram;
use crate::parser::parse_log_file;
use crate::stats::BenchmarkKey;

/// Telemetry file expected inside each `<model>_bs<N>` run directory.
pub const GPU_METRICS_FILE: &str = "gpu_metrics.csv";

static RUN_DIR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+)_bs(\d+)").expect("valid run directory regex"));

/// Splits a run directory name such as `resnet50_bs8` into its key.
pub fn parse_run_dir_name(name: &str) -> Option<BenchmarkKey> {
    let caps = RUN_DIR_RE.captures(name)?;
    let model = caps.get(1)?.as_str().to_string();
    let batch_size = caps.get(2)?.as_str().parse().ok()?;
    Some((model, batch_size))
}

/// Lists `dir`, skipping entries that cannot be read.
fn readable_entries(dir: &Path) -> Result<impl Iterator<Item = DirEntry>> {
    let entries = fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))?;
    Ok(entries.filter_map(|entry| {
        entry
            .inspect_err(|e| warn!(error = %e, "Skipping unreadable directory entry"))
            .ok()
    }))
}

/// Collects performance and VRAM data from a benchmark results directory.
///
/// `*.log` files directly in `dir` feed the performance map; a later record
/// for the same key replaces an earlier one. Run directories named
/// `<model>_bs<N>` feed the VRAM map from their `gpu_metrics.csv`.
///
/// # Errors
///
/// Returns an error only if `dir` itself cannot be listed. Unreadable logs
/// and telemetry files are logged and skipped.
#[tracing::instrument(skip_all, fields(dir = %dir.display()))]
pub fn process_benchmark_directory(dir: &Path) -> Result<BenchmarkData> {
    let mut data = BenchmarkData::default();

    for entry in readable_entries(dir)? {
        let path = entry.path();

        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("log") {
            continue;
        }

        info!(log = %entry.file_name().to_string_lossy(), "Processing log");
        match parse_log_file(&path) {
            Ok(records) => {
                for record in records {
                    data.performance.insert(record.key(), record);
                }
            }
            Err(e) => warn!(log = %path.display(), error = %e, "Skipping unreadable log"),
        }
    }

    for entry in readable_entries(dir)? {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }

        let metrics_file = path.join(GPU_METRICS_FILE);
        if !metrics_file.exists() {
            continue;
        }

        let Some(key) = entry.file_name().to_str().and_then(parse_run_dir_name) else {
            continue;
        };

        if let Some(vram) = extract_vram(&metrics_file) {
            data.vram.insert(key, vram);
        }
    }

    info!(
        performance_records = data.performance.len(),
        vram_records = data.vram.len(),
        "Benchmark directory scanned"
    );

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SEP: &str = "========================================";

    fn log_text(model: &str, sections: &[(u32, f64)]) -> String {
        let mut text = format!("Model Benchmark: {model}\n");
        for (bs, fps) in sections {
            text.push_str(&format!(
                "{SEP}\nBatch Size: {bs}\n{SEP}\nThroughput: {fps} FPS\nMedian: 5.0 ms\n"
            ));
        }
        text
    }

    fn write_run_dir(root: &Path, name: &str, csv: &str) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(GPU_METRICS_FILE), csv).unwrap();
    }

    #[test]
    fn test_parse_run_dir_name() {
        assert_eq!(
            parse_run_dir_name("resnet50_bs8"),
            Some(("resnet50".to_string(), 8))
        );
        assert_eq!(
            parse_run_dir_name("yolo_v8_bs16"),
            Some(("yolo_v8".to_string(), 16))
        );
        assert_eq!(parse_run_dir_name("resnet50"), None);
        assert_eq!(parse_run_dir_name("_bs4"), None);
        assert_eq!(parse_run_dir_name("resnet50_bsX"), None);
    }

    #[test]
    fn test_scan_collects_logs_and_vram() {
        let root = TempDir::new().unwrap();
        fs::write(
            root.path().join("resnet50.log"),
            log_text("resnet50", &[(1, 100.0), (8, 400.0)]),
        )
        .unwrap();
        fs::write(root.path().join("notes.txt"), log_text("ignored", &[(1, 1.0)])).unwrap();
        write_run_dir(root.path(), "resnet50_bs8", "GPU Memory Used (MiB)\n900\n1200\n");
        write_run_dir(root.path(), "resnet50_bs1", "Power\n10\n");
        write_run_dir(root.path(), "scratch", "vram\n50\n");

        let data = process_benchmark_directory(root.path()).unwrap();

        assert_eq!(data.performance.len(), 2);
        assert!(!data.performance.keys().any(|(m, _)| m == "ignored"));
        assert_eq!(data.vram.len(), 1);
        assert_eq!(data.vram[&("resnet50".to_string(), 8)].peak, 1200.0);
    }

    #[test]
    fn test_duplicate_keys_keep_one_record() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("a.log"), log_text("m", &[(2, 10.0), (2, 20.0)])).unwrap();

        let data = process_benchmark_directory(root.path()).unwrap();

        assert_eq!(data.performance.len(), 1);
        assert_eq!(data.performance[&("m".to_string(), 2)].fps, 20.0);
    }

    #[cfg(unix)]
    #[test]
    fn test_links_are_followed_and_dangling_links_skipped() {
        let root = TempDir::new().unwrap();
        let runs = TempDir::new().unwrap();
        write_run_dir(runs.path(), "real_run", "vram\n640\n");
        std::os::unix::fs::symlink(runs.path().join("real_run"), root.path().join("resnet50_bs2"))
            .unwrap();
        std::os::unix::fs::symlink(root.path().join("gone"), root.path().join("yolov8n_bs4"))
            .unwrap();
        std::os::unix::fs::symlink(root.path().join("gone.log"), root.path().join("dead.log"))
            .unwrap();
        fs::write(root.path().join("m.log"), log_text("m", &[(1, 10.0)])).unwrap();

        let data = process_benchmark_directory(root.path()).unwrap();

        assert_eq!(data.performance.len(), 1);
        assert_eq!(data.vram.len(), 1);
        assert_eq!(data.vram[&("resnet50".to_string(), 2)].peak, 640.0);
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let root = TempDir::new().unwrap();

        assert!(process_benchmark_directory(&root.path().join("missing")).is_err());
    }
}

//! Record types shared by the aggregation pipeline.

use serde::Serialize;

use crate::analyzers::utility;

/// `(model, batch_size)`; orders by model name, then numerically by batch size.
pub type BenchmarkKey = (String, u32);

/// Throughput and latency figures for one batch-size section of a benchmark log.
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceRecord {
    pub model: String,
    pub batch_size: u32,
    pub fps: f64,
    pub latency_median_ms: f64,
    pub latency_avg_ms: f64,
    pub latency_min_ms: f64,
    pub latency_max_ms: f64,
}

impl PerformanceRecord {
    pub fn key(&self) -> BenchmarkKey {
        (self.model.clone(), self.batch_size)
    }
}

/// VRAM usage (MiB) observed in one run's `gpu_metrics.csv`.
///
/// `peak` is the largest sample seen, not a steady-state value. `avg` mirrors `peak`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VramRecord {
    pub peak: f64,
    pub min: f64,
    pub avg: f64,
}

impl VramRecord {
    /// Builds a record from raw samples. Returns `None` when there are none.
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        let peak = utility::max(samples)?;
        let min = utility::min(samples)?;

        Some(VramRecord {
            peak,
            min,
            avg: peak,
        })
    }
}

/// One output row: a performance record joined with its peak VRAM.
///
/// Column names are the localized headers consumed by the reporting sheets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedRow {
    #[serde(rename = "模型")]
    pub model: String,
    #[serde(rename = "Batch Size")]
    pub batch_size: u32,
    #[serde(rename = "吞吐量(FPS)")]
    pub fps: f64,
    #[serde(rename = "延迟-中位数(ms)")]
    pub latency_median_ms: f64,
    #[serde(rename = "延迟-平均(ms)")]
    pub latency_avg_ms: f64,
    #[serde(rename = "延迟-最小(ms)")]
    pub latency_min_ms: f64,
    #[serde(rename = "延迟-最大(ms)")]
    pub latency_max_ms: f64,
    #[serde(rename = "峰值显存使用(MiB)")]
    pub peak_vram_mib: f64,
}

impl MergedRow {
    pub fn from_parts(perf: &PerformanceRecord, vram: Option<&VramRecord>) -> Self {
        MergedRow {
            model: perf.model.clone(),
            batch_size: perf.batch_size,
            fps: perf.fps,
            latency_median_ms: perf.latency_median_ms,
            latency_avg_ms: perf.latency_avg_ms,
            latency_min_ms: perf.latency_min_ms,
            latency_max_ms: perf.latency_max_ms,
            peak_vram_mib: vram.map_or(0.0, |v| v.peak),
        }
    }
}

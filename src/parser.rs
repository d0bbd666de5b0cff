//! Extraction of performance records from free-text benchmark logs.
//!
//! A log names its model once and then carries one section per batch size:
//!
//! ```text
//! Model Benchmark: resnet50
//! ========================================
//! Batch Size: 1
//! ========================================
//! Throughput: 120.5 FPS
//! Median: 8.3 ms
//! ```

use anyhow::{Context, Result};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

use crate::stats::PerformanceRecord;

static MODEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Model Benchmark:\s+(\S+)").expect("valid model regex"));

static SECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"={40,}\r?\nBatch Size:\s+(\d+)\r?\n={40,}").expect("valid section regex")
});

static THROUGHPUT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Throughput:\s+([\d.]+)\s+FPS").expect("valid throughput regex"));

static MEDIAN_RE: LazyLock<Regex> = LazyLock::new(|| latency_re("Median"));
static AVERAGE_RE: LazyLock<Regex> = LazyLock::new(|| latency_re("Average"));
static MIN_RE: LazyLock<Regex> = LazyLock::new(|| latency_re("Min"));
static MAX_RE: LazyLock<Regex> = LazyLock::new(|| latency_re("Max"));

fn latency_re(label: &str) -> Regex {
    Regex::new(&format!(r"{label}:\s+([\d.]+)\s+ms")).expect("valid latency regex")
}

/// First capture of `re` in `text`, parsed as a float. Unparsable numbers count as absent.
fn capture_f64(re: &Regex, text: &str) -> Option<f64> {
    re.captures(text)?.get(1)?.as_str().parse().ok()
}

/// Parses the full text of a benchmark log into one record per batch-size section.
///
/// `fallback_model` names the records when the log has no `Model Benchmark:` line.
/// Sections without both a throughput and a median latency are dropped; the
/// remaining latency fields default to 0.0.
pub fn parse_log(content: &str, fallback_model: &str) -> Vec<PerformanceRecord> {
    let model = MODEL_RE
        .captures(content)
        .and_then(|c| c.get(1))
        .map_or(fallback_model, |m| m.as_str());

    let headers: Vec<(usize, usize, &str)> = SECTION_RE
        .captures_iter(content)
        .filter_map(|c| {
            let whole = c.get(0)?;
            Some((whole.start(), whole.end(), c.get(1)?.as_str()))
        })
        .collect();
    let mut records = Vec::with_capacity(headers.len());

    for (i, &(_, body_start, batch_size)) in headers.iter().enumerate() {
        let body_end = headers.get(i + 1).map_or(content.len(), |next| next.0);
        let block = &content[body_start..body_end];

        let Ok(batch_size) = batch_size.parse::<u32>() else {
            debug!(batch_size, "Skipping section with unusable batch size");
            continue;
        };

        let (Some(fps), Some(latency_median_ms)) = (
            capture_f64(&THROUGHPUT_RE, block),
            capture_f64(&MEDIAN_RE, block),
        ) else {
            debug!(model, batch_size, "Section lacks throughput or median, dropped");
            continue;
        };

        records.push(PerformanceRecord {
            model: model.to_string(),
            batch_size,
            fps,
            latency_median_ms,
            latency_avg_ms: capture_f64(&AVERAGE_RE, block).unwrap_or(0.0),
            latency_min_ms: capture_f64(&MIN_RE, block).unwrap_or(0.0),
            latency_max_ms: capture_f64(&MAX_RE, block).unwrap_or(0.0),
        });
    }

    records
}

/// Reads a log file and parses it with [`parse_log`].
///
/// Invalid UTF-8 is replaced rather than rejected. The file stem stands in for
/// the model name when the log does not state one.
#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub fn parse_log_file(path: &Path) -> Result<Vec<PerformanceRecord>> {
    let bytes =
        std::fs::read(path).with_context(|| format!("reading log {}", path.display()))?;
    let content = String::from_utf8_lossy(&bytes);

    let fallback = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown");

    let records = parse_log(&content, fallback);
    debug!(records = records.len(), "Log parsed");
    Ok(records)
}

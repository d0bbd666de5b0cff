//! Parser for qmassa JSON dumps.
//!
//! qmassa records a growing list of `states`; only the newest state and the
//! first device in it are reported. Missing readings come out as 0 so the
//! resulting CSV line always has the same shape.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

const MIB: f64 = 1024.0 * 1024.0;

/// Number of fields in [`QmassaMetrics::to_csv_line`].
pub const CSV_FIELD_COUNT: usize = 15;

#[derive(Debug, Error)]
pub enum QmassaError {
    #[error("failed to read qmassa dump: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid qmassa JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("qmassa dump has no states")]
    NoStates,
    #[error("latest qmassa state has no device")]
    NoDeviceState,
}

#[derive(Debug, Deserialize)]
struct QmassaDump {
    #[serde(default)]
    states: Option<Vec<State>>,
}

#[derive(Debug, Deserialize)]
struct State {
    #[serde(default)]
    devs_state: Option<Vec<DevState>>,
}

#[derive(Debug, Deserialize)]
struct DevState {
    #[serde(default)]
    dev_stats: Option<DevStats>,
}

#[derive(Debug, Default, Deserialize)]
struct DevStats {
    #[serde(default)]
    power: Option<Vec<PowerSample>>,
    #[serde(default)]
    freqs: Option<Vec<Vec<FreqSample>>>,
    #[serde(default)]
    mem_info: Option<Vec<MemSample>>,
    #[serde(default)]
    eng_usage: Option<HashMap<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct PowerSample {
    #[serde(default)]
    gpu_cur_power: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct FreqSample {
    #[serde(default)]
    act_freq: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct MemSample {
    #[serde(default)]
    vram_used: Option<f64>,
}

/// Current readings for one GPU, as emitted by the `qmassa` command.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct QmassaMetrics {
    pub gpu_util: f64,
    pub gpu_power: f64,
    pub gpu_freq: f64,
    /// qmassa does not report temperatures; always 0.
    pub gpu_temp: f64,
    pub mem_temp: f64,
    pub mem_used_mib: f64,
    pub compute_util: f64,
    pub decoder0: f64,
    pub decoder1: f64,
    pub encoder0: f64,
    pub encoder1: f64,
    pub copy_eng: f64,
    pub media_enh0: f64,
    pub media_enh1: f64,
    pub media_freq: f64,
}

impl QmassaMetrics {
    /// Comma-separated readings in the column order the monitor script expects.
    pub fn to_csv_line(&self) -> String {
        [
            self.gpu_util,
            self.gpu_power,
            self.gpu_freq,
            self.gpu_temp,
            self.mem_temp,
            self.mem_used_mib,
            self.compute_util,
            self.decoder0,
            self.decoder1,
            self.encoder0,
            self.encoder1,
            self.copy_eng,
            self.media_enh0,
            self.media_enh1,
            self.media_freq,
        ]
        .iter()
        .map(f64::to_string)
        .collect::<Vec<_>>()
        .join(",")
    }

    /// The line printed when a dump cannot be parsed.
    pub fn zero_csv_line() -> String {
        Self::default().to_csv_line()
    }
}

/// Samples for one engine. Entries that are not arrays read as empty.
fn engine_samples<'a>(usage: &'a HashMap<String, Value>, engine: &str) -> &'a [Value] {
    usage
        .get(engine)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn sample_at(samples: &[Value], index: usize) -> f64 {
    samples.get(index).and_then(Value::as_f64).unwrap_or(0.0)
}

fn last_sample(samples: &[Value]) -> f64 {
    samples.last().and_then(Value::as_f64).unwrap_or(0.0)
}

/// Extracts the newest readings from a qmassa JSON document.
pub fn parse_qmassa(json: &str) -> Result<QmassaMetrics, QmassaError> {
    let dump: QmassaDump = serde_json::from_str(json)?;

    let state = dump
        .states
        .unwrap_or_default()
        .pop()
        .ok_or(QmassaError::NoStates)?;
    let device = state
        .devs_state
        .unwrap_or_default()
        .into_iter()
        .next()
        .ok_or(QmassaError::NoDeviceState)?;
    let stats = device.dev_stats.unwrap_or_default();

    let mut metrics = QmassaMetrics::default();

    if let Some(power) = stats.power.as_deref().and_then(<[_]>::last) {
        metrics.gpu_power = power.gpu_cur_power.unwrap_or(0.0);
    }

    // gt0 is the compute tile, gt1 the media tile.
    if let Some(freqs) = stats.freqs.as_deref().and_then(<[_]>::last) {
        metrics.gpu_freq = freqs.first().and_then(|f| f.act_freq).unwrap_or(0.0);
        metrics.media_freq = freqs.get(1).and_then(|f| f.act_freq).unwrap_or(0.0);
    }

    if let Some(mem) = stats.mem_info.as_deref().and_then(<[_]>::last) {
        metrics.mem_used_mib = mem.vram_used.unwrap_or(0.0) / MIB;
    }

    let usage = stats.eng_usage.unwrap_or_default();
    let vcs = engine_samples(&usage, "vcs");
    let ccs = engine_samples(&usage, "ccs");
    let vecs = engine_samples(&usage, "vecs");
    let bcs = engine_samples(&usage, "bcs");
    let rcs = engine_samples(&usage, "rcs");

    metrics.decoder0 = sample_at(vcs, 0);
    metrics.decoder1 = sample_at(vcs, 1);
    metrics.compute_util = last_sample(ccs);
    metrics.media_enh0 = sample_at(vecs, 0);
    metrics.media_enh1 = sample_at(vecs, 1);
    metrics.copy_eng = last_sample(bcs);
    metrics.encoder0 = sample_at(rcs, 0);
    metrics.encoder1 = sample_at(rcs, 1);

    metrics.gpu_util = [vcs, ccs, vecs, bcs, rcs]
        .into_iter()
        .flatten()
        .filter_map(Value::as_f64)
        .reduce(f64::max)
        .unwrap_or(0.0);

    Ok(metrics)
}

/// Reads and parses a qmassa JSON file.
#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub fn parse_qmassa_file(path: &Path) -> Result<QmassaMetrics, QmassaError> {
    let json = std::fs::read_to_string(path)?;
    parse_qmassa(&json)
}

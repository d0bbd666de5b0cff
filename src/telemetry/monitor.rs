//! Loading of `gpu_monitor.csv` time series.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

use crate::analyzers::utility;

pub const TIMESTAMP_COLUMN: &str = "Timestamp";
pub const MODEL_NAME_COLUMN: &str = "Model Name";
pub const BATCH_SIZE_COLUMN: &str = "Batch Size";

/// A monitor CSV held as raw, whitespace-trimmed cells.
#[derive(Debug, Clone)]
pub struct MonitorTable {
    headers: Vec<String>,
    rows: Vec<StringRecord>,
}

impl MonitorTable {
    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("opening monitor CSV {}", path.display()))?;
        Self::from_reader(file).with_context(|| format!("reading monitor CSV {}", path.display()))
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .from_reader(reader);

        let headers = rdr.headers()?.iter().map(str::to_string).collect();
        let rows = rdr.records().collect::<Result<Vec<_>, _>>()?;

        Ok(Self { headers, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Raw cells of a column; short rows read as empty strings.
    pub fn text_column(&self, name: &str) -> Option<Vec<&str>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| r.get(idx).unwrap_or("")).collect())
    }

    /// Numeric cells of a column. Cells that are not numbers become `None`.
    pub fn column(&self, name: &str) -> Option<Vec<Option<f64>>> {
        let cells = self.text_column(name)?;
        Some(
            cells
                .into_iter()
                .map(|c| c.parse::<f64>().ok().filter(|v| v.is_finite()))
                .collect(),
        )
    }

    pub fn first_value(&self, name: &str) -> Option<&str> {
        let idx = self.column_index(name)?;
        self.rows.first()?.get(idx)
    }
}

/// Summary of the numeric samples in one column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesStats {
    pub mean: f64,
    pub max: f64,
    pub min: f64,
}

impl SeriesStats {
    /// Ignores missing samples. Returns `None` if nothing numeric is left.
    pub fn from_samples(samples: &[Option<f64>]) -> Option<Self> {
        let values: Vec<f64> = samples.iter().flatten().copied().collect();
        Some(SeriesStats {
            mean: utility::mean(&values),
            max: utility::max(&values)?,
            min: utility::min(&values)?,
        })
    }
}

/// X axis for the monitor charts.
#[derive(Debug, Clone, PartialEq)]
pub enum TimeAxis {
    /// Seconds since the first sample; unparsable timestamps are `None`.
    Seconds(Vec<Option<f64>>),
    SampleIndex(usize),
}

impl TimeAxis {
    pub fn label(&self) -> &'static str {
        match self {
            TimeAxis::Seconds(_) => "Time (seconds from start)",
            TimeAxis::SampleIndex(_) => "Sample Index",
        }
    }

    pub fn values(&self) -> Vec<Option<f64>> {
        match self {
            TimeAxis::Seconds(values) => values.clone(),
            TimeAxis::SampleIndex(n) => (0..*n).map(|i| Some(i as f64)).collect(),
        }
    }
}

/// Time-only stamps are anchored to this date so they can be subtracted.
fn anchor_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or_default()
}

fn parse_full_datetime(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").ok()
}

fn parse_time_of_day(s: &str) -> Option<NaiveDateTime> {
    NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
        .ok()
        .map(|t| anchor_date().and_time(t))
}

fn parse_any_timestamp(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y/%m/%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| parse_time_of_day(s))
}

/// Parses timestamps with one strict format, or fails if any cell does not fit.
fn parse_strict(
    cells: &[&str],
    parse: fn(&str) -> Option<NaiveDateTime>,
) -> Option<Vec<Option<NaiveDateTime>>> {
    cells.iter().map(|c| parse(c).map(Some)).collect()
}

/// Chooses the x axis for a monitor table.
///
/// With a `Timestamp` column, the whole column is tried as full date-times,
/// then as times of day, then cell by cell in any recognised format. The axis
/// falls back to the sample index when nothing parses or the first sample
/// has no usable timestamp.
pub fn time_axis(table: &MonitorTable) -> TimeAxis {
    let fallback = TimeAxis::SampleIndex(table.len());
    let Some(cells) = table.text_column(TIMESTAMP_COLUMN) else {
        return fallback;
    };

    let parsed = parse_strict(&cells, parse_full_datetime)
        .or_else(|| parse_strict(&cells, parse_time_of_day))
        .unwrap_or_else(|| cells.iter().map(|c| parse_any_timestamp(c)).collect());

    if parsed.iter().all(Option::is_none) {
        warn!("Could not parse timestamps, using sample index instead");
        return fallback;
    }

    let Some(Some(start)) = parsed.first().copied() else {
        debug!("First sample has no timestamp, using sample index");
        return fallback;
    };

    TimeAxis::Seconds(
        parsed
            .into_iter()
            .map(|t| t.and_then(|t| (t - start).num_microseconds()).map(|us| us as f64 / 1e6))
            .collect(),
    )
}

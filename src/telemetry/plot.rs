//! SVG dashboards for a `gpu_monitor.csv` run.

use anyhow::{Context, Result};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::fmt::Write as _;
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::telemetry::monitor::{
    BATCH_SIZE_COLUMN, MODEL_NAME_COLUMN, MonitorTable, SeriesStats, TimeAxis, time_axis,
};

pub const MAIN_CHART_FILE: &str = "gpu_metrics_main.svg";
pub const ENGINE_CHART_FILE: &str = "gpu_metrics_engines.svg";

const FONT: &str = "sans-serif";
const MAIN_COLOR: RGBColor = RGBColor(0x2E, 0x86, 0xAB);
const ENGINE_COLOR: RGBColor = RGBColor(0xA2, 0x3B, 0x72);

/// One chart panel: a monitor column and how to label it.
struct Panel {
    column: &'static str,
    y_label: &'static str,
    /// Utilization panels share a fixed 0-100 scale.
    percent: bool,
}

const fn panel(column: &'static str, y_label: &'static str, percent: bool) -> Panel {
    Panel {
        column,
        y_label,
        percent,
    }
}

const MAIN_PANELS: &[Panel] = &[
    panel("Compute Engine Util (%)", "Utilization (%)", true),
    panel("GPU Power (W)", "Power (W)", false),
    panel("GPU Frequency (MHz)", "Frequency (MHz)", false),
    panel("GPU Core Temp (°C)", "Temperature (°C)", false),
    panel("Decoder Engine 0 (%)", "Utilization (%)", true),
    panel("Decoder Engine 1 (%)", "Utilization (%)", true),
    panel("GPU Memory Used (MiB)", "Memory (MiB)", false),
    panel("Media Engine Frequency (MHz)", "Frequency (MHz)", false),
];

const ENGINE_PANELS: &[Panel] = &[
    panel("GPU Utilization (%)", "Utilization (%)", true),
    panel("Compute Engine Util (%)", "Utilization (%)", true),
    panel("Decoder Engine 0 (%)", "Utilization (%)", true),
    panel("Decoder Engine 1 (%)", "Utilization (%)", true),
    panel("Encoder Engine 0 (%)", "Utilization (%)", true),
    panel("Encoder Engine 1 (%)", "Utilization (%)", true),
    panel("Copy Engine 0 (%)", "Utilization (%)", true),
    panel("Media Enhancement Engine 0 (%)", "Utilization (%)", true),
    panel("Media Enhancement Engine 1 (%)", "Utilization (%)", true),
    panel("Media Engine Frequency (MHz)", "Frequency (MHz)", false),
];

/// Columns reported in the printed summary.
const SUMMARY_COLUMNS: &[&str] = &[
    "GPU Utilization (%)",
    "GPU Power (W)",
    "GPU Core Temp (°C)",
    "GPU Memory Used (MiB)",
    "Compute Engine Util (%)",
    "Decoder Engine 0 (%)",
    "Decoder Engine 1 (%)",
];

/// Per-dashboard look: line color and which statistics the panels show.
struct Dashboard<'a> {
    title: String,
    size: (u32, u32),
    grid: (usize, usize),
    panels: &'a [Panel],
    color: RGBColor,
    show_min: bool,
    unit: &'static str,
}

impl Dashboard<'_> {
    fn stats_lines(&self, stats: &SeriesStats) -> Vec<String> {
        let mut lines = vec![
            format!("Avg: {:.2}{}", stats.mean, self.unit),
            format!("Max: {:.2}{}", stats.max, self.unit),
        ];
        if self.show_min {
            lines.push(format!("Min: {:.2}{}", stats.min, self.unit));
        }
        lines
    }
}

/// What `plot_gpu_metrics` produced.
#[derive(Debug)]
pub struct PlotReport {
    pub model_name: String,
    pub batch_size: String,
    pub samples: usize,
    pub main_chart: PathBuf,
    pub engine_chart: PathBuf,
    /// Statistics for the summary columns present in the CSV, in report order.
    pub summary: Vec<(&'static str, Option<SeriesStats>)>,
    pub output_dir: PathBuf,
}

impl PlotReport {
    pub fn render_summary(&self) -> String {
        let rule = "=".repeat(60);
        let mut out = String::new();
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "GPU Metrics Summary");
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "Model: {}", self.model_name);
        let _ = writeln!(out, "Batch Size: {}", self.batch_size);
        let _ = writeln!(out, "Total Samples: {}", self.samples);
        let _ = writeln!(out, "{}", "-".repeat(60));

        for (column, stats) in &self.summary {
            match stats {
                Some(s) => {
                    let _ = writeln!(
                        out,
                        "{column:35}: Avg={:7.2}, Max={:7.2}, Min={:7.2}",
                        s.mean, s.max, s.min
                    );
                }
                None => {
                    let _ = writeln!(out, "{column:35}: no numeric samples");
                }
            }
        }

        let _ = writeln!(out, "{rule}");
        out
    }
}

/// Renders the overview and engine dashboards for a monitor CSV.
///
/// Charts go to `out_dir`, or next to the CSV when `out_dir` is `None`; the
/// directory is created if needed. Columns missing from the CSV are drawn as
/// "Not Available" panels rather than failing the run.
#[tracing::instrument(skip_all, fields(csv = %csv_path.display()))]
pub fn plot_gpu_metrics(csv_path: &Path, out_dir: Option<&Path>) -> Result<PlotReport> {
    let table = MonitorTable::load(csv_path)?;
    info!(samples = table.len(), "Loaded monitor samples");

    let output_dir = match out_dir {
        Some(dir) => dir.to_path_buf(),
        None => match csv_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        },
    };
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("creating output directory {}", output_dir.display()))?;

    let axis = time_axis(&table);
    let model_name = table
        .first_value(MODEL_NAME_COLUMN)
        .unwrap_or("Unknown")
        .to_string();
    let batch_size = table
        .first_value(BATCH_SIZE_COLUMN)
        .unwrap_or("N/A")
        .to_string();

    let main_chart = output_dir.join(MAIN_CHART_FILE);
    draw_dashboard(
        &main_chart,
        &Dashboard {
            title: format!("GPU Metrics Overview - {model_name} (Batch Size: {batch_size})"),
            size: (2000, 1000),
            grid: (2, 4),
            panels: MAIN_PANELS,
            color: MAIN_COLOR,
            show_min: true,
            unit: "",
        },
        &table,
        &axis,
    )?;
    info!(path = %main_chart.display(), "Saved main metrics chart");

    let engine_chart = output_dir.join(ENGINE_CHART_FILE);
    draw_dashboard(
        &engine_chart,
        &Dashboard {
            title: format!("GPU Engine Utilization - {model_name} (Batch Size: {batch_size})"),
            size: (1600, 2000),
            grid: (5, 2),
            panels: ENGINE_PANELS,
            color: ENGINE_COLOR,
            show_min: false,
            unit: "%",
        },
        &table,
        &axis,
    )?;
    info!(path = %engine_chart.display(), "Saved engine metrics chart");

    let summary = SUMMARY_COLUMNS
        .iter()
        .filter_map(|&column| {
            let samples = table.column(column)?;
            Some((column, SeriesStats::from_samples(&samples)))
        })
        .collect();

    Ok(PlotReport {
        model_name,
        batch_size,
        samples: table.len(),
        main_chart,
        engine_chart,
        summary,
        output_dir,
    })
}

fn draw_dashboard(
    path: &Path,
    dashboard: &Dashboard<'_>,
    table: &MonitorTable,
    axis: &TimeAxis,
) -> Result<()> {
    let root = SVGBackend::new(path, dashboard.size).into_drawing_area();
    root.fill(&WHITE)?;
    let body = root.titled(&dashboard.title, (FONT, 28.0))?;

    let xs = axis.values();
    for (panel, area) in dashboard.panels.iter().zip(body.split_evenly(dashboard.grid)) {
        draw_panel(&area, panel, dashboard, table, &xs, axis.label())?;
    }

    root.present()
        .with_context(|| format!("writing chart {}", path.display()))?;
    Ok(())
}

fn draw_panel(
    area: &DrawingArea<SVGBackend<'_>, Shift>,
    panel: &Panel,
    dashboard: &Dashboard<'_>,
    table: &MonitorTable,
    xs: &[Option<f64>],
    x_label: &str,
) -> Result<()> {
    let Some(samples) = table.column(panel.column) else {
        let (w, h) = area.dim_in_pixel();
        let centered = TextStyle::from((FONT, 16.0).into_font()).pos(Pos::new(HPos::Center, VPos::Center));
        area.draw(&Text::new(
            panel.column.to_string(),
            (w as i32 / 2, h as i32 / 2 - 12),
            centered.clone(),
        ))?;
        area.draw(&Text::new(
            "Not Available".to_string(),
            (w as i32 / 2, h as i32 / 2 + 12),
            centered,
        ))?;
        return Ok(());
    };

    let points: Vec<(f64, f64)> = xs
        .iter()
        .zip(&samples)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();

    let x_range = axis_range(points.iter().map(|p| p.0));
    let y_range = if panel.percent {
        0.0..100.0
    } else {
        axis_range(points.iter().map(|p| p.1))
    };

    let mut chart = ChartBuilder::on(area)
        .caption(panel.column, (FONT, 16.0))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(55)
        .build_cartesian_2d(x_range, y_range)?;

    chart
        .configure_mesh()
        .x_desc(x_label)
        .y_desc(panel.y_label)
        .draw()?;

    chart.draw_series(LineSeries::new(
        points.iter().copied(),
        dashboard.color.stroke_width(2),
    ))?;

    if let Some(stats) = SeriesStats::from_samples(&samples) {
        for (i, line) in dashboard.stats_lines(&stats).into_iter().enumerate() {
            area.draw(&Text::new(
                line,
                (70, 40 + 16 * i as i32),
                (FONT, 12.0).into_font(),
            ))?;
        }
    }

    Ok(())
}

/// Data range padded by 5%, widened around a single value, `0..1` when empty.
fn axis_range(values: impl Iterator<Item = f64>) -> Range<f64> {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });

    if !lo.is_finite() || !hi.is_finite() {
        return 0.0..1.0;
    }
    if hi - lo < f64::EPSILON {
        return (lo - 1.0)..(hi + 1.0);
    }

    let pad = (hi - lo) * 0.05;
    (lo - pad)..(hi + pad)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MONITOR_CSV: &str = "\
Timestamp, Model Name, Batch Size, GPU Utilization (%), GPU Power (W), GPU Memory Used (MiB), Decoder Engine 0 (%)
2026-02-06 12:00:00, resnet50, 8, 40.0, 20.5, 1024, 10
2026-02-06 12:00:01, resnet50, 8, 60.0, 22.5, 2048, N/A
2026-02-06 12:00:02, resnet50, 8, 80.0, 24.5, 3072, 30
";

    #[test]
    fn test_axis_range() {
        assert_eq!(axis_range(std::iter::empty()), 0.0..1.0);
        assert_eq!(axis_range([5.0].into_iter()), 4.0..6.0);
        assert_eq!(axis_range([0.0, 100.0].into_iter()), -5.0..105.0);
    }

    #[test]
    fn test_plot_writes_both_charts() {
        let dir = TempDir::new().unwrap();
        let csv = dir.path().join("gpu_monitor.csv");
        fs::write(&csv, MONITOR_CSV).unwrap();
        let out = dir.path().join("plots");

        let report = plot_gpu_metrics(&csv, Some(&out)).unwrap();

        assert!(report.main_chart.exists());
        assert!(report.engine_chart.exists());
        assert_eq!(report.main_chart, out.join(MAIN_CHART_FILE));
        assert_eq!(report.model_name, "resnet50");
        assert_eq!(report.batch_size, "8");
        assert_eq!(report.samples, 3);

        let svg = fs::read_to_string(&report.main_chart).unwrap();
        assert!(svg.contains("Not Available"));
    }

    #[test]
    fn test_summary_covers_present_columns() {
        let dir = TempDir::new().unwrap();
        let csv = dir.path().join("gpu_monitor.csv");
        fs::write(&csv, MONITOR_CSV).unwrap();

        let report = plot_gpu_metrics(&csv, None).unwrap();

        let columns: Vec<_> = report.summary.iter().map(|(c, _)| *c).collect();
        assert_eq!(
            columns,
            vec![
                "GPU Utilization (%)",
                "GPU Power (W)",
                "GPU Memory Used (MiB)",
                "Decoder Engine 0 (%)"
            ]
        );
        let util = report.summary[0].1.unwrap();
        assert_eq!(util.mean, 60.0);
        assert_eq!(report.summary[3].1.unwrap().max, 30.0);
        assert_eq!(report.output_dir, dir.path());

        let text = report.render_summary();
        assert!(text.contains("Model: resnet50"));
        assert!(text.contains("Total Samples: 3"));
    }

    #[test]
    fn test_missing_csv_is_an_error() {
        let dir = TempDir::new().unwrap();

        assert!(plot_gpu_metrics(&dir.path().join("missing.csv"), None).is_err());
    }
}

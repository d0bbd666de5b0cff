//! GPU telemetry post-processing.
//!
//! [`qmassa`] flattens a qmassa JSON dump into one CSV line of current
//! readings. [`monitor`] loads the `gpu_monitor.csv` time series and
//! [`plot`] renders it as SVG dashboards.

pub mod monitor;
pub mod plot;
pub mod qmassa;

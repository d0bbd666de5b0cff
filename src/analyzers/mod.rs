//! Benchmark directory aggregation.
//!
//! This module walks a results directory, collects performance records from
//! the benchmark logs and VRAM samples from each run's `gpu_metrics.csv`, and
//! joins the two by `(model, batch_size)`.

pub mod merge;
pub mod scan;
pub mod types;
pub mod utility;
pub mod vram;

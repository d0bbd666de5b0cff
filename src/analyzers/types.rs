//! Collections built while scanning a results directory.

use std::collections::BTreeMap;

use crate::stats::{BenchmarkKey, PerformanceRecord, VramRecord};

/// Latest performance record per key. Iterates in ascending key order.
pub type PerformanceMap = BTreeMap<BenchmarkKey, PerformanceRecord>;

/// VRAM usage per key, for runs that had usable samples.
pub type VramMap = BTreeMap<BenchmarkKey, VramRecord>;

/// Everything collected from one results directory.
#[derive(Debug, Default)]
pub struct BenchmarkData {
    pub performance: PerformanceMap,
    pub vram: VramMap,
}

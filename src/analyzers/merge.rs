use crate::analyzers::types::{PerformanceMap, VramMap};
use crate::stats::MergedRow;

/// Left-joins VRAM usage onto performance records.
///
/// Every performance key yields exactly one row, in ascending key order.
/// Keys without VRAM data get 0.0; VRAM entries with no performance record
/// are dropped.
pub fn merge(performance: &PerformanceMap, vram: &VramMap) -> Vec<MergedRow> {
    performance
        .iter()
        .map(|(key, perf)| MergedRow::from_parts(perf, vram.get(key)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{PerformanceRecord, VramRecord};

    fn perf(model: &str, batch_size: u32, fps: f64) -> PerformanceRecord {
        PerformanceRecord {
            model: model.to_string(),
            batch_size,
            fps,
            latency_median_ms: 1.0,
            latency_avg_ms: 1.0,
            latency_min_ms: 1.0,
            latency_max_ms: 1.0,
        }
    }

    fn vram(peak: f64) -> VramRecord {
        VramRecord {
            peak,
            min: 0.0,
            avg: peak,
        }
    }

    #[test]
    fn test_merge_is_left_join_in_key_order() {
        let mut performance = PerformanceMap::new();
        for p in [perf("yolo", 4, 40.0), perf("resnet", 16, 16.0), perf("resnet", 2, 2.0)] {
            performance.insert(p.key(), p);
        }

        let mut vram_map = VramMap::new();
        vram_map.insert(("resnet".to_string(), 16), vram(2048.0));
        vram_map.insert(("mobilenet".to_string(), 1), vram(100.0));

        let rows = merge(&performance, &vram_map);

        let keys: Vec<(&str, u32)> = rows.iter().map(|r| (r.model.as_str(), r.batch_size)).collect();
        assert_eq!(keys, vec![("resnet", 2), ("resnet", 16), ("yolo", 4)]);
        assert_eq!(rows[0].peak_vram_mib, 0.0);
        assert_eq!(rows[1].peak_vram_mib, 2048.0);
        assert_eq!(rows[2].peak_vram_mib, 0.0);
    }

    #[test]
    fn test_merge_empty() {
        assert!(merge(&PerformanceMap::new(), &VramMap::new()).is_empty());
    }
}

use bench_metrics::analyzers::merge::merge;
use bench_metrics::analyzers::scan::process_benchmark_directory;
use bench_metrics::output::{COMPREHENSIVE_METRICS_FILE, render_summary_table, save_to_csv};
use bench_metrics::parser::parse_log;
use bench_metrics::stats::PerformanceRecord;
use bench_metrics::telemetry::qmassa::parse_qmassa;
use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn copy_dir(src: &Path, dst: &Path) {
    fs::create_dir_all(dst).unwrap();
    for entry in fs::read_dir(src).unwrap() {
        let entry = entry.unwrap();
        let target = dst.join(entry.file_name());
        if entry.file_type().unwrap().is_dir() {
            copy_dir(&entry.path(), &target);
        } else {
            fs::copy(entry.path(), target).unwrap();
        }
    }
}

fn fixture_results_dir() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let src = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/benchmark_results");
    copy_dir(&src, tmp.path());
    tmp
}

#[test]
fn test_readme_log_example() {
    let log = "Model Benchmark: resnet50\n========================================\nBatch Size: 1\n========================================\nThroughput: 120.5 FPS\nMedian: 8.3 ms\nAverage: 8.5 ms\nMin: 7.9 ms\nMax: 9.1 ms\n";

    let records = parse_log(log, "unknown");

    assert_eq!(
        records,
        vec![PerformanceRecord {
            model: "resnet50".to_string(),
            batch_size: 1,
            fps: 120.5,
            latency_median_ms: 8.3,
            latency_avg_ms: 8.5,
            latency_min_ms: 7.9,
            latency_max_ms: 9.1,
        }]
    );
}

#[test]
fn test_full_pipeline() {
    let results = fixture_results_dir();

    let data = process_benchmark_directory(results.path()).expect("scan fixture directory");
    assert_eq!(data.performance.len(), 3);
    assert_eq!(data.vram.len(), 3);

    let rows = merge(&data.performance, &data.vram);
    let keys: Vec<(&str, u32)> = rows
        .iter()
        .map(|r| (r.model.as_str(), r.batch_size))
        .collect();
    assert_eq!(keys, vec![("resnet50", 1), ("resnet50", 8), ("yolov8n", 4)]);

    let output = results.path().join(COMPREHENSIVE_METRICS_FILE);
    assert!(save_to_csv(&rows, &output).unwrap());

    let content = fs::read_to_string(&output).unwrap();
    let lines: Vec<_> = content.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("模型,Batch Size,"));
    assert_eq!(lines[1], "resnet50,1,120.5,8.3,8.5,7.9,9.1,1024.0");
    assert_eq!(lines[2], "resnet50,8,610.25,13.1,13.4,12.8,15.0,3072.0");
    assert_eq!(lines[3], "yolov8n,4,402.0,9.9,10.2,0.0,0.0,0.0");

    let table = render_summary_table(&rows);
    assert!(table.contains("Total: 2 models, 3 configurations"));
    assert!(!table.contains("mobilenet_v2"));
}

#[test]
fn test_qmassa_fixture() {
    let json = include_str!("fixtures/qmassa.json");

    let metrics = parse_qmassa(json).expect("parse qmassa fixture");

    assert_eq!(
        metrics.to_csv_line(),
        "71,33.5,1950,0,0,2048,71,55,48.5,2,0,0,12,0,1100"
    );
}

fn run_metrics_cli(work_dir: &Path, benchmark_dir: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_bench_metrics"))
        .current_dir(work_dir)
        .env("LOG_FILE_PATH", work_dir.join("logs/bench_metrics.log"))
        .env_remove("BENCH_RESULTS_DIR")
        .arg("metrics")
        .arg(benchmark_dir)
        .output()
        .expect("run bench_metrics binary")
}

#[test]
fn test_metrics_cli_missing_directory_exits_1() {
    let work = TempDir::new().unwrap();

    let output = run_metrics_cli(work.path(), &work.path().join("nonexistent"));

    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_metrics_cli_empty_directory_exits_0() {
    let work = TempDir::new().unwrap();
    let results = work.path().join("benchmark_results");
    fs::create_dir(&results).unwrap();

    let output = run_metrics_cli(work.path(), &results);

    assert_eq!(output.status.code(), Some(0));
    assert!(!results.join(COMPREHENSIVE_METRICS_FILE).exists());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Total: 0 models, 0 configurations"));
}

//! Integration tests for OffBench
//!
//! These tests drive the whole pipeline (planner, sanity gate, harness,
//! regression, aggregation, rendering) with a tiny configuration.

use offbench::{
    DeviceKind, DriverError, OffbenchConfig, OutputFormat, StrategyRegistry, StrategyStatus,
    TrialFit, WorkloadGenerator, compute_overhead, fit_affine, measure, render,
};
use offbench_cli::{CellOutcome, StrategyOutcome, format_human_output, strategy_result};
use offbench_report::{Report, StrategyResult, parse_json_report};

fn tiny_config() -> OffbenchConfig {
    let mut config = OffbenchConfig::default();
    config.harness.num_samples = 4;
    config.harness.min_delay = 1;
    config.harness.max_delay = 64;
    config.harness.inner_reps = 1;
    config.harness.sets = 2;
    config.harness.runs = 2;
    config.device.threads = Some(2);
    config
}

fn find(report: &Report, id: u32) -> Option<&StrategyResult> {
    report.results.iter().find(|r| r.id == id)
}

/// Every built-in strategy completes and every trial is accounted for
#[test]
fn test_all_builtin_strategies_measure() {
    let config = tiny_config();
    let report = measure(&config, &[], vec![16]).unwrap();

    assert_eq!(report.results.len(), StrategyRegistry::builtin().len());
    for result in &report.results {
        assert_ne!(result.status, StrategyStatus::Failed, "{} failed", result.name);
        assert_eq!(result.cells.len(), 1);
        let cell = &result.cells[0];
        let valid = cell.overhead.as_ref().map_or(0, |m| m.valid_trials);
        // Exactly sets × runs trials; warm-up sweeps never show up here
        assert_eq!(valid + cell.invalid_trials, 4, "{}", result.name);
        if let Some(m) = &cell.overhead {
            assert!(m.mean_us.is_finite() && m.std_dev_us.is_finite());
        }
    }
}

/// Unknown ids are skipped; the rest still produce results
#[test]
fn test_invalid_strategy_id_skipped() {
    let config = tiny_config();
    let report = measure(&config, &[42, 1, 0], vec![8]).unwrap();

    assert_eq!(report.results.len(), 1);
    assert_eq!(report.summary.skipped, ["42", "0"]);
    let roundtrip = find(&report, 1).unwrap();
    assert_eq!(roundtrip.name, "roundtrip");
    assert!(roundtrip.cells[0].overhead.is_some());
}

/// An inline device fails the default sanity gate before anything is timed
#[test]
fn test_inline_device_aborts() {
    let mut config = tiny_config();
    config.device.kind = DeviceKind::Inline;

    let err = measure(&config, &[1], vec![8]).unwrap_err();
    assert!(matches!(err, DriverError::SanityGate { .. }));
}

/// Zero-size buffers are a configuration error
#[test]
fn test_zero_size_rejected() {
    let err = measure(&tiny_config(), &[1], vec![0]).unwrap_err();
    assert!(matches!(err, DriverError::Config(_)));
}

/// Multiple sizes produce one cell per size, in order
#[test]
fn test_size_sweep_cells() {
    let config = tiny_config();
    let report = measure(&config, &[5, 9], vec![1, 2, 4]).unwrap();

    assert!(report.is_sweep());
    for result in &report.results {
        let sizes: Vec<usize> = result.cells.iter().map(|c| c.size).collect();
        assert_eq!(sizes, [1, 2, 4]);
    }

    let human = render(&report, OutputFormat::Human).unwrap();
    assert!(human.contains("n=4"));
    assert!(human.contains("direct"));
    assert!(human.contains("async"));
}

/// JSON and CSV renderings carry the same rows
#[test]
fn test_machine_readable_outputs() {
    let report = measure(&tiny_config(), &[1, 2], vec![8]).unwrap();

    let json = render(&report, OutputFormat::Json).unwrap();
    let parsed = parse_json_report(&json).unwrap();
    assert_eq!(parsed.results.len(), 2);
    assert_eq!(parsed.meta.config.sets, 2);

    let csv = render(&report, OutputFormat::Csv).unwrap();
    assert_eq!(csv.lines().count(), 3);
    assert!(csv.lines().nth(1).unwrap().starts_with("1,roundtrip,8,"));
}

/// Distribution files land in the configured directory
#[test]
fn test_distribution_files() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = tiny_config();
    config.output.distribution = Some(tmp.path().join("dist"));

    measure(&config, &[4], vec![8]).unwrap();

    let content = std::fs::read_to_string(tmp.path().join("dist").join("alloc-n8.txt")).unwrap();
    for line in content.lines() {
        let fields: Vec<&str> = line.split(' ').collect();
        assert_eq!(fields.len(), 3);
        assert!(fields[0].parse::<usize>().unwrap() < 2);
        assert!(fields[1].parse::<usize>().unwrap() < 2);
        assert!(fields[2].parse::<f64>().unwrap().is_finite());
    }
}

/// Zero-noise synthetic latencies over the real schedule recover the line
#[test]
fn test_synthetic_ground_truth() {
    let generator = WorkloadGenerator::default();
    let x = generator.delays();
    let y: Vec<f64> = x.iter().map(|&d| 3.0 + 0.5 * d).collect();

    let fit = fit_affine(&x, &y).unwrap();
    assert!((fit.intercept - 3.0).abs() < 1e-9);
    assert!((fit.slope - 0.5).abs() < 1e-9);
}

/// Degenerate trials are excluded and never surface as NaN
#[test]
fn test_degenerate_trials_reported_unavailable() {
    let x = [50.0; 4];
    let y = [1.0, 2.0, 3.0, 4.0];
    let fits: Vec<TrialFit> = (0..4).map(|run| TrialFit::fit(0, run, &x, &y)).collect();
    assert!(fits.iter().all(|f| !f.is_valid()));
    assert!(compute_overhead(&fits).is_none());

    let outcome = StrategyOutcome {
        id: offbench::StrategyId(1),
        name: "roundtrip".to_string(),
        description: String::new(),
        cells: vec![CellOutcome {
            size: 1024,
            fits,
            dispatches: 0,
        }],
        failure: None,
    };
    let row = strategy_result(&outcome);
    assert_eq!(row.status, StrategyStatus::Partial);
    assert!(row.cells[0].overhead.is_none());

    let mut report = measure(&tiny_config(), &[1], vec![1024]).unwrap();
    report.results = vec![row];
    let human = format_human_output(&report);
    assert!(human.contains("n/a"));
    assert!(!human.contains("NaN"));
}

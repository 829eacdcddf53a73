//! Output Formatting
//!
//! Human-readable tables for the terminal.
//!
//! A single problem size renders one row per strategy:
//!
//! ```text
//! | roundtrip                                |      3.251 ±   0.120 µs |
//! ```
//!
//! A size sweep renders one column per size. Cells read `failed` when the
//! strategy stopped before reaching that size and `n/a` when no trial there
//! produced a valid fit.

use offbench_report::{Report, StrategyResult, StrategyStatus};

const NAME_WIDTH: usize = 40;
const SWEEP_HEADER: &str = "Strategy (µs)";

/// Format a report for human-readable terminal display
pub fn format_human_output(report: &Report) -> String {
    let mut output = String::new();
    let cfg = &report.meta.config;

    output.push('\n');
    if report.is_sweep() {
        output.push_str("OffBench Results (size sweep)\n");
    } else {
        let size = report.sizes().first().copied().unwrap_or(0);
        output.push_str(&format!("OffBench Results (N = {})\n", size));
    }
    output.push_str(&format!(
        "device: {} ({} threads)  trials: {} sets x {} runs  schedule: {} delays in [{}, {}]  batch: {}  warm-up: {}\n",
        cfg.device,
        cfg.device_threads,
        cfg.sets,
        cfg.runs,
        cfg.num_samples,
        cfg.min_delay,
        cfg.max_delay,
        cfg.inner_reps,
        cfg.warmup
    ));
    output.push_str(&"=".repeat(68));
    output.push_str("\n\n");

    if report.is_sweep() {
        format_sweep_table(report, &mut output);
    } else {
        format_single_table(report, &mut output);
    }

    let failures: Vec<_> = report
        .results
        .iter()
        .filter_map(|r| r.failure.as_ref().map(|f| (r, f)))
        .collect();
    if !failures.is_empty() {
        output.push_str("\nFailures\n");
        output.push_str(&"-".repeat(68));
        output.push('\n');
        for (result, failure) in failures {
            output.push_str(&format!(
                "  ✗ {} ({}): {}\n",
                result.name, failure.kind, failure.message
            ));
        }
    }

    output.push_str("\nSummary\n");
    output.push_str(&"-".repeat(68));
    output.push('\n');
    output.push_str(&format!(
        "  Strategies: {}  Measured: {}  Partial: {}  Failed: {}\n",
        report.summary.total_strategies,
        report.summary.measured,
        report.summary.partial,
        report.summary.failed
    ));
    output.push_str(&format!(
        "  Dispatches: {}  Duration: {:.2} ms\n",
        report.summary.total_dispatches, report.summary.total_duration_ms
    ));
    if !report.summary.skipped.is_empty() {
        output.push_str(&format!(
            "  Skipped ids: {}\n",
            report.summary.skipped.join(", ")
        ));
    }

    output
}

fn format_single_table(report: &Report, output: &mut String) {
    let size = report.sizes().first().copied().unwrap_or(0);
    let cell_width = 23;

    output.push_str(&format!(
        "| {:<nw$} | {:^cw$} |\n",
        "Strategy",
        "Overhead",
        nw = NAME_WIDTH,
        cw = cell_width
    ));
    output.push_str(&format!(
        "|{}|{}|\n",
        "-".repeat(NAME_WIDTH + 2),
        "-".repeat(cell_width + 2)
    ));

    for result in &report.results {
        let text = cell_text(result, size, |mean, sd| {
            format!("{:10.3} ± {:7.3} µs", mean, sd)
        });
        output.push_str(&format!(
            "| {:<nw$} | {:>cw$} |\n",
            result.name,
            text,
            nw = NAME_WIDTH,
            cw = cell_width
        ));
    }
}

fn format_sweep_table(report: &Report, output: &mut String) {
    let sizes = report.sizes();
    let texts: Vec<Vec<String>> = report
        .results
        .iter()
        .map(|r| {
            sizes
                .iter()
                .map(|&size| cell_text(r, size, |mean, sd| format!("{:.3}±{:.3}", mean, sd)))
                .collect()
        })
        .collect();

    let name_width = report
        .results
        .iter()
        .map(|r| r.name.chars().count())
        .max()
        .unwrap_or(0)
        .max(SWEEP_HEADER.chars().count());
    let col_width = texts
        .iter()
        .flatten()
        .map(|t| t.chars().count())
        .chain(sizes.iter().map(|s| format!("n={}", s).len()))
        .max()
        .unwrap_or(10)
        .max(10);

    output.push_str(&format!("  {:<w$}", SWEEP_HEADER, w = name_width));
    for size in sizes {
        output.push_str(&format!(" | {:>w$}", format!("n={}", size), w = col_width));
    }
    output.push('\n');

    output.push_str(&format!("  {}", "-".repeat(name_width)));
    for _ in sizes {
        output.push_str(&format!("-+-{}", "-".repeat(col_width)));
    }
    output.push('\n');

    for (result, row) in report.results.iter().zip(&texts) {
        output.push_str(&format!("  {:<w$}", result.name, w = name_width));
        for text in row {
            output.push_str(&format!(" | {:>w$}", text, w = col_width));
        }
        output.push('\n');
    }
}

/// Text for one `(strategy, size)` cell
fn cell_text(
    result: &StrategyResult,
    size: usize,
    format_estimate: impl Fn(f64, f64) -> String,
) -> String {
    match result.cells.iter().find(|c| c.size == size) {
        Some(cell) => match &cell.overhead {
            Some(m) => format_estimate(m.mean_us, m.std_dev_us),
            None => "n/a".to_string(),
        },
        None if result.status == StrategyStatus::Failed => "failed".to_string(),
        None => "-".to_string(),
    }
}

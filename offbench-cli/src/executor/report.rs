//! Report Building
//!
//! Turns per-strategy trial fits into report rows and assembles the final
//! [`Report`].
//!
//! ```text
//! StrategyOutcome (fits per size)
//!          │  summarize valid intercepts
//!          ▼
//!   StrategyResult (one OverheadCell per size)
//!          │  + metadata + summary
//!          ▼
//!       Report  ──► human / JSON / CSV
//! ```

use super::driver::StrategyOutcome;
use super::metadata::build_report_meta;
use super::statistics::summarize;
use offbench_report::{
    OverheadCell, OverheadMetrics, Report, ReportConfig, ReportSummary, StrategyResult,
    StrategyStatus,
};

/// Summarize one strategy's measurements into a report row
pub fn strategy_result(outcome: &StrategyOutcome) -> StrategyResult {
    let cells: Vec<OverheadCell> = outcome
        .cells
        .iter()
        .map(|cell| match summarize(&cell.fits) {
            Some(estimate) => OverheadCell {
                size: cell.size,
                overhead: Some(OverheadMetrics::from(&estimate)),
                invalid_trials: estimate.invalid_trials,
            },
            None => {
                tracing::warn!(
                    strategy = %outcome.name,
                    size = cell.size,
                    trials = cell.fits.len(),
                    "no valid trial; overhead unavailable"
                );
                OverheadCell::unavailable(cell.size, cell.fits.len())
            }
        })
        .collect();

    let status = if outcome.failure.is_some() {
        StrategyStatus::Failed
    } else if cells.iter().any(|c| c.overhead.is_none()) {
        StrategyStatus::Partial
    } else {
        StrategyStatus::Measured
    };

    StrategyResult {
        id: outcome.id.0,
        name: outcome.name.clone(),
        description: outcome.description.clone(),
        status,
        cells,
        failure: outcome.failure.clone(),
    }
}

/// Build a complete Report from summarized rows
pub fn build_report(
    results: Vec<StrategyResult>,
    config: ReportConfig,
    total_dispatches: u64,
    total_duration_ms: f64,
) -> Report {
    let summary = ReportSummary {
        total_dispatches,
        total_duration_ms,
        ..ReportSummary::tally(&results)
    };

    Report {
        meta: build_report_meta(config),
        results,
        summary,
    }
}

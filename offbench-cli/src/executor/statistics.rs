//! Statistics Computation
//!
//! Per-trial regression of latency on delay length, then aggregation of the
//! valid intercepts. Runs after the timing loop for a `(strategy, size)` pair
//! has finished; the matrix is not needed once its fits are extracted.

use offbench_core::TimingMatrix;
use offbench_report::InterceptRecord;
use offbench_stats::{OverheadEstimate, TrialFit, compute_overhead};

/// Fit every `(set, run)` trial of a matrix against its delay schedule
pub fn fit_trials(matrix: &TimingMatrix) -> Vec<TrialFit> {
    let x = matrix.delays();
    matrix
        .trials()
        .map(|trial| TrialFit::fit(trial.set, trial.run, x, trial.elapsed_us))
        .collect()
}

/// Overhead estimate over the valid fits, or `None` when there are none
pub fn summarize(fits: &[TrialFit]) -> Option<OverheadEstimate> {
    let invalid = fits.iter().filter(|f| !f.is_valid()).count();
    if invalid > 0 {
        tracing::debug!(invalid, total = fits.len(), "excluding invalid trial fits");
    }
    compute_overhead(fits)
}

/// Intercepts of the valid fits, for the distribution file
pub fn intercept_records(fits: &[TrialFit]) -> Vec<InterceptRecord> {
    fits.iter()
        .filter_map(|f| {
            f.intercept().map(|intercept_us| InterceptRecord {
                set: f.set,
                run: f.run,
                intercept_us,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use offbench_stats::{RegressionError, RegressionResult};

    fn good(set: usize, run: usize, intercept: f64) -> TrialFit {
        TrialFit {
            set,
            run,
            outcome: Ok(RegressionResult {
                slope: 0.1,
                intercept,
            }),
        }
    }

    #[test]
    fn records_skip_invalid_trials() {
        let fits = vec![
            good(0, 0, 2.0),
            TrialFit {
                set: 0,
                run: 1,
                outcome: Err(RegressionError::Degenerate),
            },
            good(1, 0, 4.0),
        ];

        let records = intercept_records(&fits);
        assert_eq!(records.len(), 2);
        assert_eq!((records[1].set, records[1].run), (1, 0));

        let estimate = summarize(&fits).unwrap();
        assert_eq!(estimate.valid_trials, 2);
        assert_eq!(estimate.invalid_trials, 1);
        assert!((estimate.mean - 3.0).abs() < 1e-12);
    }
}

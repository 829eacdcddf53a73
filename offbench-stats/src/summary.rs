//! Overhead Statistics
//!
//! Aggregates per-trial intercepts into the headline overhead estimate.
//! Invalid trials are excluded from both the sums and the sample count, so
//! a degenerate fit can never surface as NaN.

use crate::percentiles::compute_quartiles;
use crate::regression::TrialFit;

/// Mean ± standard deviation of the valid intercepts of one configuration
#[derive(Debug, Clone, PartialEq)]
pub struct OverheadEstimate {
    /// Sample mean of the intercepts (µs)
    pub mean: f64,
    /// Bessel-corrected sample standard deviation (µs); 0 for a single trial
    pub std_dev: f64,
    /// Median intercept (µs)
    pub median: f64,
    /// Interquartile range of the intercepts (µs)
    pub iqr: f64,
    /// Smallest intercept (µs)
    pub min: f64,
    /// Largest intercept (µs)
    pub max: f64,
    /// Mean slope of the valid fits (µs per unit of work)
    pub mean_slope: f64,
    /// Trials that contributed
    pub valid_trials: usize,
    /// Trials excluded as invalid
    pub invalid_trials: usize,
}

impl OverheadEstimate {
    /// Standard error of the mean
    pub fn standard_error(&self) -> f64 {
        if self.valid_trials == 0 {
            0.0
        } else {
            self.std_dev / (self.valid_trials as f64).sqrt()
        }
    }

    /// Relative spread in percent
    pub fn coefficient_of_variation(&self) -> f64 {
        if self.mean == 0.0 {
            0.0
        } else {
            (self.std_dev / self.mean).abs() * 100.0
        }
    }
}

/// Sample mean and Bessel-corrected standard deviation.
///
/// Returns `None` for an empty slice; a single value has zero spread.
pub fn mean_std_dev(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let std_dev = if values.len() < 2 {
        0.0
    } else {
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        variance.sqrt()
    };
    Some((mean, std_dev))
}

/// Aggregate intercepts that are already known to be valid
pub fn compute_overhead_from_intercepts(intercepts: &[f64]) -> Option<OverheadEstimate> {
    let (mean, std_dev) = mean_std_dev(intercepts)?;
    let quartiles = compute_quartiles(intercepts);
    Some(OverheadEstimate {
        mean,
        std_dev,
        median: quartiles.median,
        iqr: quartiles.iqr(),
        min: intercepts.iter().copied().fold(f64::INFINITY, f64::min),
        max: intercepts.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        mean_slope: 0.0,
        valid_trials: intercepts.len(),
        invalid_trials: 0,
    })
}

/// Aggregate trial fits, excluding invalid ones.
///
/// Returns `None` when no trial produced a valid fit.
pub fn compute_overhead(fits: &[TrialFit]) -> Option<OverheadEstimate> {
    let intercepts: Vec<f64> = fits.iter().filter_map(TrialFit::intercept).collect();
    let slopes: Vec<f64> = fits.iter().filter_map(TrialFit::slope).collect();

    let mut estimate = compute_overhead_from_intercepts(&intercepts)?;
    estimate.mean_slope = mean_std_dev(&slopes).map(|(m, _)| m).unwrap_or(0.0);
    estimate.invalid_trials = fits.len() - intercepts.len();
    Some(estimate)
}

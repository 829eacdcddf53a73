#![warn(missing_docs)]
//! OffBench Statistical Engine
//!
//! Turns timing samples into an overhead estimate:
//! - Ordinary least squares fit of latency against work size, per trial
//! - Degenerate-fit detection (coinciding x values never divide through)
//! - Aggregation of valid intercepts into mean ± Bessel-corrected stddev
//! - Order statistics of the intercept distribution

mod percentiles;
mod regression;
mod summary;

pub use percentiles::{Quartiles, compute_percentile, compute_quartiles};
pub use regression::{RegressionError, RegressionResult, TrialFit, fit_affine};
pub use summary::{
    OverheadEstimate, compute_overhead, compute_overhead_from_intercepts, mean_std_dev,
};

//! Affine Regression
//!
//! Fits `y ≈ slope · x + intercept` by ordinary least squares from the
//! closed-form sums Σx, Σy, Σx², Σxy:
//!
//! ```text
//! slope     = (n·Σxy − Σx·Σy) / (n·Σx² − (Σx)²)
//! intercept = (Σy − slope·Σx) / n
//! ```
//!
//! With x = delay length and y = per-call latency, the intercept is the
//! extrapolated latency at zero work: the fixed dispatch overhead.

use thiserror::Error;

/// Relative tolerance under which the design is treated as singular
const DEGENERATE_TOLERANCE: f64 = 1e-12;

/// Fitted affine model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegressionResult {
    /// Marginal cost per unit of x
    pub slope: f64,
    /// Extrapolated y at x = 0
    pub intercept: f64,
}

/// Reasons a fit is invalid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegressionError {
    #[error("need at least 2 samples, got {0}")]
    TooFewSamples(usize),

    #[error("x has {x} values but y has {y}")]
    LengthMismatch { x: usize, y: usize },

    #[error("all x values coincide; slope is undefined")]
    Degenerate,

    #[error("fit produced a non-finite value")]
    NonFinite,
}

/// Fit an affine model to paired samples
pub fn fit_affine(x: &[f64], y: &[f64]) -> Result<RegressionResult, RegressionError> {
    if x.len() != y.len() {
        return Err(RegressionError::LengthMismatch {
            x: x.len(),
            y: y.len(),
        });
    }
    let n = x.len();
    if n < 2 {
        return Err(RegressionError::TooFewSamples(n));
    }

    let (mut sum_x, mut sum_y, mut sum_xx, mut sum_xy) = (0.0, 0.0, 0.0, 0.0);
    for (&xi, &yi) in x.iter().zip(y) {
        sum_x += xi;
        sum_y += yi;
        sum_xx += xi * xi;
        sum_xy += xi * yi;
    }

    let nf = n as f64;
    let denominator = nf * sum_xx - sum_x * sum_x;
    let scale = (nf * sum_xx).abs().max(sum_x * sum_x);
    if denominator.abs() <= DEGENERATE_TOLERANCE * scale || denominator == 0.0 {
        return Err(RegressionError::Degenerate);
    }

    let slope = (nf * sum_xy - sum_x * sum_y) / denominator;
    let intercept = (sum_y - slope * sum_x) / nf;

    if !slope.is_finite() || !intercept.is_finite() {
        return Err(RegressionError::NonFinite);
    }

    Ok(RegressionResult { slope, intercept })
}

/// Fit outcome for one `(set, run)` trial
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrialFit {
    /// Set index
    pub set: usize,
    /// Run index within the set
    pub run: usize,
    /// The fit, or why it is invalid
    pub outcome: Result<RegressionResult, RegressionError>,
}

impl TrialFit {
    /// Fit one trial
    pub fn fit(set: usize, run: usize, x: &[f64], y: &[f64]) -> Self {
        Self {
            set,
            run,
            outcome: fit_affine(x, y),
        }
    }

    /// Whether the fit is usable
    pub fn is_valid(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Intercept of a valid fit
    pub fn intercept(&self) -> Option<f64> {
        self.outcome.as_ref().ok().map(|r| r.intercept)
    }

    /// Slope of a valid fit
    pub fn slope(&self) -> Option<f64> {
        self.outcome.as_ref().ok().map(|r| r.slope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic(x: &[f64]) -> Vec<f64> {
        x.iter().map(|&xi| 3.0 + 0.5 * xi).collect()
    }

    #[test]
    fn test_recovers_exact_line() {
        let x: Vec<f64> = (0..50).map(|i| (20 + i * 20) as f64).collect();
        let fit = fit_affine(&x, &synthetic(&x)).unwrap();

        assert!((fit.slope - 0.5).abs() < 1e-9);
        assert!((fit.intercept - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_recovers_line_from_two_points() {
        let x = [7.0, 1000.0];
        let fit = fit_affine(&x, &synthetic(&x)).unwrap();

        assert!((fit.slope - 0.5).abs() < 1e-9);
        assert!((fit.intercept - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_recovers_line_from_irregular_points() {
        let x = [1.0, 2.0, 2.0, 9.0, 31.0, 200.0];
        let fit = fit_affine(&x, &synthetic(&x)).unwrap();

        assert!((fit.slope - 0.5).abs() < 1e-9);
        assert!((fit.intercept - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_x() {
        let x = [50.0; 10];
        let y: Vec<f64> = (0..10).map(|i| i as f64).collect();
        assert_eq!(fit_affine(&x, &y), Err(RegressionError::Degenerate));
    }

    #[test]
    fn test_degenerate_large_x() {
        let x = [123_456.789; 50];
        let y = [1.0; 50];
        assert_eq!(fit_affine(&x, &y), Err(RegressionError::Degenerate));
    }

    #[test]
    fn test_too_few_and_mismatched() {
        assert_eq!(
            fit_affine(&[1.0], &[2.0]),
            Err(RegressionError::TooFewSamples(1))
        );
        assert_eq!(
            fit_affine(&[1.0, 2.0], &[2.0]),
            Err(RegressionError::LengthMismatch { x: 2, y: 1 })
        );
    }

    #[test]
    fn test_non_finite_input() {
        let x = [1.0, 2.0, 3.0];
        let y = [1.0, f64::NAN, 3.0];
        assert_eq!(fit_affine(&x, &y), Err(RegressionError::NonFinite));
    }

    #[test]
    fn test_trial_fit_accessors() {
        let x = [1.0, 2.0, 3.0];
        let good = TrialFit::fit(0, 1, &x, &synthetic(&x));
        assert!(good.is_valid());
        assert!((good.intercept().unwrap() - 3.0).abs() < 1e-9);
        assert!((good.slope().unwrap() - 0.5).abs() < 1e-9);

        let bad = TrialFit::fit(2, 3, &[4.0, 4.0], &[1.0, 2.0]);
        assert!(!bad.is_valid());
        assert_eq!(bad.intercept(), None);
        assert_eq!((bad.set, bad.run), (2, 3));
    }
}

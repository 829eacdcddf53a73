//! Percentile Computation
//!
//! Order statistics of the intercept distribution. These complement the
//! mean ± stddev headline when a few trials were disturbed (scheduler
//! preemption, frequency changes) and the distribution is skewed.

/// Lower quartile, median and upper quartile
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quartiles {
    /// 25th percentile
    pub q1: f64,
    /// 50th percentile
    pub median: f64,
    /// 75th percentile
    pub q3: f64,
}

impl Quartiles {
    /// Interquartile range
    pub fn iqr(&self) -> f64 {
        self.q3 - self.q1
    }
}

/// Compute a single percentile from samples
///
/// Uses linear interpolation between nearest ranks. Empty input yields 0.
pub fn compute_percentile(samples: &[f64], percentile: f64) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }

    if samples.len() == 1 {
        return samples[0];
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    interpolate(&sorted, percentile)
}

/// Compute quartiles with a single sort
pub fn compute_quartiles(samples: &[f64]) -> Quartiles {
    if samples.len() < 2 {
        let v = samples.first().copied().unwrap_or(0.0);
        return Quartiles {
            q1: v,
            median: v,
            q3: v,
        };
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    Quartiles {
        q1: interpolate(&sorted, 25.0),
        median: interpolate(&sorted, 50.0),
        q3: interpolate(&sorted, 75.0),
    }
}

fn interpolate(sorted: &[f64], percentile: f64) -> f64 {
    let n = sorted.len();
    let p = (percentile / 100.0).clamp(0.0, 1.0);

    let rank = p * (n - 1) as f64;
    let lower_idx = rank.floor() as usize;
    let upper_idx = (lower_idx + 1).min(n - 1);
    let fraction = rank - lower_idx as f64;

    sorted[lower_idx] + fraction * (sorted[upper_idx] - sorted[lower_idx])
}

//! Report Data Structures

use chrono::{DateTime, Utc};
use offbench_stats::OverheadEstimate;
use serde::{Deserialize, Serialize};

/// Current report schema version
pub const SCHEMA_VERSION: u32 = 1;

/// Complete measurement report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub meta: ReportMeta,
    pub results: Vec<StrategyResult>,
    pub summary: ReportSummary,
}

impl Report {
    /// Problem sizes requested, in measurement order
    pub fn sizes(&self) -> &[usize] {
        &self.meta.config.sizes
    }

    /// Whether more than one problem size was requested
    pub fn is_sweep(&self) -> bool {
        self.sizes().len() > 1
    }
}

/// Report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMeta {
    pub schema_version: u32,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub system: SystemInfo,
    pub config: ReportConfig,
}

/// Measurement parameters captured in report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub num_samples: usize,
    pub min_delay: usize,
    pub max_delay: usize,
    pub inner_reps: usize,
    pub sets: usize,
    pub runs: usize,
    pub warmup: String,
    pub device: String,
    pub device_threads: usize,
    pub sizes: Vec<usize>,
}

/// System information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub os: String,
    pub arch: String,
    pub cpu: String,
    pub cpu_cores: u32,
    pub memory_gb: f64,
}

/// Per-strategy outcome across all measured sizes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyResult {
    pub id: u32,
    pub name: String,
    pub description: String,
    pub status: StrategyStatus,
    pub cells: Vec<OverheadCell>,
    pub failure: Option<FailureInfo>,
}

/// Strategy execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyStatus {
    /// Every size produced an estimate
    Measured,
    /// Measurement completed but some size had no valid trial
    Partial,
    /// Dispatch failed or panicked
    Failed,
}

/// Overhead estimate for one `(strategy, size)` pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverheadCell {
    pub size: usize,
    pub overhead: Option<OverheadMetrics>,
    pub invalid_trials: usize,
}

impl OverheadCell {
    /// Cell for a size where no trial produced a valid fit
    pub fn unavailable(size: usize, invalid_trials: usize) -> Self {
        Self {
            size,
            overhead: None,
            invalid_trials,
        }
    }
}

/// Overhead statistics in microseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverheadMetrics {
    pub mean_us: f64,
    pub std_dev_us: f64,
    pub median_us: f64,
    pub iqr_us: f64,
    pub min_us: f64,
    pub max_us: f64,
    pub standard_error_us: f64,
    pub mean_slope_us: f64,
    pub valid_trials: usize,
}

impl From<&OverheadEstimate> for OverheadMetrics {
    fn from(est: &OverheadEstimate) -> Self {
        Self {
            mean_us: est.mean,
            std_dev_us: est.std_dev,
            median_us: est.median,
            iqr_us: est.iqr,
            min_us: est.min,
            max_us: est.max,
            standard_error_us: est.standard_error(),
            mean_slope_us: est.mean_slope,
            valid_trials: est.valid_trials,
        }
    }
}

/// Failure information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureInfo {
    pub kind: String,
    pub message: String,
}

/// Report summary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_strategies: usize,
    pub measured: usize,
    pub partial: usize,
    pub failed: usize,
    pub total_dispatches: u64,
    pub total_duration_ms: f64,
    /// Requested strategy ids that named no strategy
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<String>,
}

impl ReportSummary {
    /// Tally statuses of the given results
    pub fn tally(results: &[StrategyResult]) -> Self {
        let mut summary = Self {
            total_strategies: results.len(),
            ..Self::default()
        };
        for result in results {
            match result.status {
                StrategyStatus::Measured => summary.measured += 1,
                StrategyStatus::Partial => summary.partial += 1,
                StrategyStatus::Failed => summary.failed += 1,
            }
        }
        summary
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn dummy_meta(sizes: Vec<usize>) -> ReportMeta {
        ReportMeta {
            schema_version: SCHEMA_VERSION,
            version: "0.1.0".to_string(),
            timestamp: Utc::now(),
            system: SystemInfo {
                os: "linux".to_string(),
                arch: "x86_64".to_string(),
                cpu: "Unknown".to_string(),
                cpu_cores: 8,
                memory_gb: 16.0,
            },
            config: ReportConfig {
                num_samples: 50,
                min_delay: 20,
                max_delay: 1000,
                inner_reps: 20,
                sets: 20,
                runs: 20,
                warmup: "per-trial".to_string(),
                device: "thread".to_string(),
                device_threads: 8,
                sizes,
            },
        }
    }

    pub(crate) fn cell(size: usize, mean: f64, std_dev: f64) -> OverheadCell {
        OverheadCell {
            size,
            overhead: Some(OverheadMetrics {
                mean_us: mean,
                std_dev_us: std_dev,
                median_us: mean,
                iqr_us: 0.0,
                min_us: mean,
                max_us: mean,
                standard_error_us: 0.0,
                mean_slope_us: 0.01,
                valid_trials: 400,
            }),
            invalid_trials: 0,
        }
    }

    pub(crate) fn dummy_result(id: u32, name: &str, cells: Vec<OverheadCell>) -> StrategyResult {
        StrategyResult {
            id,
            name: name.to_string(),
            description: String::new(),
            status: StrategyStatus::Measured,
            cells,
            failure: None,
        }
    }

    pub(crate) fn dummy_report(results: Vec<StrategyResult>) -> Report {
        let sizes = results
            .first()
            .map(|r| r.cells.iter().map(|c| c.size).collect())
            .unwrap_or_default();
        let summary = ReportSummary::tally(&results);
        Report {
            meta: dummy_meta(sizes),
            results,
            summary,
        }
    }

    #[test]
    fn tally_counts_statuses() {
        let mut failed = dummy_result(2, "copy-in", vec![]);
        failed.status = StrategyStatus::Failed;
        let results = vec![dummy_result(1, "roundtrip", vec![cell(1024, 3.0, 0.1)]), failed];

        let summary = ReportSummary::tally(&results);
        assert_eq!(summary.total_strategies, 2);
        assert_eq!(summary.measured, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.partial, 0);
    }

    #[test]
    fn sweep_detection() {
        let single = dummy_report(vec![dummy_result(1, "roundtrip", vec![cell(1024, 3.0, 0.1)])]);
        assert!(!single.is_sweep());

        let sweep = dummy_report(vec![dummy_result(
            1,
            "roundtrip",
            vec![cell(1, 3.0, 0.1), cell(2, 3.1, 0.1)],
        )]);
        assert!(sweep.is_sweep());
        assert_eq!(sweep.sizes(), [1, 2]);
    }

    #[test]
    fn metrics_from_estimate() {
        let estimate = offbench_stats::compute_overhead_from_intercepts(&[8.0, 12.0]).unwrap();
        let metrics = OverheadMetrics::from(&estimate);
        assert_eq!(metrics.mean_us, 10.0);
        assert_eq!(metrics.valid_trials, 2);
        assert!(metrics.standard_error_us > 0.0);
    }
}

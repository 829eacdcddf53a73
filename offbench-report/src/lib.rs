//! OffBench Report - Reporting and Diagnostics
//!
//! Generates various output formats:
//! - JSON (machine-readable)
//! - CSV (spreadsheet-compatible)
//! - Intercept distribution files (one per strategy and size)
//!
//! The human table lives with the driver, which knows the terminal.

mod csv;
mod distribution;
mod json;
mod report;

pub use csv::generate_csv_report;
pub use distribution::{
    InterceptRecord, distribution_path, write_distribution, write_intercepts,
};
pub use json::{generate_json_report, parse_json_report};
pub use report::{
    FailureInfo, OverheadCell, OverheadMetrics, Report, ReportConfig, ReportMeta, ReportSummary,
    SCHEMA_VERSION, StrategyResult, StrategyStatus, SystemInfo,
};

/// Output format selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable terminal table
    #[default]
    Human,
    /// JSON with full schema
    Json,
    /// CSV for spreadsheets
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            "human" | "text" => Ok(OutputFormat::Human),
            other => Err(format!("Unknown output format: {}", other)),
        }
    }
}

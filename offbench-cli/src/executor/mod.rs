//! Measurement Executor
//!
//! Drives strategies through the timing harness and turns the timings into a
//! report.
//!
//! ## Pipeline Overview
//!
//! ```text
//! ExecutionPlan (strategies × sizes)
//!       │
//!       ▼
//! ┌─────────────┐
//! │   driver    │  Sanity gate, then TimingHarness per (strategy, size)
//! └──────┬──────┘
//!        │
//!        ▼
//! ┌─────────────┐
//! │ statistics  │  Per-trial affine fits, valid intercepts aggregated
//! └──────┬──────┘
//!        │
//!        ▼
//! ┌─────────────┐
//! │   report    │  StrategyResult rows + metadata
//! └──────┬──────┘
//!        │
//!        ▼
//! ┌─────────────┐
//! │ formatting  │  Human-readable output
//! └─────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`driver`] - State machine, failure isolation, distribution files
//! - [`statistics`] - Trial fitting and overhead aggregation
//! - [`report`] - Report building
//! - [`formatting`] - Human-readable output formatting
//! - [`metadata`] - System metadata collection

mod driver;
mod formatting;
mod metadata;
mod report;
mod statistics;

// Re-export public API
pub use driver::{
    CellOutcome, Driver, DriverError, DriverSettings, DriverState, StrategyOutcome,
};
pub use formatting::format_human_output;
pub use report::{build_report, strategy_result};
pub use statistics::{fit_trials, intercept_records, summarize};

#![warn(missing_docs)]
//! # OffBench
//!
//! Estimates the fixed cost of dispatching work to an offload execution
//! context, separated from the cost that grows with the work itself.
//!
//! Every dispatch strategy is timed over a schedule of synthetic workloads of
//! increasing size. Each independent trial is fitted with
//! `latency = overhead + rate · size`; the intercepts of all valid trials are
//! reported as mean ± standard deviation.
//!
//! - **Pluggable strategies**: built-ins register through `inventory`; custom
//!   ones implement [`DispatchStrategy`] and go into a [`StrategyRegistry`]
//! - **Offload device**: a dedicated thread with its own memory and a team
//!   pool, checked by a sanity gate before anything is timed
//! - **Robust statistics**: degenerate fits are excluded, never averaged in
//! - **Reports**: terminal table, JSON, CSV and raw intercept distributions
//!
//! ## Quick Start
//!
//! ```ignore
//! use offbench::prelude::*;
//!
//! let config = OffbenchConfig::default();
//! let report = offbench::measure(&config, &[1, 5], vec![1024])?;
//! print!("{}", offbench::format_human_output(&report));
//! ```
//!
//! ## Custom Strategies
//!
//! ```ignore
//! struct Echo;
//!
//! impl DispatchStrategy for Echo {
//!     fn id(&self) -> StrategyId { StrategyId(100) }
//!     fn name(&self) -> &str { "echo" }
//!     fn dispatch(&self, device: &Device, host: &mut [f64], w: Workload) -> Result<(), DispatchError> {
//!         let mut buf = host.to_vec();
//!         let buf = device.execute(move |_| { w.apply(&mut buf); buf })?;
//!         host.copy_from_slice(&buf);
//!         Ok(())
//!     }
//! }
//! ```

// Re-export core types
pub use offbench_core::{
    Completion, Device, DeviceConfig, DeviceContext, DeviceError, DeviceKind, DispatchError,
    DispatchStrategy, HarnessConfig, Measurement, StrategyId, StrategyRegistry, TimingHarness,
    TimingMatrix, WarmupPolicy, Workload, WorkloadGenerator, strategies,
};

// Re-export stats
pub use offbench_stats::{
    OverheadEstimate, RegressionError, RegressionResult, TrialFit, compute_overhead, fit_affine,
};

// Re-export report types
pub use offbench_report::{OutputFormat, Report, StrategyResult, StrategyStatus};

// Re-export the driver
pub use offbench_cli::{
    ContextDivergenceGate, Driver, DriverError, DriverSettings, DriverState, OffbenchConfig,
    SanityError, SanityGate, format_human_output, measure, render,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Device, DispatchError, DispatchStrategy, Driver, DriverSettings, OffbenchConfig,
        StrategyId, StrategyRegistry, Workload, WorkloadGenerator,
    };
}

/// Run the OffBench CLI.
///
/// ```ignore
/// fn main() {
///     offbench::run().unwrap();
/// }
/// ```
pub use offbench_cli::run;

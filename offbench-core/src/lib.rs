#![warn(missing_docs)]
//! OffBench Core - Measurement Runtime
//!
//! This crate provides everything that runs while the clock is ticking:
//! - `WorkloadGenerator` and `Workload` for size-parameterized synthetic work
//! - `Device`, the offload execution context under test
//! - `DispatchStrategy` and the `StrategyRegistry` of built-in policies
//! - `TimingHarness`, which sweeps the delay schedule into a `TimingMatrix`

mod device;
mod harness;
mod measure;
pub mod strategies;
mod strategy;
mod workload;

pub use device::{Completion, Device, DeviceConfig, DeviceContext, DeviceError, DeviceKind};
pub use harness::{
    DEFAULT_INNER_REPS, DEFAULT_RUNS, DEFAULT_SETS, HarnessConfig, HarnessConfigError,
    Measurement, TimingHarness, TimingMatrix, Trial, WarmupPolicy,
};
pub use measure::{Timer, per_call_us, pin_to_cpu};
pub use strategy::{DispatchError, DispatchStrategy, StrategyDef, StrategyId, StrategyRegistry};
pub use workload::{
    DEFAULT_MAX_DELAY, DEFAULT_MIN_DELAY, DEFAULT_NUM_SAMPLES, DelaySample, ScheduleError,
    Workload, WorkloadGenerator,
};

/// Anchor to prevent LTO from stripping inventory entries
#[used]
#[doc(hidden)]
pub static REGISTRY_ANCHOR: fn() = || {
    for _ in inventory::iter::<StrategyDef> {}
};

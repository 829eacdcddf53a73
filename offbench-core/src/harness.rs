//! Timing Harness
//!
//! Sweeps the delay schedule for one strategy and buffer size, producing a
//! dense [`TimingMatrix`] of per-call latencies.
//!
//! ## Sweep Structure
//!
//! ```text
//! for set in 0..sets
//!   [warm-up sweep]                 (per-set policy)
//!   for run in 0..runs
//!     [warm-up sweep]               (per-trial policy)
//!     for sample in schedule
//!       t0 ── dispatch × inner_reps ── t1
//!       matrix[set][run][sample] = (t1 - t0) / inner_reps
//! ```
//!
//! Each cell is the average of a batch of back-to-back dispatches, not a
//! per-call timestamp. Variance within a batch is therefore invisible; the
//! reported uncertainty comes only from differences between trials.

use crate::device::Device;
use crate::measure::Timer;
use crate::strategy::{DispatchError, DispatchStrategy, StrategyId};
use crate::workload::{Workload, WorkloadGenerator};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default back-to-back dispatches per timed batch
pub const DEFAULT_INNER_REPS: usize = 20;

/// Default number of benchmark sets
pub const DEFAULT_SETS: usize = 20;

/// Default number of recorded runs per set
pub const DEFAULT_RUNS: usize = 20;

/// When discarded warm-up sweeps happen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum WarmupPolicy {
    /// Before every recorded trial
    #[default]
    PerTrial,
    /// Once at the start of every set
    PerSet,
}

impl std::str::FromStr for WarmupPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "per-trial" | "trial" => Ok(WarmupPolicy::PerTrial),
            "per-set" | "set" => Ok(WarmupPolicy::PerSet),
            other => Err(format!("Unknown warm-up policy: {}", other)),
        }
    }
}

impl std::fmt::Display for WarmupPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WarmupPolicy::PerTrial => f.write_str("per-trial"),
            WarmupPolicy::PerSet => f.write_str("per-set"),
        }
    }
}

/// Repetition counts for a sweep
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Dispatches per timed batch
    pub inner_reps: usize,
    /// Benchmark sets
    pub sets: usize,
    /// Recorded runs per set
    pub runs: usize,
    /// Warm-up placement
    pub warmup: WarmupPolicy,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            inner_reps: DEFAULT_INNER_REPS,
            sets: DEFAULT_SETS,
            runs: DEFAULT_RUNS,
            warmup: WarmupPolicy::default(),
        }
    }
}

/// Rejected harness configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HarnessConfigError {
    #[error("inner_reps must be at least 1")]
    ZeroInnerReps,

    #[error("sets must be at least 1")]
    ZeroSets,

    #[error("runs must be at least 1")]
    ZeroRuns,
}

impl HarnessConfig {
    /// Check that every repetition count is non-zero
    pub fn validate(&self) -> Result<(), HarnessConfigError> {
        if self.inner_reps == 0 {
            return Err(HarnessConfigError::ZeroInnerReps);
        }
        if self.sets == 0 {
            return Err(HarnessConfigError::ZeroSets);
        }
        if self.runs == 0 {
            return Err(HarnessConfigError::ZeroRuns);
        }
        Ok(())
    }

    /// Number of recorded trials per measurement
    pub fn trials(&self) -> usize {
        self.sets * self.runs
    }
}

/// Per-call latencies for one strategy and buffer size.
///
/// Indexed by `(set, run, sample)`. Only the harness builds matrices, and it
/// only hands them out once every cell has been written.
#[derive(Debug, Clone)]
pub struct TimingMatrix {
    strategy: StrategyId,
    size: usize,
    sets: usize,
    runs: usize,
    delays: Vec<f64>,
    elapsed_us: Vec<f64>,
}

/// One `(set, run)` row of a matrix
#[derive(Debug, Clone, Copy)]
pub struct Trial<'a> {
    /// Set index
    pub set: usize,
    /// Run index within the set
    pub run: usize,
    /// Per-call latency in microseconds, one per delay sample
    pub elapsed_us: &'a [f64],
}

impl TimingMatrix {
    fn new(strategy: StrategyId, size: usize, sets: usize, runs: usize, delays: Vec<f64>) -> Self {
        let cells = sets * runs * delays.len();
        Self {
            strategy,
            size,
            sets,
            runs,
            delays,
            elapsed_us: vec![0.0; cells],
        }
    }

    fn row_mut(&mut self, set: usize, run: usize) -> &mut [f64] {
        let n = self.delays.len();
        let start = (set * self.runs + run) * n;
        &mut self.elapsed_us[start..start + n]
    }

    /// Strategy measured
    pub fn strategy(&self) -> StrategyId {
        self.strategy
    }

    /// Host buffer size measured
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of sets
    pub fn sets(&self) -> usize {
        self.sets
    }

    /// Runs per set
    pub fn runs(&self) -> usize {
        self.runs
    }

    /// Samples per trial
    pub fn num_samples(&self) -> usize {
        self.delays.len()
    }

    /// Delay lengths shared by every trial
    pub fn delays(&self) -> &[f64] {
        &self.delays
    }

    /// Latencies of one trial
    pub fn trial(&self, set: usize, run: usize) -> Option<&[f64]> {
        if set >= self.sets || run >= self.runs {
            return None;
        }
        let n = self.delays.len();
        let start = (set * self.runs + run) * n;
        Some(&self.elapsed_us[start..start + n])
    }

    /// Latency of a single cell
    pub fn get(&self, set: usize, run: usize, sample: usize) -> Option<f64> {
        self.trial(set, run).and_then(|row| row.get(sample).copied())
    }

    /// All trials in `(set, run)` order
    pub fn trials(&self) -> impl Iterator<Item = Trial<'_>> {
        let n = self.delays.len().max(1);
        self.elapsed_us
            .chunks(n)
            .enumerate()
            .map(move |(i, elapsed_us)| Trial {
                set: i / self.runs,
                run: i % self.runs,
                elapsed_us,
            })
    }

    /// Number of recorded trials
    pub fn trial_count(&self) -> usize {
        self.sets * self.runs
    }
}

/// A completed measurement and its bookkeeping
#[derive(Debug, Clone)]
pub struct Measurement {
    /// Recorded latencies
    pub matrix: TimingMatrix,
    /// Sweeps run and discarded as warm-up
    pub warmup_sweeps: usize,
    /// Sweeps recorded into the matrix
    pub recorded_sweeps: usize,
    /// Total dispatch calls, warm-up included
    pub dispatches: u64,
    /// Wall time of the whole measurement
    pub duration_ns: u64,
}

/// Times one strategy over the delay schedule
pub struct TimingHarness<'a> {
    config: &'a HarnessConfig,
    generator: &'a WorkloadGenerator,
}

impl<'a> TimingHarness<'a> {
    /// Create a harness over a schedule
    pub fn new(config: &'a HarnessConfig, generator: &'a WorkloadGenerator) -> Self {
        Self { config, generator }
    }

    /// Measure `strategy` dispatching into `device` with `host` as the mapped buffer.
    ///
    /// Stops at the first dispatch error; no partial matrix is returned.
    pub fn measure(
        &self,
        strategy: &dyn DispatchStrategy,
        device: &Device,
        host: &mut [f64],
    ) -> Result<Measurement, DispatchError> {
        let timer = Timer::start();
        let mut matrix = TimingMatrix::new(
            strategy.id(),
            host.len(),
            self.config.sets,
            self.config.runs,
            self.generator.delays(),
        );
        let mut discard = vec![0.0; self.generator.len()];
        let mut warmup_sweeps = 0;
        let mut recorded_sweeps = 0;
        let mut dispatches = 0;

        for set in 0..self.config.sets {
            if self.config.warmup == WarmupPolicy::PerSet {
                dispatches += self.sweep(strategy, device, host, &mut discard)?;
                warmup_sweeps += 1;
            }
            for run in 0..self.config.runs {
                if self.config.warmup == WarmupPolicy::PerTrial {
                    dispatches += self.sweep(strategy, device, host, &mut discard)?;
                    warmup_sweeps += 1;
                }
                dispatches += self.sweep(strategy, device, host, matrix.row_mut(set, run))?;
                recorded_sweeps += 1;
            }
            tracing::trace!(strategy = strategy.name(), set, "set complete");
        }

        Ok(Measurement {
            matrix,
            warmup_sweeps,
            recorded_sweeps,
            dispatches,
            duration_ns: timer.stop(),
        })
    }

    /// One pass over the schedule, writing per-call latency into `out`
    fn sweep(
        &self,
        strategy: &dyn DispatchStrategy,
        device: &Device,
        host: &mut [f64],
        out: &mut [f64],
    ) -> Result<u64, DispatchError> {
        let inner_reps = self.config.inner_reps;
        for (sample, slot) in self.generator.samples().iter().zip(out.iter_mut()) {
            let workload = Workload::new(sample.delay_length);
            let timer = Timer::start();
            for _ in 0..inner_reps {
                strategy.dispatch(device, host, workload)?;
                if let Some(first) = host.first_mut() {
                    *first += 1.0;
                }
                std::hint::black_box(&mut *host);
            }
            *slot = timer.stop_per_call_us(inner_reps);
        }
        Ok((self.generator.len() * inner_reps) as u64)
    }
}

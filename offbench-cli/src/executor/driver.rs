//! Measurement Driver
//!
//! Runs the plan through a fixed sequence of states:
//!
//! ```text
//! Init ──► SanityCheck ──pass──► Measuring ──► Aggregating ──► Reporting ──► Done
//!                │                   │
//!                └──fail──► Aborted ◄┘ (host allocation failure)
//! ```
//!
//! A failing sanity gate aborts before the first timed dispatch. A strategy
//! that errors or panics only fails its own row; the rest of the plan still
//! runs.

use super::report::{build_report, strategy_result};
use super::statistics::{fit_trials, intercept_records};
use crate::config::ConfigError;
use crate::sanity::{ContextDivergenceGate, SanityError, SanityGate};
use indicatif::{ProgressBar, ProgressStyle};
use offbench_core::{
    Device, DeviceConfig, DeviceError, DispatchStrategy, HarnessConfig, Measurement, StrategyId,
    TimingHarness, WorkloadGenerator, pin_to_cpu,
};
use offbench_report::{FailureInfo, Report, ReportConfig, StrategyResult, write_distribution};
use offbench_stats::TrialFit;
use std::collections::TryReserveError;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::PathBuf;
use std::time::Instant;
use thiserror::Error;

/// Fatal driver failure
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to allocate host buffer of {size} elements: {source}")]
    Allocation {
        size: usize,
        #[source]
        source: TryReserveError,
    },

    #[error("sanity gate '{gate}' failed: {source}")]
    SanityGate {
        gate: String,
        #[source]
        source: SanityError,
    },

    #[error("device error: {0}")]
    Device(#[from] DeviceError),
}

/// Driver lifecycle position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// Constructed, nothing checked yet
    Init,
    /// Running the sanity gate
    SanityCheck,
    /// Timing loop in progress
    Measuring,
    /// Stopped before producing a report
    Aborted,
    /// Fitting and summarizing trials
    Aggregating,
    /// Assembling the report
    Reporting,
    /// Report produced
    Done,
}

/// Everything a run needs besides the device and the strategies
#[derive(Debug, Clone)]
pub struct DriverSettings {
    /// Delay schedule
    pub generator: WorkloadGenerator,
    /// Repetition counts
    pub harness: HarnessConfig,
    /// Host buffer lengths to measure
    pub sizes: Vec<usize>,
    /// Directory for intercept distribution files
    pub distribution: Option<PathBuf>,
    /// Pin the measuring thread to this CPU
    pub pin_cpu: Option<usize>,
    /// Draw a progress bar on stderr
    pub show_progress: bool,
}

impl DriverSettings {
    /// Settings with the default schedule and repetition counts
    pub fn new(sizes: Vec<usize>) -> Self {
        Self {
            generator: WorkloadGenerator::default(),
            harness: HarnessConfig::default(),
            sizes,
            distribution: None,
            pin_cpu: None,
            show_progress: false,
        }
    }

    /// Reject settings that cannot produce a measurement
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.harness.validate()?;
        if self.sizes.contains(&0) {
            return Err(ConfigError::ZeroSize);
        }
        Ok(())
    }
}

/// Trial fits for one `(strategy, size)` pair
#[derive(Debug, Clone)]
pub struct CellOutcome {
    /// Host buffer length
    pub size: usize,
    /// One fit per recorded trial
    pub fits: Vec<TrialFit>,
    /// Dispatches issued, warm-up included
    pub dispatches: u64,
}

/// Everything measured for one strategy
#[derive(Debug, Clone)]
pub struct StrategyOutcome {
    /// Strategy id
    pub id: StrategyId,
    /// Strategy name
    pub name: String,
    /// Strategy description
    pub description: String,
    /// Sizes measured before any failure
    pub cells: Vec<CellOutcome>,
    /// Why the strategy stopped, if it did
    pub failure: Option<FailureInfo>,
}

impl StrategyOutcome {
    fn new(strategy: &dyn DispatchStrategy) -> Self {
        Self {
            id: strategy.id(),
            name: strategy.name().to_string(),
            description: strategy.description().to_string(),
            cells: Vec::new(),
            failure: None,
        }
    }
}

/// Runs a plan against one device
pub struct Driver {
    device: Device,
    gate: Box<dyn SanityGate>,
    settings: DriverSettings,
    state: DriverState,
}

impl Driver {
    /// Driver over an existing device with the context-divergence gate
    pub fn new(device: Device, settings: DriverSettings) -> Self {
        Self {
            device,
            gate: Box::new(ContextDivergenceGate),
            settings,
            state: DriverState::Init,
        }
    }

    /// Start a device from configuration and wrap it in a driver
    pub fn spawn(device: &DeviceConfig, settings: DriverSettings) -> Result<Self, DriverError> {
        Ok(Self::new(Device::new(device)?, settings))
    }

    /// Replace the sanity gate
    pub fn with_gate(mut self, gate: impl SanityGate + 'static) -> Self {
        self.gate = Box::new(gate);
        self
    }

    /// Current lifecycle state
    pub fn state(&self) -> DriverState {
        self.state
    }

    /// The device under test
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Measure every strategy at every configured size and build the report
    pub fn run(&mut self, strategies: &[&dyn DispatchStrategy]) -> Result<Report, DriverError> {
        let start = Instant::now();
        self.transition(DriverState::Init);

        if let Err(e) = self.settings.validate() {
            self.transition(DriverState::Aborted);
            return Err(e.into());
        }
        if let Some(cpu) = self.settings.pin_cpu {
            if let Err(e) = pin_to_cpu(cpu) {
                tracing::warn!(cpu, error = %e, "failed to pin measuring thread");
            }
        }

        self.transition(DriverState::SanityCheck);
        if let Err(source) = self.gate.check(&self.device) {
            self.transition(DriverState::Aborted);
            return Err(DriverError::SanityGate {
                gate: self.gate.name().to_string(),
                source,
            });
        }
        tracing::info!(gate = self.gate.name(), "sanity gate passed");

        self.transition(DriverState::Measuring);
        let outcomes = match self.measure_all(strategies) {
            Ok(outcomes) => outcomes,
            Err(e) => {
                self.transition(DriverState::Aborted);
                return Err(e);
            }
        };

        self.transition(DriverState::Aggregating);
        let results = self.aggregate(&outcomes);
        let dispatches = outcomes
            .iter()
            .flat_map(|o| &o.cells)
            .map(|c| c.dispatches)
            .sum();

        self.transition(DriverState::Reporting);
        let total_duration_ms = start.elapsed().as_secs_f64() * 1000.0;
        let report = build_report(results, self.report_config(), dispatches, total_duration_ms);

        self.transition(DriverState::Done);
        Ok(report)
    }

    fn transition(&mut self, next: DriverState) {
        tracing::debug!(from = ?self.state, to = ?next, "driver state");
        self.state = next;
    }

    fn measure_all(
        &self,
        strategies: &[&dyn DispatchStrategy],
    ) -> Result<Vec<StrategyOutcome>, DriverError> {
        let sizes = &self.settings.sizes;
        let pb = progress_bar((strategies.len() * sizes.len()) as u64, self.settings.show_progress);
        let harness = TimingHarness::new(&self.settings.harness, &self.settings.generator);
        let mut outcomes = Vec::with_capacity(strategies.len());

        for &strategy in strategies {
            pb.set_message(strategy.name().to_string());
            let mut outcome = StrategyOutcome::new(strategy);

            for (i, &size) in sizes.iter().enumerate() {
                let mut host = allocate_host(size)?;
                match measure_isolated(&harness, strategy, &self.device, &mut host) {
                    Ok(measurement) => {
                        tracing::debug!(
                            strategy = strategy.name(),
                            size,
                            warmup_sweeps = measurement.warmup_sweeps,
                            recorded_sweeps = measurement.recorded_sweeps,
                            duration_ms = measurement.duration_ns as f64 / 1e6,
                            "measurement complete"
                        );
                        outcome.cells.push(CellOutcome {
                            size,
                            fits: fit_trials(&measurement.matrix),
                            dispatches: measurement.dispatches,
                        });
                        pb.inc(1);
                    }
                    Err(failure) => {
                        tracing::warn!(
                            strategy = strategy.name(),
                            size,
                            kind = %failure.kind,
                            "strategy failed: {}",
                            failure.message
                        );
                        outcome.failure = Some(failure);
                        pb.inc((sizes.len() - i) as u64);
                        break;
                    }
                }
            }
            outcomes.push(outcome);
        }

        pb.finish_and_clear();
        Ok(outcomes)
    }

    fn aggregate(&self, outcomes: &[StrategyOutcome]) -> Vec<StrategyResult> {
        if let Some(dir) = &self.settings.distribution {
            for outcome in outcomes {
                for cell in &outcome.cells {
                    let records = intercept_records(&cell.fits);
                    if let Err(e) = write_distribution(dir, &outcome.name, cell.size, &records) {
                        tracing::warn!(
                            dir = %dir.display(),
                            strategy = %outcome.name,
                            size = cell.size,
                            error = %e,
                            "failed to write intercept distribution"
                        );
                    }
                }
            }
        }
        outcomes.iter().map(strategy_result).collect()
    }

    fn report_config(&self) -> ReportConfig {
        let schedule = self.settings.generator.samples();
        ReportConfig {
            num_samples: schedule.len(),
            min_delay: schedule.first().map_or(0, |s| s.delay_length),
            max_delay: schedule.last().map_or(0, |s| s.delay_length),
            inner_reps: self.settings.harness.inner_reps,
            sets: self.settings.harness.sets,
            runs: self.settings.harness.runs,
            warmup: self.settings.harness.warmup.to_string(),
            device: self.device.kind().to_string(),
            device_threads: self.device.threads(),
            sizes: self.settings.sizes.clone(),
        }
    }
}

fn progress_bar(len: u64, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

/// Host buffer of `size` zeros, without aborting the process on failure
fn allocate_host(size: usize) -> Result<Vec<f64>, DriverError> {
    let mut host = Vec::new();
    host.try_reserve_exact(size)
        .map_err(|source| DriverError::Allocation { size, source })?;
    host.resize(size, 0.0);
    Ok(host)
}

/// Run one measurement, turning errors and panics into a failure record
fn measure_isolated(
    harness: &TimingHarness<'_>,
    strategy: &dyn DispatchStrategy,
    device: &Device,
    host: &mut [f64],
) -> Result<Measurement, FailureInfo> {
    match catch_unwind(AssertUnwindSafe(|| harness.measure(strategy, device, host))) {
        Ok(Ok(measurement)) => Ok(measurement),
        Ok(Err(e)) => Err(FailureInfo {
            kind: "dispatch".to_string(),
            message: e.to_string(),
        }),
        Err(panic) => {
            let message = if let Some(s) = panic.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = panic.downcast_ref::<String>() {
                s.clone()
            } else {
                "Unknown panic".to_string()
            };
            Err(FailureInfo {
                kind: "panic".to_string(),
                message,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sanity::AcceptAll;
    use offbench_core::{DispatchError, Workload};
    use offbench_report::StrategyStatus;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct Counting {
        id: u32,
        calls: AtomicU64,
    }

    impl Counting {
        fn new(id: u32) -> Self {
            Self {
                id,
                calls: AtomicU64::new(0),
            }
        }
    }

    impl DispatchStrategy for Counting {
        fn id(&self) -> StrategyId {
            StrategyId(self.id)
        }

        fn name(&self) -> &str {
            "counting"
        }

        fn dispatch(
            &self,
            device: &Device,
            host: &mut [f64],
            workload: Workload,
        ) -> Result<(), DispatchError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            let mut buffer = host.to_vec();
            let buffer = device.execute(move |_| {
                workload.apply(&mut buffer);
                buffer
            })?;
            host.copy_from_slice(&buffer);
            Ok(())
        }
    }

    struct Panicking;

    impl DispatchStrategy for Panicking {
        fn id(&self) -> StrategyId {
            StrategyId(99)
        }

        fn name(&self) -> &str {
            "panicking"
        }

        fn dispatch(&self, _: &Device, _: &mut [f64], _: Workload) -> Result<(), DispatchError> {
            panic!("boom");
        }
    }

    struct Refusing;

    impl SanityGate for Refusing {
        fn name(&self) -> &str {
            "refusing"
        }

        fn check(&self, _: &Device) -> Result<(), SanityError> {
            Err(SanityError::Rejected("not today".to_string()))
        }
    }

    fn tiny_settings(sizes: Vec<usize>) -> DriverSettings {
        DriverSettings {
            generator: WorkloadGenerator::new(1, 8, 4).unwrap(),
            harness: HarnessConfig {
                inner_reps: 2,
                sets: 2,
                runs: 3,
                ..HarnessConfig::default()
            },
            ..DriverSettings::new(sizes)
        }
    }

    #[test]
    fn test_failed_gate_aborts_before_dispatch() {
        let strategy = Counting::new(1);
        let mut driver = Driver::new(Device::spawn().unwrap(), tiny_settings(vec![16])).with_gate(Refusing);

        let err = driver.run(&[&strategy]).unwrap_err();
        assert!(matches!(err, DriverError::SanityGate { ref gate, .. } if gate == "refusing"));
        assert_eq!(driver.state(), DriverState::Aborted);
        assert_eq!(strategy.calls.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_inline_device_fails_default_gate() {
        let strategy = Counting::new(1);
        let mut driver = Driver::new(Device::inline().unwrap(), tiny_settings(vec![16]));

        let err = driver.run(&[&strategy]).unwrap_err();
        assert!(matches!(err, DriverError::SanityGate { .. }));
        assert_eq!(strategy.calls.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_full_run_reaches_done() {
        let strategy = Counting::new(1);
        let mut driver = Driver::new(Device::spawn().unwrap(), tiny_settings(vec![4, 8]));

        let report = driver.run(&[&strategy]).unwrap();
        assert_eq!(driver.state(), DriverState::Done);
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.sizes(), vec![4, 8]);
        // (warm-up + recorded) sweeps × samples × inner reps, per size
        let per_size = (2 * 3 * 2) * 4 * 2;
        assert_eq!(strategy.calls.load(Ordering::Relaxed), 2 * per_size);
        assert_eq!(report.summary.total_dispatches, 2 * per_size);
    }

    #[test]
    fn test_panicking_strategy_is_isolated() {
        let good = Counting::new(1);
        let mut driver =
            Driver::new(Device::inline().unwrap(), tiny_settings(vec![8])).with_gate(AcceptAll);

        let report = driver.run(&[&Panicking, &good]).unwrap();
        assert_eq!(report.results[0].status, StrategyStatus::Failed);
        let failure = report.results[0].failure.as_ref().unwrap();
        assert_eq!(failure.kind, "panic");
        assert_eq!(failure.message, "boom");
        assert_ne!(report.results[1].status, StrategyStatus::Failed);
        assert_eq!(report.summary.failed, 1);
    }

    #[test]
    fn test_zero_size_rejected() {
        let mut driver = Driver::new(Device::spawn().unwrap(), tiny_settings(vec![8, 0]));
        let err = driver.run(&[]).unwrap_err();
        assert!(matches!(err, DriverError::Config(ConfigError::ZeroSize)));
    }

    #[test]
    fn test_unallocatable_buffer_is_fatal() {
        let strategy = Counting::new(1);
        let mut driver = Driver::new(Device::spawn().unwrap(), tiny_settings(vec![usize::MAX]));

        let err = driver.run(&[&strategy]).unwrap_err();
        assert!(matches!(err, DriverError::Allocation { size, .. } if size == usize::MAX));
        assert_eq!(driver.state(), DriverState::Aborted);
        assert_eq!(strategy.calls.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_distribution_files_written() {
        let tmp = tempfile::tempdir().unwrap();
        let strategy = Counting::new(1);
        let mut settings = tiny_settings(vec![4]);
        settings.distribution = Some(tmp.path().to_path_buf());
        let mut driver = Driver::new(Device::spawn().unwrap(), settings);

        driver.run(&[&strategy]).unwrap();
        let content = std::fs::read_to_string(tmp.path().join("counting-n4.txt")).unwrap();
        assert!(content.lines().count() <= 6);
        for line in content.lines() {
            assert_eq!(line.split(' ').count(), 3);
        }
    }
}

//! Workload Generator
//!
//! A synthetic unit of work whose cost is proportional to its delay length:
//! `delay_length` increments applied round-robin across a bounded buffer.
//!
//! The generator also owns the delay schedule, the fixed ladder of delay
//! lengths swept by every trial.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default number of delay samples per trial
pub const DEFAULT_NUM_SAMPLES: usize = 50;

/// Default smallest delay length
pub const DEFAULT_MIN_DELAY: usize = 20;

/// Default largest delay length
pub const DEFAULT_MAX_DELAY: usize = 1000;

/// A single unit of work of a given delay length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Workload {
    delay_length: usize,
}

impl Workload {
    /// Create a workload performing `delay_length` increments
    pub const fn new(delay_length: usize) -> Self {
        Self { delay_length }
    }

    /// Number of increment operations this workload performs
    pub const fn delay_length(&self) -> usize {
        self.delay_length
    }

    /// Apply the workload to `buffer`, returning the number of increments performed.
    ///
    /// Indexing wraps modulo the buffer length, so the delay may exceed the
    /// buffer size. An empty buffer receives no work.
    #[inline]
    pub fn apply(&self, buffer: &mut [f64]) -> usize {
        let len = buffer.len();
        if len == 0 {
            return 0;
        }
        for i in 0..self.delay_length {
            buffer[i % len] += 1.0;
        }
        self.delay_length
    }
}

/// One point of the delay schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelaySample {
    /// Delay length at this point
    pub delay_length: usize,
    /// Position in the schedule
    pub index: usize,
}

/// Rejected delay schedule parameters
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("delay schedule needs at least 2 samples, got {0}")]
    TooFewSamples(usize),

    #[error("min delay {min} exceeds max delay {max}")]
    InvertedRange { min: usize, max: usize },

    #[error(
        "delay range {min}..={max} cannot hold {samples} strictly increasing samples"
    )]
    RangeTooNarrow {
        min: usize,
        max: usize,
        samples: usize,
    },
}

/// Produces the linearly spaced delay schedule and its workloads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadGenerator {
    samples: Vec<DelaySample>,
}

impl WorkloadGenerator {
    /// Build the schedule `min + i * (max - min) / (num_samples - 1)`.
    ///
    /// Integer division is used for each point, so the range must be at least
    /// `num_samples - 1` wide for the schedule to be strictly increasing.
    pub fn new(min_delay: usize, max_delay: usize, num_samples: usize) -> Result<Self, ScheduleError> {
        if num_samples < 2 {
            return Err(ScheduleError::TooFewSamples(num_samples));
        }
        if min_delay > max_delay {
            return Err(ScheduleError::InvertedRange {
                min: min_delay,
                max: max_delay,
            });
        }
        let span = max_delay - min_delay;
        if span < num_samples - 1 {
            return Err(ScheduleError::RangeTooNarrow {
                min: min_delay,
                max: max_delay,
                samples: num_samples,
            });
        }

        Ok(Self::linear(min_delay, span, num_samples))
    }

    /// Schedule for an already validated range
    fn linear(min_delay: usize, span: usize, num_samples: usize) -> Self {
        let samples = (0..num_samples)
            .map(|index| DelaySample {
                delay_length: min_delay + index * span / (num_samples - 1),
                index,
            })
            .collect();
        Self { samples }
    }

    /// The schedule, ordered by index
    pub fn samples(&self) -> &[DelaySample] {
        &self.samples
    }

    /// Number of points in the schedule
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Always false: a schedule holds at least two points
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Delay lengths as regression abscissae
    pub fn delays(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.delay_length as f64).collect()
    }

    /// Workload for the sample at `index`
    pub fn workload(&self, index: usize) -> Option<Workload> {
        self.samples.get(index).map(|s| Workload::new(s.delay_length))
    }
}

const _: () = assert!(
    DEFAULT_NUM_SAMPLES >= 2
        && DEFAULT_MAX_DELAY >= DEFAULT_MIN_DELAY
        && DEFAULT_MAX_DELAY - DEFAULT_MIN_DELAY >= DEFAULT_NUM_SAMPLES - 1
);

impl Default for WorkloadGenerator {
    fn default() -> Self {
        Self::linear(
            DEFAULT_MIN_DELAY,
            DEFAULT_MAX_DELAY - DEFAULT_MIN_DELAY,
            DEFAULT_NUM_SAMPLES,
        )
    }
}

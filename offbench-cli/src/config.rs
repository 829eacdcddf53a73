//! Configuration loading from offbench.toml
//!
//! OffBench configuration can be specified in an `offbench.toml` file. The
//! file is discovered by walking up from the current directory; command line
//! flags override whatever it sets.

use offbench_core::{
    DEFAULT_INNER_REPS, DEFAULT_MAX_DELAY, DEFAULT_MIN_DELAY, DEFAULT_NUM_SAMPLES, DEFAULT_RUNS,
    DEFAULT_SETS, DeviceConfig, DeviceKind, HarnessConfig, HarnessConfigError, ScheduleError,
    WarmupPolicy, WorkloadGenerator,
};
use offbench_report::OutputFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the configuration file looked up during discovery
pub const CONFIG_FILE_NAME: &str = "offbench.toml";

/// Default host buffer length
pub const DEFAULT_SIZE: usize = 1024;

/// Rejected or unreadable configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid delay schedule: {0}")]
    Schedule(#[from] ScheduleError),

    #[error("invalid harness settings: {0}")]
    Harness(#[from] HarnessConfigError),

    #[error("problem size must be at least 1")]
    ZeroSize,

    #[error("device thread count must be at least 1")]
    ZeroDeviceThreads,

    #[error("invalid strategy filter: {0}")]
    Filter(#[from] regex::Error),
}

/// OffBench configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct OffbenchConfig {
    /// Sweep shape and repetition counts
    #[serde(default)]
    pub harness: HarnessSection,
    /// Execution context under test
    #[serde(default)]
    pub device: DeviceSection,
    /// Rendering and diagnostics output
    #[serde(default)]
    pub output: OutputSection,
}

/// `[harness]` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HarnessSection {
    /// Points in the delay schedule
    #[serde(default = "default_num_samples")]
    pub num_samples: usize,
    /// Smallest delay length
    #[serde(default = "default_min_delay")]
    pub min_delay: usize,
    /// Largest delay length
    #[serde(default = "default_max_delay")]
    pub max_delay: usize,
    /// Dispatches per timed batch
    #[serde(default = "default_inner_reps")]
    pub inner_reps: usize,
    /// Benchmark sets
    #[serde(default = "default_sets")]
    pub sets: usize,
    /// Recorded runs per set
    #[serde(default = "default_runs")]
    pub runs: usize,
    /// Warm-up placement: "per-trial" or "per-set"
    #[serde(default)]
    pub warmup: WarmupPolicy,
}

impl Default for HarnessSection {
    fn default() -> Self {
        Self {
            num_samples: default_num_samples(),
            min_delay: default_min_delay(),
            max_delay: default_max_delay(),
            inner_reps: default_inner_reps(),
            sets: default_sets(),
            runs: default_runs(),
            warmup: WarmupPolicy::default(),
        }
    }
}

fn default_num_samples() -> usize {
    DEFAULT_NUM_SAMPLES
}
fn default_min_delay() -> usize {
    DEFAULT_MIN_DELAY
}
fn default_max_delay() -> usize {
    DEFAULT_MAX_DELAY
}
fn default_inner_reps() -> usize {
    DEFAULT_INNER_REPS
}
fn default_sets() -> usize {
    DEFAULT_SETS
}
fn default_runs() -> usize {
    DEFAULT_RUNS
}

/// `[device]` table
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DeviceSection {
    /// "thread" (dedicated worker) or "inline" (caller's thread)
    #[serde(default)]
    pub kind: DeviceKind,
    /// Width of the device's parallel pool (default: available parallelism)
    #[serde(default)]
    pub threads: Option<usize>,
    /// Pin the measuring thread to this CPU (Linux only)
    #[serde(default)]
    pub pin_cpu: Option<usize>,
}

/// `[output]` table
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct OutputSection {
    /// Default output format: human, json, csv
    #[serde(default)]
    pub format: OutputFormat,
    /// Directory for per-strategy intercept distribution files
    #[serde(default)]
    pub distribution: Option<PathBuf>,
}

impl OffbenchConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Find `offbench.toml` by walking up from `start`
    pub fn find_from(start: impl AsRef<Path>) -> Option<PathBuf> {
        let mut dir = start.as_ref().to_path_buf();
        loop {
            let config_path = dir.join(CONFIG_FILE_NAME);
            if config_path.is_file() {
                return Some(config_path);
            }
            if !dir.pop() {
                return None;
            }
        }
    }

    /// Discover and load configuration starting at the current directory.
    ///
    /// No file is not an error; an unreadable or malformed file is.
    pub fn discover() -> Result<Option<Self>, ConfigError> {
        let Ok(cwd) = std::env::current_dir() else {
            return Ok(None);
        };
        match Self::find_from(cwd) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading configuration");
                Self::load(path).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Harness repetition counts
    pub fn harness_config(&self) -> HarnessConfig {
        HarnessConfig {
            inner_reps: self.harness.inner_reps,
            sets: self.harness.sets,
            runs: self.harness.runs,
            warmup: self.harness.warmup,
        }
    }

    /// Delay schedule
    pub fn generator(&self) -> Result<WorkloadGenerator, ConfigError> {
        Ok(WorkloadGenerator::new(
            self.harness.min_delay,
            self.harness.max_delay,
            self.harness.num_samples,
        )?)
    }

    /// Device construction parameters
    pub fn device_config(&self) -> DeviceConfig {
        DeviceConfig {
            kind: self.device.kind,
            threads: self.device.threads,
        }
    }

    /// Reject anything that would make a measurement meaningless
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.generator()?;
        self.harness_config().validate()?;
        if self.device.threads == Some(0) {
            return Err(ConfigError::ZeroDeviceThreads);
        }
        Ok(())
    }

    /// Generate a default configuration as TOML string
    pub fn default_toml() -> String {
        r#"# OffBench Configuration

[harness]
# Points in the delay schedule
num_samples = 50
# Delay range; must span at least num_samples - 1
min_delay = 20
max_delay = 1000
# Back-to-back dispatches per timed batch
inner_reps = 20
# Independent trials = sets * runs
sets = 20
runs = 20
# Discarded warm-up sweep placement: "per-trial" or "per-set"
warmup = "per-trial"

[device]
# "thread" runs dispatches on a dedicated worker; "inline" on the caller
kind = "thread"
# Parallel pool width (uncomment to override available parallelism)
# threads = 8
# Pin the measuring thread to a CPU (Linux only, uncomment to enable)
# pin_cpu = 0

[output]
# Default output format: human, json, csv
format = "human"
# Write per-trial intercepts here (uncomment to enable)
# distribution = "target/offbench"
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OffbenchConfig::default();
        assert_eq!(config.harness.num_samples, 50);
        assert_eq!(config.harness.min_delay, 20);
        assert_eq!(config.harness.max_delay, 1000);
        assert_eq!(config.harness.sets, 20);
        assert_eq!(config.harness.warmup, WarmupPolicy::PerTrial);
        assert_eq!(config.device.kind, DeviceKind::Thread);
        assert_eq!(config.output.format, OutputFormat::Human);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
            [harness]
            sets = 3
            warmup = "per-set"

            [device]
            kind = "inline"
            threads = 2
        "#;

        let config: OffbenchConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.harness.sets, 3);
        assert_eq!(config.harness.warmup, WarmupPolicy::PerSet);
        assert_eq!(config.device.kind, DeviceKind::Inline);
        assert_eq!(config.device.threads, Some(2));
        // Defaults should still apply
        assert_eq!(config.harness.runs, 20);
        assert_eq!(config.output.format, OutputFormat::Human);
    }

    #[test]
    fn test_default_toml_parses() {
        let config: OffbenchConfig = toml::from_str(&OffbenchConfig::default_toml()).unwrap();
        assert_eq!(config, OffbenchConfig::default());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = OffbenchConfig::default();
        config.harness.num_samples = 1;
        assert!(matches!(config.validate(), Err(ConfigError::Schedule(_))));

        let mut config = OffbenchConfig::default();
        config.harness.inner_reps = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Harness(_))));

        let mut config = OffbenchConfig::default();
        config.device.threads = Some(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroDeviceThreads)
        ));
    }

    #[test]
    fn test_discovery_walks_up() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_FILE_NAME),
            "[harness]\nruns = 4\n",
        )
        .unwrap();

        let found = OffbenchConfig::find_from(&nested).unwrap();
        assert_eq!(found, tmp.path().join(CONFIG_FILE_NAME));
        assert_eq!(OffbenchConfig::load(found).unwrap().harness.runs, 4);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[harness\n").unwrap();
        assert!(matches!(
            OffbenchConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}

//! System Metadata Collection
//!
//! Records the machine a report was produced on. Overhead numbers are only
//! comparable between runs on the same host and device configuration.
//!
//! Linux-specific data (CPU model, memory) degrades to "Unknown" or 0 on
//! other platforms.

use chrono::Utc;
use offbench_report::{ReportConfig, ReportMeta, SCHEMA_VERSION, SystemInfo};

/// Build report metadata for a run with the given parameters
pub fn build_report_meta(config: ReportConfig) -> ReportMeta {
    ReportMeta {
        schema_version: SCHEMA_VERSION,
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        system: system_info(),
        config,
    }
}

fn system_info() -> SystemInfo {
    SystemInfo {
        os: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
        cpu: cpu_model().unwrap_or_else(|| "Unknown".to_string()),
        cpu_cores: std::thread::available_parallelism()
            .map(|n| n.get() as u32)
            .unwrap_or(1),
        memory_gb: memory_gb().unwrap_or(0.0),
    }
}

/// CPU model name from /proc/cpuinfo
fn cpu_model() -> Option<String> {
    #[cfg(target_os = "linux")]
    {
        let content = std::fs::read_to_string("/proc/cpuinfo").ok()?;
        content
            .lines()
            .find(|l| l.starts_with("model name"))
            .and_then(|l| l.split(':').nth(1))
            .map(|s| s.trim().to_string())
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

/// Total memory from /proc/meminfo
fn memory_gb() -> Option<f64> {
    #[cfg(target_os = "linux")]
    {
        let content = std::fs::read_to_string("/proc/meminfo").ok()?;
        let kb: u64 = content
            .lines()
            .find(|l| l.starts_with("MemTotal"))?
            .split_whitespace()
            .nth(1)?
            .parse()
            .ok()?;
        Some(kb as f64 / 1024.0 / 1024.0)
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn dummy_config() -> ReportConfig {
        ReportConfig {
            num_samples: 4,
            min_delay: 1,
            max_delay: 8,
            inner_reps: 2,
            sets: 2,
            runs: 3,
            warmup: "per-trial".to_string(),
            device: "thread".to_string(),
            device_threads: 2,
            sizes: vec![1024],
        }
    }

    #[test]
    fn meta_carries_config_and_host() {
        let meta = build_report_meta(dummy_config());
        assert_eq!(meta.schema_version, SCHEMA_VERSION);
        assert_eq!(meta.config.sizes, vec![1024]);
        assert_eq!(meta.system.os, std::env::consts::OS);
        assert!(meta.system.cpu_cores >= 1);
        assert!(!meta.system.cpu.is_empty());
    }
}

//! Sanity Gate
//!
//! Checked once before any timing. Measuring a device that silently runs
//! work on the caller's own thread would report a meaningless overhead, so a
//! failed gate aborts the whole run.

use offbench_core::{Device, DeviceError};
use std::thread::ThreadId;
use thiserror::Error;

/// Why the gate refused to let measurement start
#[derive(Debug, Error)]
pub enum SanityError {
    #[error("probe task ran on the calling thread ({0:?}); the device does not offload")]
    NotOffloaded(ThreadId),

    #[error("probe task could not be run: {0}")]
    Probe(#[from] DeviceError),

    #[error("{0}")]
    Rejected(String),
}

/// Precondition on the execution context, checked before measuring
pub trait SanityGate {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Ok when measurement may proceed
    fn check(&self, device: &Device) -> Result<(), SanityError>;
}

/// Fails when a probe task executes on the caller's thread
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextDivergenceGate;

impl SanityGate for ContextDivergenceGate {
    fn name(&self) -> &str {
        "context-divergence"
    }

    fn check(&self, device: &Device) -> Result<(), SanityError> {
        let caller = std::thread::current().id();
        let probe = device.execute(|_| std::thread::current().id())?;
        tracing::debug!(?caller, ?probe, "sanity probe returned");
        if probe == caller {
            return Err(SanityError::NotOffloaded(caller));
        }
        Ok(())
    }
}

/// Gate that always passes
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl SanityGate for AcceptAll {
    fn name(&self) -> &str {
        "accept-all"
    }

    fn check(&self, _device: &Device) -> Result<(), SanityError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_device_passes() {
        let device = Device::spawn().unwrap();
        assert!(ContextDivergenceGate.check(&device).is_ok());
    }

    #[test]
    fn inline_device_fails() {
        let device = Device::inline().unwrap();
        let err = ContextDivergenceGate.check(&device).unwrap_err();
        assert!(matches!(err, SanityError::NotOffloaded(id) if id == std::thread::current().id()));
    }

    #[test]
    fn accept_all_ignores_device_kind() {
        let device = Device::inline().unwrap();
        assert!(AcceptAll.check(&device).is_ok());
    }
}

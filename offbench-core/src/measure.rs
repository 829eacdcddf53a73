//! Wall-Clock Timing
//!
//! The harness times whole batches of dispatches, so a monotonic wall clock
//! is the right instrument: device work runs on other threads and cores,
//! where a per-core cycle counter would not follow it.

use std::time::Instant;

/// Nanoseconds per microsecond
const NANOS_PER_MICRO: f64 = 1_000.0;

/// Timer for one batch of dispatches
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer
    #[inline(always)]
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Elapsed nanoseconds since start
    #[inline(always)]
    pub fn stop(&self) -> u64 {
        self.start.elapsed().as_nanos() as u64
    }

    /// Stop and return the mean microseconds per call over `calls` calls
    #[inline(always)]
    pub fn stop_per_call_us(&self, calls: usize) -> f64 {
        per_call_us(self.stop(), calls)
    }
}

/// Mean microseconds per call for a batch that took `nanos` in total
pub fn per_call_us(nanos: u64, calls: usize) -> f64 {
    if calls == 0 {
        return 0.0;
    }
    nanos as f64 / NANOS_PER_MICRO / calls as f64
}

/// Pin the calling thread to a specific core
///
/// Keeps the observer from migrating between cores mid-sweep.
#[cfg(target_os = "linux")]
pub fn pin_to_cpu(cpu: usize) -> Result<(), std::io::Error> {
    use std::mem::MaybeUninit;

    unsafe {
        let mut set = MaybeUninit::<libc::cpu_set_t>::zeroed();
        let set_ref = set.assume_init_mut();

        libc::CPU_ZERO(set_ref);
        libc::CPU_SET(cpu, set_ref);

        let result = libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), set_ref);

        if result == 0 {
            Ok(())
        } else {
            Err(std::io::Error::last_os_error())
        }
    }
}

/// CPU pinning is a no-op off Linux
#[cfg(not(target_os = "linux"))]
pub fn pin_to_cpu(_cpu: usize) -> Result<(), std::io::Error> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_timer() {
        let timer = Timer::start();
        std::thread::sleep(Duration::from_millis(10));
        let nanos = timer.stop();

        assert!(nanos >= 5_000_000);
    }

    #[test]
    fn test_per_call_average() {
        assert!((per_call_us(20_000, 20) - 1.0).abs() < f64::EPSILON);
        assert!((per_call_us(1_500, 1) - 1.5).abs() < f64::EPSILON);
        assert_eq!(per_call_us(1_000, 0), 0.0);
    }

    #[test]
    fn test_per_call_is_non_negative() {
        let timer = Timer::start();
        assert!(timer.stop_per_call_us(4) >= 0.0);
    }
}

// sweep.rs - configuration and the end-to-end pipeline.
//
// `find_primes` is the one call that strings the whole run together:
//
//   validate config -> generate candidates -> dispatch on the GPU ->
//   reduce the mask -> primes + stats
//
// Configuration is validated before the candidate vector is built, so a
// bad count or group size costs nothing: no host allocation, no device
// call. The device context is created by the caller and passed in; one
// `GpuDevice` serves any number of sweeps.

use std::fmt;
use std::time::Duration;

use crate::candidates::{CandidateSet, MAX_CANDIDATES};
use crate::error::SweepError;
use crate::gpu::device::GpuDevice;
use crate::gpu::dispatch::{Dispatcher, WorkPartition};
use crate::reduce::collect_primes;

/// Sweep parameters.
///
/// The defaults match the workload this pipeline was built around:
/// 2^26 candidates checked in work-groups of 128.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepConfig {
    /// How many odd integers to test. Must be at least 1, at most
    /// 2^31, and divisible by `work_group_size`.
    pub candidate_count: u32,
    /// Work items per GPU work-group. Must divide `candidate_count`
    /// exactly; a remainder is refused rather than padded or truncated.
    pub work_group_size: u32,
}

impl Default for SweepConfig {
    fn default() -> Self {
        SweepConfig {
            candidate_count: 1 << 26,
            work_group_size: 128,
        }
    }
}

impl SweepConfig {
    /// Validate the configuration and turn it into a work partition.
    ///
    /// # Errors
    /// `InvalidCandidateCount` when the count is zero or above the 32-bit
    /// candidate ceiling, `InvalidPartition` when the count does not split
    /// into whole work-groups.
    pub fn partition(&self) -> Result<WorkPartition, SweepError> {
        if self.candidate_count == 0 || self.candidate_count > MAX_CANDIDATES {
            return Err(SweepError::InvalidCandidateCount {
                count: self.candidate_count,
            });
        }
        WorkPartition::new(self.candidate_count, self.work_group_size)
    }
}

/// Counters and timing from one completed sweep.
#[derive(Debug, Clone, Copy)]
pub struct SweepStats {
    /// Candidates tested.
    pub candidate_count: u32,
    /// Work-group size the kernel ran with.
    pub work_group_size: u32,
    /// Launch enqueue through mask download, wall clock.
    pub kernel_time: Duration,
    /// Primes found.
    pub prime_count: usize,
}

impl fmt::Display for SweepStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} primes in {} candidates (work-groups of {}), kernel {:.3} ms",
            self.prime_count,
            self.candidate_count,
            self.work_group_size,
            self.kernel_time.as_secs_f64() * 1e3,
        )
    }
}

/// A finished sweep: the primes, ascending, plus the run's stats.
#[derive(Debug)]
pub struct SweepOutcome {
    pub primes: Vec<u32>,
    pub stats: SweepStats,
}

/// Run one complete sweep on `gpu` with the given kernel source.
///
/// Identical inputs produce identical prime lists: candidate generation
/// is deterministic, the kernel computes a pure predicate per index, and
/// the reduction preserves candidate order.
///
/// # Errors
/// Configuration failures surface before any host or device allocation;
/// everything after that comes out of the dispatcher unchanged.
pub fn find_primes(
    gpu: &GpuDevice,
    kernel_source: &str,
    config: &SweepConfig,
) -> Result<SweepOutcome, SweepError> {
    let partition = config.partition()?;
    let candidates = CandidateSet::generate(config.candidate_count);

    let dispatched = Dispatcher::new(gpu).run(kernel_source, &candidates, partition)?;
    let primes = collect_primes(&candidates, &dispatched.mask);

    let stats = SweepStats {
        candidate_count: config.candidate_count,
        work_group_size: config.work_group_size,
        kernel_time: dispatched.kernel_time,
        prime_count: primes.len(),
    };

    Ok(SweepOutcome { primes, stats })
}

// ============================================================
// Tests
// ============================================================

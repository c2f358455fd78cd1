// error.rs - the single error type for the whole sweep pipeline.
//
// Every fallible step maps onto one of four failure classes:
//   configuration - bad counts/sizes/sources, caught before device work
//   availability  - no usable adapter, or the device request failed
//   build         - kernel compilation / pipeline creation (carries the log)
//   operation     - allocation, upload, launch, or download at runtime
//
// All of these are fatal. The pipeline never retries, and the binary maps
// every variant to a non-zero exit.

use std::fmt;

use crate::candidates::MAX_CANDIDATES;

/// Errors from configuration checks, device bring-up, kernel builds, and
/// dispatch. One enum for the whole pipeline so every step can bubble up
/// with `?` and the top level can match on the failure class.
#[derive(Debug)]
pub enum SweepError {
    /// Kernel source was empty or whitespace-only. Checked before any
    /// device call is made.
    EmptyKernelSource,
    /// Candidate count is zero or too large for the 32-bit candidate
    /// encoding (`2*i + 1` must fit in a `u32`).
    InvalidCandidateCount { count: u32 },
    /// Candidate count does not split into whole work-groups of `local`.
    InvalidPartition { global: u32, local: u32 },
    /// Work-group size exceeds what the device can run in one group.
    GroupTooLarge { local: u32, max: u32 },
    /// The partition needs more work-groups than the device can hold even
    /// on a full two-dimensional dispatch grid.
    DispatchTooWide { workgroups: u32, max: u32 },
    /// A candidate, mask, or staging buffer would exceed the device's
    /// buffer size limits.
    BufferTooLarge { bytes: u64, max: u64 },
    /// No GPU-class adapter found. CPU/software renderers are rejected
    /// rather than silently used.
    NoAdapter,
    /// An adapter was found but the device request failed
    /// (driver issue, unsupported limits, lost device).
    DeviceRequest(wgpu::RequestDeviceError),
    /// Kernel compilation or pipeline creation failed. `log` holds the
    /// device's diagnostic output verbatim and is never empty.
    KernelBuild { log: String },
    /// A device call failed after a successful build: buffer allocation,
    /// upload, launch, or mask download.
    DeviceOperation { what: &'static str, detail: String },
}

impl fmt::Display for SweepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SweepError::EmptyKernelSource => {
                write!(f, "kernel source is empty; nothing to compile")
            }
            SweepError::InvalidCandidateCount { count } => write!(
                f,
                "candidate count {count} is outside the supported range 1..={MAX_CANDIDATES}"
            ),
            SweepError::InvalidPartition { global, local } => write!(
                f,
                "invalid work partition: {global} candidates cannot be split \
                 into whole work-groups of {local}"
            ),
            SweepError::GroupTooLarge { local, max } => write!(
                f,
                "work-group size {local} exceeds the device limit of {max} \
                 invocations per work-group"
            ),
            SweepError::DispatchTooWide { workgroups, max } => write!(
                f,
                "partition needs {workgroups} work-groups but the device caps \
                 a dispatch grid at {max} x {max}"
            ),
            SweepError::BufferTooLarge { bytes, max } => write!(
                f,
                "buffer of {bytes} bytes exceeds the device's limit of \
                 {max} bytes"
            ),
            SweepError::NoAdapter => write!(
                f,
                "no GPU-class adapter available (CPU/software renderers are \
                 skipped; check that a real GPU and driver are visible)"
            ),
            SweepError::DeviceRequest(e) => write!(f, "device request failed: {e}"),
            SweepError::KernelBuild { log } => write!(f, "kernel build failed:\n{log}"),
            SweepError::DeviceOperation { what, detail } => {
                write!(f, "device operation failed ({what}): {detail}")
            }
        }
    }
}

impl std::error::Error for SweepError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SweepError::DeviceRequest(e) => Some(e),
            _ => None,
        }
    }
}

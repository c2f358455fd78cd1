// gpu/dispatch.rs - work partitioning and the launch/download sequence.
//
// The dispatcher owns the order of operations for one sweep:
//
//   source check -> device-fit checks -> allocate input/output ->
//   upload candidates -> compile -> bind (0: candidates, 1: mask) ->
//   launch (non-blocking) -> download (blocking) -> mask + elapsed time
//
// The empty-source check runs first so a missing kernel file fails before
// a single byte of device memory is allocated. The timed region starts
// immediately before the launch is enqueued and ends when the download
// completes, which is the figure the binary reports: device execution
// plus readback, with no allocation or compile time mixed in.
//
// DISPATCH GRID:
// Devices cap the work-group count per dispatch dimension (65535 on the
// mainstream backends), which one row of groups overruns well before the
// default workload: 2^26 candidates in groups of 128 need 524288 groups.
// A dispatch that does not fit in x is folded into rows of the ceiling
// width on a 2-D grid, and the kernel linearizes the grid position back
// into a candidate index. The trailing row may run past the candidate
// count; those invocations drop out on the kernel's arrayLength guard.
// Only a partition too large even for the squared ceiling is refused.
//
// Every buffer lives in this function's scope, so success and failure
// paths release device resources the same way: by dropping them.

use std::time::{Duration, Instant};

use crate::candidates::CandidateSet;
use crate::error::SweepError;
use crate::gpu::device::{BufferAccess, GpuDevice};
use crate::gpu::kernel::KernelProgram;

/// A validated split of `global` work items into groups of `local`.
///
/// Construction is the only place the split is checked: holders of a
/// `WorkPartition` know that `local >= 1` and that `global` divides into
/// whole groups, so every index in `[0, global)` is covered exactly once
/// with no partial group at the tail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkPartition {
    global: u32,
    local: u32,
}

impl WorkPartition {
    /// Validate `global` work items against work-groups of `local`.
    ///
    /// # Errors
    /// `InvalidPartition` when either size is zero or `global` is not a
    /// multiple of `local`. A remainder would mean either dropping the
    /// tail candidates or launching a ragged group; both are wrong, so a
    /// non-divisible pair is refused outright.
    pub fn new(global: u32, local: u32) -> Result<Self, SweepError> {
        if global == 0 || local == 0 || global % local != 0 {
            return Err(SweepError::InvalidPartition { global, local });
        }
        Ok(WorkPartition { global, local })
    }

    /// Total work items (one per candidate).
    pub fn global(&self) -> u32 {
        self.global
    }

    /// Work items per group.
    pub fn local(&self) -> u32 {
        self.local
    }

    /// Number of work-groups the dispatch will issue.
    pub fn workgroup_count(&self) -> u32 {
        self.global / self.local
    }

    /// Shape the work-groups into a dispatch grid no wider than
    /// `max_per_dimension` along either axis.
    ///
    /// Up to the ceiling the grid is one row, `(groups, 1)`. Past it the
    /// groups fold into full-width rows, `(max_per_dimension, rows)`,
    /// where the last row over-covers and the kernel's bounds guard eats
    /// the excess. The grid never undershoots: `x * y >= workgroup_count`.
    ///
    /// # Panics
    /// Panics if `max_per_dimension` is zero; device limits never are.
    ///
    /// # Errors
    /// `DispatchTooWide` when even `max_per_dimension` full rows cannot
    /// hold the groups.
    pub fn dispatch_grid(&self, max_per_dimension: u32) -> Result<(u32, u32), SweepError> {
        assert!(max_per_dimension > 0, "dispatch ceiling must be nonzero");
        let groups = self.workgroup_count();
        if groups <= max_per_dimension {
            return Ok((groups, 1));
        }
        let rows = (groups + max_per_dimension - 1) / max_per_dimension;
        if rows > max_per_dimension {
            return Err(SweepError::DispatchTooWide {
                workgroups: groups,
                max: max_per_dimension,
            });
        }
        Ok((max_per_dimension, rows))
    }
}

/// What a completed dispatch hands back.
#[derive(Debug)]
pub struct DispatchOutput {
    /// One u32 per candidate, nonzero where the kernel found a prime.
    pub mask: Vec<u32>,
    /// Wall-clock time from launch enqueue to download completion.
    pub kernel_time: Duration,
}

/// Runs the launch sequence against one device.
pub struct Dispatcher<'a> {
    gpu: &'a GpuDevice,
}

impl<'a> Dispatcher<'a> {
    pub fn new(gpu: &'a GpuDevice) -> Self {
        Dispatcher { gpu }
    }

    /// Execute one full sweep: upload `candidates`, build `source`, launch
    /// it over `partition`, and download the mask.
    ///
    /// # Panics
    /// Panics if `partition.global()` does not equal the candidate count.
    /// [`crate::sweep::find_primes`] derives both from the same
    /// configuration; direct callers carry the same obligation.
    ///
    /// # Errors
    /// Everything in the error taxonomy can come out of here: the source
    /// precondition, device-fit refusals, build failures with their log,
    /// and runtime device failures. All of them abort the run; buffers
    /// already created are released on the way out.
    pub fn run(
        &self,
        source: &str,
        candidates: &CandidateSet,
        partition: WorkPartition,
    ) -> Result<DispatchOutput, SweepError> {
        assert_eq!(
            candidates.len() as u32,
            partition.global(),
            "partition must cover the candidate set exactly"
        );

        if source.trim().is_empty() {
            return Err(SweepError::EmptyKernelSource);
        }

        // Fit checks before any allocation: refuse with the numbers in
        // hand rather than letting wgpu validation kill the submission.
        let max_local = self.gpu.max_group_size();
        if partition.local() > max_local {
            return Err(SweepError::GroupTooLarge {
                local: partition.local(),
                max: max_local,
            });
        }
        let (grid_x, grid_y) =
            partition.dispatch_grid(self.gpu.max_workgroups_per_dimension())?;

        let bytes = u64::from(partition.global()) * 4;
        let input = self
            .gpu
            .allocate("prime candidates", bytes, BufferAccess::ReadOnly)?;
        let output = self
            .gpu
            .allocate("prime mask", bytes, BufferAccess::ReadWrite)?;

        self.gpu.upload(&input, candidates.values())?;

        let program = KernelProgram::compile(self.gpu, source, partition.local())?;

        let bind_group = self.gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("check_prime bind"),
            layout: &program.bind_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: input.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: output.as_entire_binding() },
            ],
        });

        // Timed region: launch enqueue through download completion.
        let started = Instant::now();

        self.gpu.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("check_prime dispatch"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("check_prime"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&program.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(grid_x, grid_y, 1);
        }
        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        if let Some(e) = pollster::block_on(self.gpu.device.pop_error_scope()) {
            return Err(SweepError::DeviceOperation {
                what: "kernel launch",
                detail: e.to_string(),
            });
        }

        let mask = self.gpu.download(&output, partition.global() as usize)?;
        let kernel_time = started.elapsed();

        Ok(DispatchOutput { mask, kernel_time })
    }
}

// ============================================================
// Tests
// ============================================================

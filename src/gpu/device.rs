// gpu/device.rs - adapter discovery, device bring-up, and buffer transport.
//
// Responsibilities:
//   - Enumerate adapters and select the first GPU-class one. CPU and
//     software renderers are rejected outright, never used as a fallback.
//   - Request a device whose limits actually fit the sweep (the wgpu
//     defaults are too small for the default candidate count).
//   - Own the single in-order queue that every submission in a run uses.
//   - Provide storage-buffer allocation plus blocking upload and download.
//
// ADAPTER SELECTION:
// wgpu's `request_adapter` applies power-preference heuristics and may
// hand back a software rasterizer (llvmpipe) where one is installed. We
// enumerate explicitly and take the first adapter whose type is not
// `DeviceType::Cpu`. No further ranking: first usable GPU wins, which
// keeps discovery deterministic on multi-adapter machines. Every adapter
// seen is logged so a surprising pick can be diagnosed from stderr.
//
// DEVICE LIMITS:
// wgpu's default `max_storage_buffer_binding_size` (128 MiB) is below the
// 256 MiB input buffer at the default 2^26 candidates. We request the
// adapter's real capability for the compute and buffer limits the sweep
// leans on and keep wgpu defaults for everything else. Note that lifting
// `max_compute_workgroups_per_dimension` cannot absorb the default
// partition's 524288 groups (primary backends report 65535); wide
// partitions are the dispatcher's problem, solved by folding onto a 2-D
// grid. Dispatches are validated against the requested values, so a
// partition too large even for the folded grid fails loudly at dispatch
// time instead of corrupting the run.
//
// BLOCKING TRANSFERS:
// `upload` stages through `Queue::write_buffer`, which is ordered before
// any command buffer submitted afterwards on the same queue. `download`
// copies into a MAP_READ staging buffer and blocks in
// `device.poll(Maintain::Wait)` until the map callback fires. Because the
// queue executes in submission order, a download enqueued after the
// kernel launch cannot observe a partially written mask; the download is
// the run's synchronization point.

use std::fmt;

use crate::error::SweepError;

/// Cached adapter identity for logging and diagnostics.
#[derive(Debug, Clone)]
pub struct AdapterInfo {
    pub name: String,
    pub device_type: wgpu::DeviceType,
    pub backend: wgpu::Backend,
}

impl fmt::Display for AdapterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?}, {:?})", self.name, self.backend, self.device_type)
    }
}

/// Access mode for a storage buffer, from the kernel's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferAccess {
    /// Device reads only. The host fills it once via `upload`.
    ReadOnly,
    /// Device reads and writes. The host can read it back via `download`.
    ReadWrite,
}

impl BufferAccess {
    fn usages(self) -> wgpu::BufferUsages {
        match self {
            BufferAccess::ReadOnly => {
                wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST
            }
            BufferAccess::ReadWrite => {
                wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_SRC
                    | wgpu::BufferUsages::COPY_DST
            }
        }
    }
}

/// The GPU execution context: adapter, device, and the one queue.
///
/// Create via `GpuDevice::new()`. Hold a single `GpuDevice` for the whole
/// run; bring-up is the expensive part (instance plus device creation),
/// and every buffer and pipeline in a run must come from the same device.
/// Dropping it releases the device, queue, and instance in a safe order.
///
/// # Field drop order
/// Rust drops struct fields in declaration order. `_instance` is declared
/// last so the `wgpu::Instance` outlives `device` and `queue`; device
/// objects hold back-references into the instance that must stay valid
/// until they are gone.
pub struct GpuDevice {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_info: AdapterInfo,
    /// Keeps the `wgpu::Instance` alive until `device` and `queue` are
    /// dropped. Never accessed directly.
    _instance: wgpu::Instance,
}

impl GpuDevice {
    /// Discover the first GPU-class adapter and bring up a device on it.
    ///
    /// # Errors
    /// `NoAdapter` when every visible adapter is CPU-class (or none exist),
    /// `DeviceRequest` when the adapter refuses the device request.
    pub fn new() -> Result<Self, SweepError> {
        pollster::block_on(Self::init_async())
    }

    async fn init_async() -> Result<Self, SweepError> {
        // Validation layer in debug builds for readable shader diagnostics.
        let flags = if cfg!(debug_assertions) {
            wgpu::InstanceFlags::VALIDATION
        } else {
            wgpu::InstanceFlags::empty()
        };

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            flags,
            ..Default::default()
        });

        let adapters: Vec<wgpu::Adapter> =
            instance.enumerate_adapters(wgpu::Backends::PRIMARY);

        for a in &adapters {
            let info = a.get_info();
            eprintln!(
                "[primesweep] adapter: {} ({:?}, {:?})",
                info.name, info.backend, info.device_type
            );
        }

        // First non-CPU adapter wins. DeviceType::Cpu covers llvmpipe and
        // friends; everything else counts as device-class hardware.
        let adapter = adapters
            .into_iter()
            .find(|a| a.get_info().device_type != wgpu::DeviceType::Cpu)
            .ok_or(SweepError::NoAdapter)?;

        let raw_info = adapter.get_info();
        let adapter_info = AdapterInfo {
            name: raw_info.name,
            device_type: raw_info.device_type,
            backend: raw_info.backend,
        };

        // Lift only the limits the sweep actually exercises up to the
        // adapter's capability; wgpu defaults are fine for the rest.
        let capability = adapter.limits();
        let limits = wgpu::Limits {
            max_buffer_size: capability.max_buffer_size,
            max_storage_buffer_binding_size: capability.max_storage_buffer_binding_size,
            max_compute_workgroups_per_dimension: capability
                .max_compute_workgroups_per_dimension,
            max_compute_invocations_per_workgroup: capability
                .max_compute_invocations_per_workgroup,
            max_compute_workgroup_size_x: capability.max_compute_workgroup_size_x,
            ..wgpu::Limits::default()
        };

        let (device, queue): (wgpu::Device, wgpu::Queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("primesweep"),
                    required_features: wgpu::Features::empty(),
                    required_limits: limits,
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await
            .map_err(SweepError::DeviceRequest)?;

        Ok(GpuDevice {
            device,
            queue,
            adapter_info,
            _instance: instance,
        })
    }

    /// Largest 1-D work-group the device will run: the smaller of the
    /// per-dimension size limit and the total-invocations limit.
    pub fn max_group_size(&self) -> u32 {
        let limits = self.device.limits();
        limits
            .max_compute_workgroup_size_x
            .min(limits.max_compute_invocations_per_workgroup)
    }

    /// Most work-groups a single dispatch may issue along one dimension.
    pub fn max_workgroups_per_dimension(&self) -> u32 {
        self.device.limits().max_compute_workgroups_per_dimension
    }

    /// Largest storage buffer the device will both allocate and bind.
    pub fn max_storage_bytes(&self) -> u64 {
        let limits = self.device.limits();
        u64::from(limits.max_storage_buffer_binding_size).min(limits.max_buffer_size)
    }

    /// Allocate a storage buffer of `bytes` with the given access mode.
    ///
    /// The size is checked against the device's storage limits first so an
    /// oversized request fails with the numbers in hand instead of a
    /// driver-dependent allocation error.
    pub fn allocate(
        &self,
        label: &'static str,
        bytes: u64,
        access: BufferAccess,
    ) -> Result<wgpu::Buffer, SweepError> {
        let max = self.max_storage_bytes();
        if bytes > max {
            return Err(SweepError::BufferTooLarge { bytes, max });
        }

        // Allocation failures surface as scoped out-of-memory errors, not
        // through the uncaptured-error panic handler.
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: bytes,
            usage: access.usages(),
            mapped_at_creation: false,
        });
        if let Some(e) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(SweepError::DeviceOperation {
                what: "buffer allocation",
                detail: e.to_string(),
            });
        }
        Ok(buffer)
    }

    /// Copy `words` into `buffer`, ordered before any later submission.
    ///
    /// `write_buffer` guarantees the data is visible to every command
    /// buffer submitted afterwards on this queue; the empty submit flushes
    /// the staged copy so the transfer starts now rather than riding along
    /// with the next real submission.
    pub fn upload(&self, buffer: &wgpu::Buffer, words: &[u32]) -> Result<(), SweepError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        self.queue.write_buffer(buffer, 0, bytemuck::cast_slice(words));
        self.queue.submit(std::iter::empty::<wgpu::CommandBuffer>());
        if let Some(e) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(SweepError::DeviceOperation {
                what: "candidate upload",
                detail: e.to_string(),
            });
        }
        Ok(())
    }

    /// Read `words` u32 values back from `buffer`, blocking until every
    /// submission queued before this call has completed.
    ///
    /// Storage buffers cannot be mapped directly, so the copy goes through
    /// a MAP_READ staging buffer as large as the request. The staging
    /// allocation gets the same size check and error scope as `allocate`,
    /// so exhaustion on the readback path surfaces as a typed error too.
    /// `Maintain::Wait` parks the thread until the queue reaches the copy,
    /// which in turn is ordered after the kernel launch; the mask handed
    /// back is always the fully written one.
    pub fn download(
        &self,
        buffer: &wgpu::Buffer,
        words: usize,
    ) -> Result<Vec<u32>, SweepError> {
        let bytes = (words * std::mem::size_of::<u32>()) as u64;

        // Staging carries no STORAGE usage, so only the plain buffer-size
        // ceiling applies to it.
        let max = self.device.limits().max_buffer_size;
        if bytes > max {
            return Err(SweepError::BufferTooLarge { bytes, max });
        }

        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("download staging"),
            size: bytes,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        if let Some(e) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(SweepError::DeviceOperation {
                what: "staging allocation",
                detail: e.to_string(),
            });
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("download encoder"),
            });
        encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, bytes);
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = tx.send(res);
        });
        self.device.poll(wgpu::Maintain::Wait);

        rx.recv()
            .map_err(|_| SweepError::DeviceOperation {
                what: "mask download",
                detail: "map callback dropped without a result".into(),
            })?
            .map_err(|e| SweepError::DeviceOperation {
                what: "mask download",
                detail: e.to_string(),
            })?;

        let out = {
            let mapped = slice.get_mapped_range();
            bytemuck::cast_slice::<u8, u32>(&mapped).to_vec()
        };
        staging.unmap();
        Ok(out)
    }
}

impl fmt::Display for GpuDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GpuDevice {{ adapter: {} }}", self.adapter_info)
    }
}

// ============================================================
// Tests
// ============================================================

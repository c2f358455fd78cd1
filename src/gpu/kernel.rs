// gpu/kernel.rs - runtime kernel compilation and the bind contract.
//
// A kernel source is opaque text. The only things this module holds it to
// are the compute entry point `check_prime`, the two-binding layout
// (candidates read-only at 0, mask read-write at 1), and the
// `{{WORKGROUP_SIZE}}` template token. Anything else about the source is
// the kernel author's business; a source that violates the contract fails
// the build with the device's own diagnostics, not a special case.
//
// WORK-GROUP SPECIALIZATION:
// The work-group size is baked into the source text before compilation:
// every `{{WORKGROUP_SIZE}}` is replaced with the decimal group size, so
// the shipped kernel's `@workgroup_size({{WORKGROUP_SIZE}})` compiles to
// a literal. WGSL pipeline-override constants cannot appear inside
// `@workgroup_size` on this wgpu version (the frontend only folds
// literals there), so specialization happens in the text, not through
// `PipelineCompilationOptions::constants`.
//
// ERROR SCOPES:
// wgpu reports shader and pipeline failures through the device's
// uncaptured-error handler, which panics by default. Wrapping each create
// call in `push_error_scope(Validation)` / `pop_error_scope()` converts
// those into values we can return, with naga's full diagnostic text
// (line/column markers included) recovered by walking the error's source
// chain. That text is handed to the caller verbatim as the build log.

use crate::error::SweepError;
use crate::gpu::device::GpuDevice;

/// The entry point every kernel source must export.
pub const KERNEL_ENTRY_POINT: &str = "check_prime";

/// Template token replaced with the decimal work-group size before the
/// source reaches the compiler.
pub const WORKGROUP_SIZE_TOKEN: &str = "{{WORKGROUP_SIZE}}";

/// The kernel template shipped with the crate. Used whenever the caller
/// does not supply their own source.
pub const DEFAULT_KERNEL_SOURCE: &str = include_str!("../shaders/check_prime.wgsl");

/// Bake the work-group size into the kernel source.
///
/// A source without the token passes through unchanged; such a kernel
/// hard-codes its own `@workgroup_size` and is responsible for matching
/// the configured group size.
fn specialize(source: &str, workgroup_size: u32) -> String {
    source.replace(WORKGROUP_SIZE_TOKEN, &workgroup_size.to_string())
}

/// A kernel compiled against one device, ready to dispatch.
///
/// Never partially usable: if any stage of the build fails, `compile`
/// returns an error and no `KernelProgram` exists.
#[derive(Debug)]
pub struct KernelProgram {
    pub(crate) pipeline: wgpu::ComputePipeline,
    pub(crate) bind_layout: wgpu::BindGroupLayout,
    workgroup_size: u32,
}

impl KernelProgram {
    /// Compile `source` for `gpu` with the given work-group size.
    ///
    /// The empty-source check runs before anything touches the device, so
    /// a missing kernel file fails without a single allocation. Compile
    /// errors, an absent `check_prime` entry point, or a binding layout
    /// that does not match the contract all surface as `KernelBuild`
    /// carrying the device's diagnostic log.
    pub fn compile(
        gpu: &GpuDevice,
        source: &str,
        workgroup_size: u32,
    ) -> Result<Self, SweepError> {
        if source.trim().is_empty() {
            return Err(SweepError::EmptyKernelSource);
        }

        let baked = specialize(source, workgroup_size);

        gpu.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let shader = gpu.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("check_prime kernel"),
            source: wgpu::ShaderSource::Wgsl(baked.into()),
        });
        if let Some(e) = pollster::block_on(gpu.device.pop_error_scope()) {
            return Err(SweepError::KernelBuild { log: build_log(&e) });
        }

        let bind_layout =
            gpu.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("check_prime BGL"),
                entries: &[
                    // 0 - candidate values (storage, read-only)
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Storage { read_only: true },
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    // 1 - result mask (storage, read-write)
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Storage { read_only: false },
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                ],
            });

        let pipeline_layout =
            gpu.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("check_prime pipeline layout"),
                bind_group_layouts: &[&bind_layout],
                push_constant_ranges: &[],
            });

        gpu.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline =
            gpu.device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(KERNEL_ENTRY_POINT),
                layout: Some(&pipeline_layout),
                module: &shader,
                entry_point: KERNEL_ENTRY_POINT,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            });
        if let Some(e) = pollster::block_on(gpu.device.pop_error_scope()) {
            return Err(SweepError::KernelBuild { log: build_log(&e) });
        }

        Ok(KernelProgram {
            pipeline,
            bind_layout,
            workgroup_size,
        })
    }

    /// The work-group size this program was specialized for.
    pub fn workgroup_size(&self) -> u32 {
        self.workgroup_size
    }
}

/// Flatten a scoped wgpu error into the diagnostic log, outermost message
/// first. naga attaches the detailed compile report (with line and column
/// markers) as a source error, so the chain walk is what recovers the
/// text a kernel author actually needs.
fn build_log(top: &wgpu::Error) -> String {
    let mut log = top.to_string();
    let mut cause = std::error::Error::source(top);
    while let Some(e) = cause {
        log.push('\n');
        log.push_str(&e.to_string());
        cause = e.source();
    }
    log
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_kernel_exports_the_contract() {
        assert!(DEFAULT_KERNEL_SOURCE.contains("fn check_prime"));
        assert!(DEFAULT_KERNEL_SOURCE.contains("@workgroup_size({{WORKGROUP_SIZE}})"));
        assert!(DEFAULT_KERNEL_SOURCE.contains("@binding(0)"));
        assert!(DEFAULT_KERNEL_SOURCE.contains("@binding(1)"));
    }

    #[test]
    fn test_specialization_replaces_every_token() {
        let baked = specialize(DEFAULT_KERNEL_SOURCE, 64);
        assert!(baked.contains("@workgroup_size(64)"));
        assert!(baked.contains("64u"));
        assert!(!baked.contains("{{"), "unreplaced template token:\n{baked}");
    }

    #[test]
    fn test_workgroup_size_never_reaches_the_compiler_symbolically() {
        // The attribute must hold a literal after baking: the WGSL
        // frontend pinned by this wgpu version rejects named values
        // inside @workgroup_size, so a leftover identifier there means
        // every build of the shipped kernel fails.
        let baked = specialize(DEFAULT_KERNEL_SOURCE, 128);
        assert!(baked.contains("@workgroup_size(128)"));
        assert!(!baked.contains("override"));
        assert!(!baked.contains("@workgroup_size(WORKGROUP_SIZE)"));
    }

    #[test]
    fn test_tokenless_sources_pass_through_unchanged() {
        let fixed = "@compute @workgroup_size(64) fn check_prime() {}";
        assert_eq!(specialize(fixed, 128), fixed);
    }

    #[cfg(test)]
    fn run_gpu_test_in_subprocess(test_name: &str) -> String {
        let output = std::process::Command::new("cargo")
            .args([
                "test",
                "--lib",
                "--",
                test_name,
                "--exact",
                "--ignored",
                "--nocapture",
            ])
            .output()
            .unwrap_or_else(|e| panic!("failed to spawn subprocess for {test_name}: {e}"));

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        print!("{stdout}");
        eprint!("{stderr}");
        stdout + &stderr
    }

    // ---- Inner tests (run inside the subprocess, marked #[ignore]) ---------

    #[test]
    #[ignore = "GPU integration: run via outer subprocess wrapper"]
    fn inner_default_kernel_compiles() {
        let gpu = GpuDevice::new().expect("should initialise a GPU device");
        let program = KernelProgram::compile(&gpu, DEFAULT_KERNEL_SOURCE, 128)
            .expect("shipped kernel must build");
        assert_eq!(program.workgroup_size(), 128);
        println!("GPU_TEST_OK");
    }

    #[test]
    #[ignore = "GPU integration: run via outer subprocess wrapper"]
    fn inner_default_kernel_compiles_at_other_group_sizes() {
        // Specialization is textual, so each size is a fresh build.
        let gpu = GpuDevice::new().expect("should initialise a GPU device");
        for size in [1u32, 2, 64, 256] {
            let program = KernelProgram::compile(&gpu, DEFAULT_KERNEL_SOURCE, size)
                .unwrap_or_else(|e| panic!("group size {size} failed to build: {e}"));
            assert_eq!(program.workgroup_size(), size);
        }
        println!("GPU_TEST_OK");
    }

    #[test]
    #[ignore = "GPU integration: run via outer subprocess wrapper"]
    fn inner_empty_source_fails_before_any_device_call() {
        let gpu = GpuDevice::new().expect("should initialise a GPU device");
        for source in ["", "   \n\t  "] {
            let err = KernelProgram::compile(&gpu, source, 128).unwrap_err();
            assert!(matches!(err, SweepError::EmptyKernelSource));
        }
        println!("GPU_TEST_OK");
    }

    #[test]
    #[ignore = "GPU integration: run via outer subprocess wrapper"]
    fn inner_syntax_error_yields_nonempty_log() {
        let gpu = GpuDevice::new().expect("should initialise a GPU device");
        let broken = "fn check_prime( { this is not wgsl }";
        let err = KernelProgram::compile(&gpu, broken, 128).unwrap_err();
        match err {
            SweepError::KernelBuild { log } => {
                assert!(!log.trim().is_empty(), "build log must not be empty");
                eprintln!("captured build log:\n{log}");
            }
            other => panic!("expected KernelBuild, got: {other}"),
        }
        println!("GPU_TEST_OK");
    }

    #[test]
    #[ignore = "GPU integration: run via outer subprocess wrapper"]
    fn inner_missing_entry_point_is_a_build_error() {
        let gpu = GpuDevice::new().expect("should initialise a GPU device");
        // Valid WGSL, wrong entry point name.
        let wrong = DEFAULT_KERNEL_SOURCE.replace("fn check_prime", "fn verify_prime");
        let err = KernelProgram::compile(&gpu, &wrong, 128).unwrap_err();
        assert!(matches!(err, SweepError::KernelBuild { .. }));
        println!("GPU_TEST_OK");
    }

    // ---- Outer tests (run by default, each spawns one subprocess) ----------

    #[test]
    #[ignore = "requires a real GPU"]
    fn test_default_kernel_compiles() {
        let out = run_gpu_test_in_subprocess("gpu::kernel::tests::inner_default_kernel_compiles");
        assert!(out.contains("GPU_TEST_OK"), "inner test failed:\n{out}");
    }

    #[test]
    #[ignore = "requires a real GPU"]
    fn test_default_kernel_compiles_at_other_group_sizes() {
        let out = run_gpu_test_in_subprocess(
            "gpu::kernel::tests::inner_default_kernel_compiles_at_other_group_sizes",
        );
        assert!(out.contains("GPU_TEST_OK"), "inner test failed:\n{out}");
    }

    #[test]
    #[ignore = "requires a real GPU"]
    fn test_empty_source_fails_before_any_device_call() {
        let out = run_gpu_test_in_subprocess(
            "gpu::kernel::tests::inner_empty_source_fails_before_any_device_call",
        );
        assert!(out.contains("GPU_TEST_OK"), "inner test failed:\n{out}");
    }

    #[test]
    #[ignore = "requires a real GPU"]
    fn test_syntax_error_yields_nonempty_log() {
        let out =
            run_gpu_test_in_subprocess("gpu::kernel::tests::inner_syntax_error_yields_nonempty_log");
        assert!(out.contains("GPU_TEST_OK"), "inner test failed:\n{out}");
    }

    #[test]
    #[ignore = "requires a real GPU"]
    fn test_missing_entry_point_is_a_build_error() {
        let out = run_gpu_test_in_subprocess(
            "gpu::kernel::tests::inner_missing_entry_point_is_a_build_error",
        );
        assert!(out.contains("GPU_TEST_OK"), "inner test failed:\n{out}");
    }
}

// benches/gpu_benchmarks.rs - full-sweep GPU benchmarks.
//
//   cargo bench --bench gpu_benchmarks
//
// Requires a real GPU; the device is created once and reused across all
// samples, the way the binary uses it.
//
// CRITERION + GPU CAVEATS
// ------------------------
// Criterion measures wall time including host overhead (allocation, bind
// group creation, submit, poll). Shader execution lands inside the poll,
// so each sample is the same enqueue-through-download figure the binary
// reports, plus compile and transfer time. That is the number that
// matters here: the pipeline blocks on the mask before it can reduce.
//
// wgpu compiles pipelines lazily on some drivers, so the first iterations
// pay shader JIT costs. The explicit warm-up time absorbs that.

use std::time::Duration;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use primesweep::candidates::CandidateSet;
use primesweep::gpu::device::GpuDevice;
use primesweep::gpu::kernel::DEFAULT_KERNEL_SOURCE;
use primesweep::primality::reference_mask;
use primesweep::reduce::collect_primes;
use primesweep::sweep::{find_primes, SweepConfig};

// ============================================================
// Full sweep: CPU vs GPU
// ============================================================

fn bench_sweep(c: &mut Criterion) {
    let gpu = GpuDevice::new().expect("no GPU available for benchmarks");
    eprintln!("benching on {}", gpu.adapter_info);

    let mut group = c.benchmark_group("sweep");
    group.warm_up_time(Duration::from_secs(2));
    group.sample_size(20);

    // CPU baseline at a size the host can grind through per-sample.
    let small = CandidateSet::generate(1 << 16);
    group.bench_function("cpu_reference_2^16", |b| {
        b.iter(|| collect_primes(&small, &reference_mask(&small)))
    });

    for exp in [16u32, 20, 24] {
        let config = SweepConfig {
            candidate_count: 1 << exp,
            work_group_size: 128,
        };
        group.bench_with_input(
            BenchmarkId::new("gpu_sweep", format!("2^{exp}")),
            &config,
            |b, config| {
                b.iter(|| {
                    find_primes(&gpu, DEFAULT_KERNEL_SOURCE, config)
                        .expect("sweep failed mid-bench")
                })
            },
        );
    }

    group.finish();
}

// ============================================================
// Register
// ============================================================

criterion_group!(benches, bench_sweep);
criterion_main!(benches);

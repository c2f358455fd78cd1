// main.rs - the primesweep binary.
//
// Runs one sweep end to end: bring up the first GPU, compile the kernel,
// check the first N odd integers, and write the primes to a file, one
// decimal per line. Progress goes to stdout; diagnostics (adapter
// enumeration, errors, build logs) go to stderr. Exit code is 0 on
// success and 1 on any failure.
//
// USAGE
//   primesweep [--count N] [--group-size G] [--kernel PATH] [--output PATH]
//
//   --count N       candidates to test         (default 67108864, 2^26)
//   --group-size G  work items per work-group  (default 128)
//   --kernel PATH   WGSL kernel source; the built-in kernel when omitted
//   --output PATH   primes file                (default primes.txt)

use std::fs;
use std::io::{BufWriter, Write};
use std::process;
use std::time::Duration;

use primesweep::gpu::device::GpuDevice;
use primesweep::gpu::kernel::DEFAULT_KERNEL_SOURCE;
use primesweep::sweep::{find_primes, SweepConfig};

#[derive(Debug)]
struct CliOptions {
    config: SweepConfig,
    kernel_path: Option<String>,
    output_path: String,
}

fn print_usage() {
    eprintln!(
        "usage: primesweep [--count N] [--group-size G] [--kernel PATH] [--output PATH]\n\
         \n\
         --count N       candidates to test         (default {}, 2^26)\n\
         --group-size G  work items per work-group  (default {})\n\
         --kernel PATH   WGSL kernel source; the built-in kernel when omitted\n\
         --output PATH   primes file                (default primes.txt)",
        SweepConfig::default().candidate_count,
        SweepConfig::default().work_group_size,
    );
}

fn flag_value<'a>(args: &'a [String], i: &mut usize, flag: &str) -> Result<&'a str, String> {
    *i += 1;
    args.get(*i)
        .map(|s| s.as_str())
        .ok_or_else(|| format!("{flag} needs a value"))
}

fn numeric_flag(args: &[String], i: &mut usize, flag: &str) -> Result<u32, String> {
    let raw = flag_value(args, i, flag)?;
    raw.parse::<u32>()
        .map_err(|_| format!("{flag} expects an unsigned integer, got {raw:?}"))
}

fn parse_args(args: &[String]) -> Result<CliOptions, String> {
    let mut options = CliOptions {
        config: SweepConfig::default(),
        kernel_path: None,
        output_path: "primes.txt".to_string(),
    };

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--count" => options.config.candidate_count = numeric_flag(args, &mut i, "--count")?,
            "--group-size" => {
                options.config.work_group_size = numeric_flag(args, &mut i, "--group-size")?
            }
            "--kernel" => options.kernel_path = Some(flag_value(args, &mut i, "--kernel")?.into()),
            "--output" => options.output_path = flag_value(args, &mut i, "--output")?.into(),
            other => return Err(format!("unknown argument: {other}")),
        }
        i += 1;
    }
    Ok(options)
}

fn write_primes(path: &str, primes: &[u32]) -> std::io::Result<()> {
    let file = fs::File::create(path)?;
    let mut out = BufWriter::new(file);
    for p in primes {
        writeln!(out, "{p}")?;
    }
    out.flush()
}

fn summary_line(prime_count: usize, kernel_time: Duration) -> String {
    format!(
        "Calculated {prime_count} primes in {:.3} ms",
        kernel_time.as_secs_f64() * 1e3,
    )
}

fn try_main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }
    let options = parse_args(&args).map_err(|e| {
        print_usage();
        e
    })?;

    // A named kernel file must exist and be readable; an empty one is
    // caught later as an empty source, before any device allocation.
    let source = match &options.kernel_path {
        Some(path) => fs::read_to_string(path)
            .map_err(|e| format!("failed to read kernel source {path}: {e}"))?,
        None => DEFAULT_KERNEL_SOURCE.to_string(),
    };

    let gpu = GpuDevice::new()?;
    eprintln!("[primesweep] using {}", gpu.adapter_info);

    println!(
        "Enqueueing {} prime checks with a work group size of {}",
        options.config.candidate_count, options.config.work_group_size
    );

    let outcome = find_primes(&gpu, &source, &options.config)?;

    println!("Writing primes to file...");
    write_primes(&options.output_path, &outcome.primes)
        .map_err(|e| format!("failed to write {}: {e}", options.output_path))?;

    println!(
        "{}",
        summary_line(outcome.stats.prime_count, outcome.stats.kernel_time)
    );
    Ok(())
}

fn main() {
    if let Err(e) = try_main() {
        eprintln!("[primesweep] error: {e}");
        process::exit(1);
    }
}

// ============================================================
// Tests
// ============================================================

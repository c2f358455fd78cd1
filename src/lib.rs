// primesweep: GPU-offloaded prime finding by data-parallel trial division.
//
// Host pipeline: generate the first N odd integers, upload them, compile
// the check_prime kernel at runtime, dispatch one invocation per
// candidate, download the mask, reduce it to the ascending primes list.
// The CPU reference in `primality` is the authority the kernel is
// validated against.

pub mod candidates;
pub mod error;
pub mod gpu;
pub mod primality;
pub mod reduce;
pub mod sweep;

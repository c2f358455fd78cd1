// gpu/mod.rs - the device side of the sweep.
//
// Three layers, one per concern:
//
//   device   - adapter discovery, the queue, buffer allocation/transport
//   kernel   - runtime WGSL compilation and the check_prime bind contract
//   dispatch - work partitioning, launch, and the timed blocking download
//
// The CPU implementation in `crate::primality` stays the authoritative
// reference: every kernel result can be validated against it
// element-for-element, and the GPU tests do exactly that.

pub mod device;
pub mod dispatch;
pub mod kernel;

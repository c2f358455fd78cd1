// reduce.rs - mask to primes reduction.
//
// The device hands back one u32 per candidate; this module re-joins that
// mask with the candidate values by index and keeps the hits. Order is
// inherited from the candidate set, so the output is ascending without a
// sort.

use crate::candidates::CandidateSet;

/// Collect the prime values out of a downloaded mask.
///
/// A mask entry is a hit when it is nonzero; the canonical kernel writes
/// exactly 0 or 1, but any nonzero value counts so alternative kernels are
/// not held to the exact encoding. The prime count is the length of the
/// returned vector.
///
/// # Panics
/// Panics if `mask` and `candidates` differ in length. The dispatcher
/// sizes the mask buffer from the candidate set, so a mismatch means a
/// corrupted download, not a recoverable state.
pub fn collect_primes(candidates: &CandidateSet, mask: &[u32]) -> Vec<u32> {
    assert_eq!(
        candidates.len(),
        mask.len(),
        "mask length must match candidate count"
    );
    candidates
        .values()
        .iter()
        .zip(mask)
        .filter(|(_, &hit)| hit != 0)
        .map(|(&v, _)| v)
        .collect()
}

// candidates.rs - ordered odd-integer candidate generation.
//
// The pipeline tests exactly the first N odd integers: candidate i holds
// the value 2*i + 1, so index 0 is 1, index 1 is 3, and so on. The
// index-to-value mapping stays closed-form; the mask slot and the
// candidate slot share an index, and the reducer re-joins them by
// position after download.

/// Largest supported candidate count. At `2^31` candidates the final value
/// `2*(N-1) + 1` is exactly `u32::MAX`, so anything larger would overflow
/// the 32-bit encoding the kernel works in.
pub const MAX_CANDIDATES: u32 = 1 << 31;

/// The ordered set of odd candidates, one contiguous allocation.
///
/// Immutable after generation: the same `CandidateSet` can back any number
/// of uploads and reductions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateSet {
    values: Vec<u32>,
}

impl CandidateSet {
    /// Generate the first `count` odd integers, ascending.
    ///
    /// Deterministic: the same `count` always yields the same set.
    ///
    /// # Panics
    /// Panics if `count` is zero or exceeds [`MAX_CANDIDATES`]. Callers
    /// going through [`crate::sweep::SweepConfig`] have already had the
    /// count validated; this assert is the contract for direct callers.
    pub fn generate(count: u32) -> Self {
        assert!(
            count >= 1 && count <= MAX_CANDIDATES,
            "candidate count {count} outside 1..={MAX_CANDIDATES}"
        );
        let values = (0..count).map(|i| 2 * i + 1).collect();
        CandidateSet { values }
    }

    /// The candidate values in index order.
    pub fn values(&self) -> &[u32] {
        &self.values
    }

    /// Number of candidates.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

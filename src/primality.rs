// primality.rs - CPU reference trial division.
//
// This is the host-side authority the GPU kernel is checked against: same
// algorithm, same edge cases, element-for-element. Tests compare the
// downloaded mask to `reference_mask` on small candidate sets; if the two
// ever disagree, the kernel is wrong, not this module.

use crate::candidates::CandidateSet;

/// Trial-division primality test.
///
/// Matches the kernel exactly: values below 2 are not prime, 2 is prime,
/// other even values are not, and odd values are tested against odd
/// divisors up to the square root. The loop bound is `d <= v / d` rather
/// than `d * d <= v` so the square can never overflow 32 bits.
pub fn is_prime(v: u32) -> bool {
    if v < 2 {
        return false;
    }
    if v == 2 {
        return true;
    }
    if v % 2 == 0 {
        return false;
    }
    let mut d = 3u32;
    while d <= v / d {
        if v % d == 0 {
            return false;
        }
        d += 2;
    }
    true
}

/// The mask the device is expected to produce for `candidates`:
/// one `u32` per candidate, 1 for prime, 0 otherwise.
pub fn reference_mask(candidates: &CandidateSet) -> Vec<u32> {
    candidates
        .values()
        .iter()
        .map(|&v| u32::from(is_prime(v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_values() {
        assert!(!is_prime(0));
        assert!(!is_prime(1));
        assert!(is_prime(2));
        assert!(is_prime(3));
        assert!(!is_prime(9));
    }

    #[test]
    fn test_small_primes_and_composites() {
        let primes = [5, 7, 11, 13, 17, 19, 23, 29, 31, 37];
        for p in primes {
            assert!(is_prime(p), "{p} should be prime");
        }
        let composites = [15, 21, 25, 27, 33, 35, 39, 49, 121, 169];
        for c in composites {
            assert!(!is_prime(c), "{c} should be composite");
        }
    }

    #[test]
    fn test_prime_count_below_1000() {
        // pi(1000) = 168, a standard check for any primality routine.
        let count = (2..1000).filter(|&v| is_prime(v)).count();
        assert_eq!(count, 168);
    }

    #[test]
    fn test_large_values_do_not_overflow_the_divisor_loop() {
        // 2^31 - 1 is prime (Mersenne); 4294967291 is the largest u32 prime.
        // Both push the divisor past 2^16, where a d*d bound would wrap.
        assert!(is_prime(2_147_483_647));
        assert!(is_prime(4_294_967_291));
        assert!(!is_prime(4_294_967_295)); // 3 * 5 * 17 * 257 * 65537
    }

    #[test]
    fn test_reference_mask_matches_is_prime() {
        let set = CandidateSet::generate(64);
        let mask = reference_mask(&set);
        assert_eq!(mask.len(), set.len());
        for (&v, &m) in set.values().iter().zip(&mask) {
            assert_eq!(m == 1, is_prime(v));
            assert!(m <= 1);
        }
    }
}

// SPDX-License-Identifier: AGPL-3.0-only

//! Combinatorial index decoding.
//!
//! [`unrank_combination`] maps a linear index to the unique ascending
//! k-subset of `{0..n-1}` it represents (the combinatorial number system,
//! lexicographic order). The evaluator walks combination ranks
//! `0..binomial(m, k)` per anchor particle, so every group is enumerated
//! exactly once with no permuted duplicates.
//!
//! Pure functions, independent of the parallel harness.

/// Binomial coefficient C(n, k). Exact for every value that fits u64;
/// saturates instead of overflowing.
#[must_use]
pub fn binomial(n: u64, k: u64) -> u64 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    let mut acc: u128 = 1;
    for i in 0..k {
        // Product of j consecutive integers is divisible by j!, so the
        // division is exact at every step.
        acc = acc * u128::from(n - i) / u128::from(i + 1);
        if acc > u128::from(u64::MAX) {
            return u64::MAX;
        }
    }
    acc as u64
}

/// Decode `rank` (0-based, lexicographic) into the ascending k-combination
/// of `{0..n-1}` it represents, written to `out[..k]`.
///
/// `rank` must be below `binomial(n, k)`; `out` must hold at least `k`
/// entries.
pub fn unrank_combination(rank: u64, n: u32, k: u32, out: &mut [u32]) {
    debug_assert!(rank < binomial(u64::from(n), u64::from(k)));
    let mut remaining = rank;
    let mut next = 0u32;
    for slot in 0..k {
        loop {
            // Combinations starting with `next` in this slot.
            let with_next = binomial(
                u64::from(n - next - 1),
                u64::from(k - slot - 1),
            );
            if remaining < with_next {
                break;
            }
            remaining -= with_next;
            next += 1;
        }
        out[slot as usize] = next;
        next += 1;
    }
}

/// Advance `perm` to the next permutation in lexicographic order.
/// Returns false (leaving `perm` sorted ascending) after the last one.
pub fn next_permutation(perm: &mut [usize]) -> bool {
    if perm.len() < 2 {
        return false;
    }
    let mut i = perm.len() - 1;
    while i > 0 && perm[i - 1] >= perm[i] {
        i -= 1;
    }
    if i == 0 {
        perm.sort_unstable();
        return false;
    }
    let mut j = perm.len() - 1;
    while perm[j] <= perm[i - 1] {
        j -= 1;
    }
    perm.swap(i - 1, j);
    perm[i..].reverse();
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binomial_small_values() {
        assert_eq!(binomial(0, 0), 1);
        assert_eq!(binomial(5, 0), 1);
        assert_eq!(binomial(5, 5), 1);
        assert_eq!(binomial(5, 2), 10);
        assert_eq!(binomial(10, 3), 120);
        assert_eq!(binomial(52, 5), 2_598_960);
        assert_eq!(binomial(3, 4), 0);
    }

    #[test]
    fn binomial_symmetry() {
        for n in 0..20u64 {
            for k in 0..=n {
                assert_eq!(binomial(n, k), binomial(n, n - k));
            }
        }
    }

    #[test]
    fn binomial_saturates() {
        assert_eq!(binomial(200, 100), u64::MAX);
    }

    #[test]
    fn unrank_enumerates_all_ascending_unique() {
        let (n, k) = (7u32, 3u32);
        let total = binomial(u64::from(n), u64::from(k));
        let mut seen = std::collections::HashSet::new();
        let mut out = [0u32; 3];
        let mut prev: Option<[u32; 3]> = None;
        for rank in 0..total {
            unrank_combination(rank, n, k, &mut out);
            assert!(out[0] < out[1] && out[1] < out[2], "ascending: {out:?}");
            assert!(out[2] < n);
            assert!(seen.insert(out), "duplicate combination {out:?}");
            if let Some(p) = prev {
                assert!(p < out, "lexicographic order broken at rank {rank}");
            }
            prev = Some(out);
        }
        assert_eq!(seen.len() as u64, total);
    }

    #[test]
    fn unrank_first_and_last() {
        let mut out = [0u32; 2];
        unrank_combination(0, 5, 2, &mut out);
        assert_eq!(out, [0, 1]);
        unrank_combination(binomial(5, 2) - 1, 5, 2, &mut out);
        assert_eq!(out, [3, 4]);
    }

    #[test]
    fn unrank_k_equals_one() {
        let mut out = [0u32; 1];
        for rank in 0..6 {
            unrank_combination(rank, 6, 1, &mut out);
            assert_eq!(u64::from(out[0]), rank);
        }
    }

    #[test]
    fn permutations_visit_factorial_count() {
        let mut perm = vec![0usize, 1, 2, 3];
        let mut count = 1;
        while next_permutation(&mut perm) {
            count += 1;
        }
        assert_eq!(count, 24);
        assert_eq!(perm, vec![0, 1, 2, 3], "reset to sorted after last");
    }

    #[test]
    fn permutations_lexicographic() {
        let mut perm = vec![0usize, 1, 2];
        assert!(next_permutation(&mut perm));
        assert_eq!(perm, vec![0, 2, 1]);
        assert!(next_permutation(&mut perm));
        assert_eq!(perm, vec![1, 0, 2]);
    }

    #[test]
    fn single_element_has_no_successor() {
        let mut perm = vec![0usize];
        assert!(!next_permutation(&mut perm));
    }
}

// SPDX-License-Identifier: AGPL-3.0-only

//! Work-efficient prefix sums over neighbor counts.
//!
//! The offset table is built window by window: each [`crate::tolerances::SCAN_WINDOW`]
//! slice gets an intra-window inclusive scan (Hillis-Steele ladder — the
//! same stride-doubling steps the GPU shader separates with workgroup
//! barriers), then a running carry links successive windows. The table must
//! be complete before any scatter starts; [`offset_table`] returns only
//! once every window is folded in.

use crate::tolerances::SCAN_WINDOW;

/// In-place inclusive scan of one window, as a stride-doubling ladder.
///
/// Each doubling round reads the previous round's values, mirroring the
/// barrier-separated steps of the workgroup shader.
pub fn inclusive_scan_window(window: &mut [u32]) {
    let mut stride = 1;
    while stride < window.len() {
        let prev = window.to_vec();
        for k in stride..window.len() {
            window[k] = prev[k] + prev[k - stride];
        }
        stride *= 2;
    }
}

/// Exclusive offset table over per-particle counts, with a total sentinel.
///
/// `offsets[0] == 0`, `offsets[k + 1] - offsets[k] == counts[k]`, and the
/// final entry is the total count. Windows larger than the particle count
/// degenerate to a single scan.
#[must_use]
pub fn offset_table(counts: &[u32]) -> Vec<u32> {
    let mut offsets = vec![0u32; counts.len() + 1];
    let mut carry = 0u32;
    let mut window = [0u32; SCAN_WINDOW];
    for (chunk_idx, chunk) in counts.chunks(SCAN_WINDOW).enumerate() {
        let base = chunk_idx * SCAN_WINDOW;
        window[..chunk.len()].copy_from_slice(chunk);
        inclusive_scan_window(&mut window[..chunk.len()]);
        for k in 0..chunk.len() {
            offsets[base + k + 1] = carry + window[k];
        }
        carry += window[chunk.len() - 1];
    }
    offsets
}

#[cfg(test)]
mod tests {
    use super::*;

    fn serial_inclusive(counts: &[u32]) -> Vec<u32> {
        let mut acc = 0u32;
        counts
            .iter()
            .map(|&c| {
                acc += c;
                acc
            })
            .collect()
    }

    #[test]
    fn window_scan_matches_serial() {
        let mut window: Vec<u32> = (0..97).map(|k| (k * 7 + 3) % 11).collect();
        let expected = serial_inclusive(&window);
        inclusive_scan_window(&mut window);
        assert_eq!(window, expected);
    }

    #[test]
    fn window_scan_single_element() {
        let mut window = vec![5u32];
        inclusive_scan_window(&mut window);
        assert_eq!(window, vec![5]);
    }

    #[test]
    fn offset_table_invariants() {
        let counts: Vec<u32> = (0..1000).map(|k| (k * 13 + 1) % 7).collect();
        let offsets = offset_table(&counts);
        assert_eq!(offsets.len(), counts.len() + 1);
        assert_eq!(offsets[0], 0);
        for k in 0..counts.len() {
            assert_eq!(offsets[k + 1] - offsets[k], counts[k], "delta at {k}");
            assert!(offsets[k + 1] >= offsets[k], "monotonic at {k}");
        }
        let total: u32 = counts.iter().sum();
        assert_eq!(*offsets.last().unwrap(), total);
    }

    #[test]
    fn offset_table_spans_multiple_windows() {
        let counts = vec![1u32; SCAN_WINDOW * 3 + 17];
        let offsets = offset_table(&counts);
        for (k, &o) in offsets.iter().enumerate() {
            assert_eq!(o as usize, k);
        }
    }

    #[test]
    fn offset_table_empty() {
        assert_eq!(offset_table(&[]), vec![0]);
    }

    #[test]
    fn offset_table_all_zero_counts() {
        let offsets = offset_table(&[0; 50]);
        assert!(offsets.iter().all(|&o| o == 0));
    }
}

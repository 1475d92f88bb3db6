// SPDX-License-Identifier: AGPL-3.0-only

//! Neighbor-list assembly: scatter discovered pairs into per-particle
//! segments.
//!
//! Each particle `i` owns the slice `neighbors[offsets[i]..offsets[i + 1]]`.
//! Workers walk the unordered pair buffer and claim a slot within the
//! owner's segment with one atomic cursor increment per pair. Within a
//! segment the neighbor order is scheduling-dependent; segment membership
//! is not.

use crate::error::RiptideError;
use crate::interactions::discovery::unpack_pair;
use rayon::prelude::*;
use std::sync::atomic::{AtomicU32, Ordering};

/// Scatter `total_pairs` packed pairs into segmented per-particle lists.
///
/// `offsets` is the exclusive offset table over the per-particle counts
/// (length `n + 1`, sentinel total last). Returns the flat neighbor array,
/// length `total_pairs`.
///
/// # Errors
///
/// Returns [`RiptideError::CapacityExceeded`] when `total_pairs` exceeds
/// `capacity`, carrying the exact requirement so the caller can rebuild.
pub fn assemble_neighbor_lists(
    pairs: &[u64],
    total_pairs: usize,
    offsets: &[u32],
    capacity: usize,
) -> Result<Vec<u32>, RiptideError> {
    if total_pairs > capacity {
        return Err(RiptideError::CapacityExceeded {
            required: total_pairs,
            capacity,
        });
    }

    let n = offsets.len() - 1;
    let mut cursors = Vec::with_capacity(n);
    cursors.resize_with(n, || AtomicU32::new(0));
    let mut neighbors = Vec::with_capacity(total_pairs);
    neighbors.resize_with(total_pairs, || AtomicU32::new(0));

    pairs[..total_pairs].par_iter().for_each(|&packed| {
        let (i, j) = unpack_pair(packed);
        let slot = offsets[i] + cursors[i].fetch_add(1, Ordering::Relaxed);
        neighbors[slot as usize].store(j as u32, Ordering::Relaxed);
    });

    Ok(neighbors.into_iter().map(AtomicU32::into_inner).collect())
}

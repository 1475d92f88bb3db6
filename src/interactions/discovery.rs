// SPDX-License-Identifier: AGPL-3.0-only

//! Neighbor-pair discovery over the tile decomposition.
//!
//! One worker per particle `i` scans every tile at or after `tile(i)`,
//! rejecting whole tiles by a conservative bounding-box separation test,
//! then testing surviving particles individually: `j > i`, squared
//! minimum-image distance below cutoff squared, pair not excluded.
//!
//! Accepted pairs land in a shared capacity-bounded buffer through batched
//! atomic reservation: each worker buffers up to [`PAIR_BATCH`] pairs
//! locally, then claims a contiguous range with one fetch-add. The global
//! cursor keeps advancing past capacity, so the exact requirement is known
//! for a rebuild; writes beyond capacity are dropped. Pair order in the
//! buffer is scheduling-dependent — downstream consumers treat neighbor
//! order as unordered.

use crate::interactions::exclusions::ExclusionSet;
use crate::interactions::tiling::{dist_sq, TileBounds};
use crate::tolerances::PAIR_BATCH;
use rayon::prelude::*;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};

/// Pack an ordered pair (i < j) into one buffer slot.
#[inline]
#[must_use]
pub fn pack_pair(i: usize, j: usize) -> u64 {
    ((i as u64) << 32) | j as u64
}

/// Inverse of [`pack_pair`].
#[inline]
#[must_use]
pub fn unpack_pair(packed: u64) -> (usize, usize) {
    ((packed >> 32) as usize, (packed & 0xffff_ffff) as usize)
}

/// Result of one discovery pass.
pub struct DiscoveryOutput {
    /// Packed pairs; only the first `total_pairs.min(capacity)` slots are
    /// valid.
    pub pairs: Vec<u64>,
    /// Forward-neighbor count per particle (pairs anchored at that index).
    pub counts: Vec<u32>,
    /// Exact accepted pair count, possibly exceeding the buffer capacity.
    pub total_pairs: usize,
}

fn flush_batch(
    buffer: &[AtomicU64],
    cursor: &AtomicUsize,
    batch: &mut Vec<u64>,
) {
    if batch.is_empty() {
        return;
    }
    let base = cursor.fetch_add(batch.len(), Ordering::Relaxed);
    for (k, &pair) in batch.iter().enumerate() {
        if base + k < buffer.len() {
            buffer[base + k].store(pair, Ordering::Relaxed);
        }
    }
    batch.clear();
}

/// Find all interacting pairs. `cutoff == None` disables the distance test
/// and the tile pruning (the unbounded O(N^2) scan).
#[must_use]
pub fn find_neighbor_pairs(
    positions: &[f64],
    n: usize,
    bounds: &TileBounds,
    cutoff: Option<f64>,
    box_vectors: Option<[f64; 3]>,
    exclusions: &ExclusionSet,
    capacity: usize,
) -> DiscoveryOutput {
    let mut buffer = Vec::with_capacity(capacity);
    buffer.resize_with(capacity, || AtomicU64::new(0));
    let cursor = AtomicUsize::new(0);
    let mut counts = Vec::with_capacity(n);
    counts.resize_with(n, || AtomicU32::new(0));

    let cutoff_sq = cutoff.map(|rc| rc * rc);

    (0..n).into_par_iter().for_each(|i| {
        let own_tile = i / bounds.tile_width;
        let mut batch: Vec<u64> = Vec::with_capacity(PAIR_BATCH);
        let mut accepted = 0u32;

        for tile in own_tile..bounds.n_tiles {
            if let Some(rc_sq) = cutoff_sq {
                if tile != own_tile
                    && bounds.min_box_distance_sq(own_tile, tile, box_vectors) > rc_sq
                {
                    continue;
                }
            }

            let first = tile * bounds.tile_width;
            let last = ((tile + 1) * bounds.tile_width).min(n);
            for j in first.max(i + 1)..last {
                if let Some(rc_sq) = cutoff_sq {
                    if dist_sq(positions, i, j, box_vectors) >= rc_sq {
                        continue;
                    }
                }
                if exclusions.contains(i, j) {
                    continue;
                }
                batch.push(pack_pair(i, j));
                accepted += 1;
                if batch.len() == PAIR_BATCH {
                    flush_batch(&buffer, &cursor, &mut batch);
                }
            }
        }

        flush_batch(&buffer, &cursor, &mut batch);
        counts[i].store(accepted, Ordering::Relaxed);
    });

    DiscoveryOutput {
        pairs: buffer.into_iter().map(AtomicU64::into_inner).collect(),
        counts: counts.into_iter().map(AtomicU32::into_inner).collect(),
        total_pairs: cursor.into_inner(),
    }
}

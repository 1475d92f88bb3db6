// SPDX-License-Identifier: AGPL-3.0-only

//! Spatial tiling: fixed-width contiguous particle tiles with bounding
//! boxes, recomputed every invocation.
//!
//! Each tile covers [`crate::tolerances::TILE_WIDTH`] consecutive particle
//! indices (the last tile may be partial). Under periodic boundaries each
//! particle is folded into the primary image relative to the tile's running
//! box center before widening the bounds, so a tile straddling the box edge
//! gets a tight box instead of one smeared across the whole cell.

/// Minimum-image displacement under an optional orthorhombic box.
#[inline]
pub fn min_image(mut delta: [f64; 3], box_vectors: Option<[f64; 3]>) -> [f64; 3] {
    if let Some(bx) = box_vectors {
        for k in 0..3 {
            delta[k] -= bx[k] * (delta[k] / bx[k]).round();
        }
    }
    delta
}

/// Squared minimum-image distance between two stride-3 positions.
#[inline]
pub fn dist_sq(
    positions: &[f64],
    i: usize,
    j: usize,
    box_vectors: Option<[f64; 3]>,
) -> f64 {
    let delta = min_image(
        [
            positions[i * 3] - positions[j * 3],
            positions[i * 3 + 1] - positions[j * 3 + 1],
            positions[i * 3 + 2] - positions[j * 3 + 2],
        ],
        box_vectors,
    );
    delta[0] * delta[0] + delta[1] * delta[1] + delta[2] * delta[2]
}

/// Per-tile bounding boxes: center and half-extent, stride 3.
#[derive(Debug, Clone)]
pub struct TileBounds {
    pub centers: Vec<f64>,
    pub half_extents: Vec<f64>,
    pub n_tiles: usize,
    pub tile_width: usize,
}

impl TileBounds {
    /// Compute bounding boxes for all tiles. Zero particles yield zero
    /// tiles. Pure function of the positions.
    #[must_use]
    pub fn compute(
        positions: &[f64],
        n: usize,
        box_vectors: Option<[f64; 3]>,
        tile_width: usize,
    ) -> Self {
        let n_tiles = n.div_ceil(tile_width);
        let mut centers = vec![0.0f64; n_tiles * 3];
        let mut half_extents = vec![0.0f64; n_tiles * 3];

        for tile in 0..n_tiles {
            let first = tile * tile_width;
            let last = ((tile + 1) * tile_width).min(n);

            let mut lo = [
                positions[first * 3],
                positions[first * 3 + 1],
                positions[first * 3 + 2],
            ];
            let mut hi = lo;

            for i in (first + 1)..last {
                let center = [
                    0.5 * (lo[0] + hi[0]),
                    0.5 * (lo[1] + hi[1]),
                    0.5 * (lo[2] + hi[2]),
                ];
                let delta = min_image(
                    [
                        positions[i * 3] - center[0],
                        positions[i * 3 + 1] - center[1],
                        positions[i * 3 + 2] - center[2],
                    ],
                    box_vectors,
                );
                for k in 0..3 {
                    let folded = center[k] + delta[k];
                    lo[k] = lo[k].min(folded);
                    hi[k] = hi[k].max(folded);
                }
            }

            for k in 0..3 {
                centers[tile * 3 + k] = 0.5 * (lo[k] + hi[k]);
                half_extents[tile * 3 + k] = 0.5 * (hi[k] - lo[k]);
            }
        }

        Self {
            centers,
            half_extents,
            n_tiles,
            tile_width,
        }
    }

    /// Conservative squared lower bound on the separation between two tile
    /// bounding boxes, with minimum-image folding of the center delta.
    #[must_use]
    pub fn min_box_distance_sq(
        &self,
        tile_a: usize,
        tile_b: usize,
        box_vectors: Option<[f64; 3]>,
    ) -> f64 {
        let delta = min_image(
            [
                self.centers[tile_b * 3] - self.centers[tile_a * 3],
                self.centers[tile_b * 3 + 1] - self.centers[tile_a * 3 + 1],
                self.centers[tile_b * 3 + 2] - self.centers[tile_a * 3 + 2],
            ],
            box_vectors,
        );
        let mut d_sq = 0.0;
        for k in 0..3 {
            let gap = delta[k].abs()
                - (self.half_extents[tile_a * 3 + k] + self.half_extents[tile_b * 3 + k]);
            if gap > 0.0 {
                d_sq += gap * gap;
            }
        }
        d_sq
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_positions(n: usize, box_side: f64) -> Vec<f64> {
        let mut pos = Vec::with_capacity(n * 3);
        let mut seed = 42u64;
        for _ in 0..n {
            for _ in 0..3 {
                seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
                pos.push((seed >> 33) as f64 / (1u64 << 31) as f64 * box_side);
            }
        }
        pos
    }

    #[test]
    fn zero_particles_zero_tiles() {
        let bounds = TileBounds::compute(&[], 0, None, 32);
        assert_eq!(bounds.n_tiles, 0);
        assert!(bounds.centers.is_empty());
    }

    #[test]
    fn partial_last_tile() {
        let pos = sample_positions(40, 10.0);
        let bounds = TileBounds::compute(&pos, 40, None, 32);
        assert_eq!(bounds.n_tiles, 2, "40 particles at width 32 -> 2 tiles");
    }

    #[test]
    fn bounds_cover_all_particles_nonperiodic() {
        let n = 100;
        let pos = sample_positions(n, 10.0);
        let bounds = TileBounds::compute(&pos, n, None, 32);
        for i in 0..n {
            let tile = i / 32;
            for k in 0..3 {
                let c = bounds.centers[tile * 3 + k];
                let h = bounds.half_extents[tile * 3 + k];
                let x = pos[i * 3 + k];
                assert!(
                    x >= c - h - 1e-12 && x <= c + h + 1e-12,
                    "particle {i} axis {k} outside tile box"
                );
            }
        }
    }

    #[test]
    fn periodic_tile_straddling_boundary_stays_tight() {
        // Two particles across the wrap: 0.1 and 9.9 in a box of 10.
        let pos = vec![0.1, 5.0, 5.0, 9.9, 5.0, 5.0];
        let bounds = TileBounds::compute(&pos, 2, Some([10.0, 10.0, 10.0]), 32);
        // Folded separation is 0.2, so the half-extent must be ~0.1, not ~4.9.
        assert!(
            bounds.half_extents[0] < 0.2,
            "half extent {} should reflect folded positions",
            bounds.half_extents[0]
        );
    }

    #[test]
    fn box_distance_zero_for_overlapping() {
        let pos = sample_positions(64, 5.0);
        let bounds = TileBounds::compute(&pos, 64, None, 32);
        assert!(bounds.min_box_distance_sq(0, 0, None) <= 1e-30);
    }

    #[test]
    fn box_distance_lower_bounds_pair_distance() {
        let n = 96;
        let box_side = 12.0;
        let pos = sample_positions(n, box_side);
        let bx = Some([box_side; 3]);
        let bounds = TileBounds::compute(&pos, n, bx, 32);
        for ta in 0..bounds.n_tiles {
            for tb in ta..bounds.n_tiles {
                let lower = bounds.min_box_distance_sq(ta, tb, bx);
                for i in ta * 32..(ta * 32 + 32).min(n) {
                    for j in tb * 32..(tb * 32 + 32).min(n) {
                        let d = dist_sq(&pos, i, j, bx);
                        assert!(
                            lower <= d + 1e-9,
                            "tile bound {lower} exceeds pair distance {d} ({i},{j})"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn min_image_wraps_to_nearest() {
        let d = min_image([7.0, -7.0, 0.5], Some([10.0, 10.0, 10.0]));
        assert!((d[0] - -3.0).abs() < 1e-12);
        assert!((d[1] - 3.0).abs() < 1e-12);
        assert!((d[2] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn min_image_noop_without_box() {
        let d = min_image([7.0, -7.0, 0.5], None);
        assert_eq!(d, [7.0, -7.0, 0.5]);
    }
}

// SPDX-License-Identifier: AGPL-3.0-only

//! Centralized tuning constants and validation tolerances.
//!
//! Every threshold used by the pipeline and its tests is defined here with
//! its origin and rationale. No ad-hoc magic numbers in the stage code.

// ── Pipeline tuning ──────────────────────────────────────────────────

/// Particles per spatial tile. Matches the SIMT warp width the discovery
/// kernel is laid out for; the CPU path uses the same value so both paths
/// produce identical tile decompositions.
pub const TILE_WIDTH: usize = 32;

/// Particles scanned together per prefix-sum window. One GPU workgroup;
/// the CPU scan uses the same window so carry boundaries match.
pub const SCAN_WINDOW: usize = 256;

/// Accepted pairs a discovery worker buffers locally before reserving
/// buffer space with one atomic add. Larger batches mean fewer atomics,
/// at the cost of per-worker scratch.
pub const PAIR_BATCH: usize = 64;

/// Fixed-point force scale: force * 2^32 accumulated as integer.
/// Forces up to ~2^20 in magnitude fit an i64 accumulator with room for
/// millions of contributions per particle.
pub const FORCE_SCALE: f64 = 4_294_967_296.0;

/// Initial neighbor-buffer capacity, in pairs per particle. Dense liquids
/// at typical cutoffs see 20-60 forward neighbors; discovery reports the
/// exact requirement on overflow so the first guess only costs one retry.
pub const INITIAL_PAIRS_PER_PARTICLE: usize = 32;

/// Headroom multiplier applied to the exact pair count when regrowing the
/// neighbor buffer after a `CapacityExceeded`.
pub const PAIR_CAPACITY_HEADROOM: f64 = 1.1;

/// Rebuild attempts before giving up. Discovery reports the exact
/// requirement, so a second failure means positions changed mid-call.
pub const MAX_REBUILD_ATTEMPTS: usize = 4;

/// Largest interaction group size the GPU shaders carry permutation
/// tables for. The CPU evaluator is generic; sizes above 4 are rejected
/// at configuration time to keep both paths in agreement.
pub const MAX_GROUP_SIZE: usize = 4;

/// Highest particle type id representable in the GPU type-filter bitmask.
pub const MAX_GPU_TYPE_ID: i32 = 31;

// ── Validation tolerances ────────────────────────────────────────────

/// Exact f64 arithmetic reproduced in a different order.
pub const EXACT_F64: f64 = 1e-12;

/// Below this magnitude an expected value is treated as zero when forming
/// relative errors.
pub const NEAR_ZERO_EXPECTED: f64 = 1e-12;

/// One fixed-point quantum is 2^-32 per contribution; a few hundred
/// contributions per component stay far under this bound.
pub const FIXED_POINT_ABS: f64 = 1e-6;

/// Pipeline forces vs a plain f64 reference summed in arbitrary order:
/// fixed-point rounding plus f64 reassociation.
pub const FORCE_PARITY_ABS: f64 = 1e-6;

/// Analytic gradients vs central differences with h ~ 1e-5: truncation
/// error O(h^2) plus cancellation leaves ~1e-6 relative agreement.
pub const NUMERICAL_GRADIENT_REL: f64 = 1e-5;

/// Net force on an isolated group must vanish to accumulation roundoff.
pub const NEWTON_3RD_LAW_ABS: f64 = 1e-9;

/// GPU f64 vs CPU f64 for the same staged algorithm.
pub const GPU_VS_CPU_F64: f64 = 1e-10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn force_scale_is_2_pow_32() {
        assert!((FORCE_SCALE - (1u64 << 32) as f64).abs() < f64::EPSILON);
    }

    #[test]
    fn scan_window_is_power_of_two() {
        assert!(SCAN_WINDOW.is_power_of_two(), "ladder scan needs 2^k window");
    }

    #[test]
    fn tile_width_divides_scan_window() {
        assert_eq!(SCAN_WINDOW % TILE_WIDTH, 0);
    }

    #[test]
    fn headroom_grows() {
        assert!(PAIR_CAPACITY_HEADROOM > 1.0);
    }
}

// SPDX-License-Identifier: AGPL-3.0-only

//! Fixed-point force accumulation.
//!
//! One `AtomicI64` triple per particle, written only through atomic add.
//! Contributions are scaled by [`crate::tolerances::FORCE_SCALE`] (2^32)
//! and rounded to integers, so concurrent accumulation is exact and the
//! final contents are bit-identical regardless of write order. Overflow is
//! the caller's concern: the scale is chosen so expected force magnitudes
//! never saturate within one step.

use crate::tolerances::FORCE_SCALE;
use std::sync::atomic::{AtomicI64, Ordering};

/// Per-particle fixed-point force accumulator.
pub struct FixedPointForceBuffer {
    slots: Vec<AtomicI64>,
    n_particles: usize,
}

impl FixedPointForceBuffer {
    /// Zero-initialized buffer for `n_particles` particles.
    #[must_use]
    pub fn new(n_particles: usize) -> Self {
        let mut slots = Vec::with_capacity(n_particles * 3);
        slots.resize_with(n_particles * 3, || AtomicI64::new(0));
        Self { slots, n_particles }
    }

    #[must_use]
    pub const fn n_particles(&self) -> usize {
        self.n_particles
    }

    /// Atomically add one force contribution to particle `i`.
    pub fn add(&self, i: usize, force: [f64; 3]) {
        for k in 0..3 {
            let quantized = (force[k] * FORCE_SCALE).round() as i64;
            self.slots[i * 3 + k].fetch_add(quantized, Ordering::Relaxed);
        }
    }

    /// Zero all accumulators.
    pub fn reset(&self) {
        for slot in &self.slots {
            slot.store(0, Ordering::Relaxed);
        }
    }

    /// Raw fixed-point contents (for bit-identity checks).
    #[must_use]
    pub fn raw(&self) -> Vec<i64> {
        self.slots.iter().map(|s| s.load(Ordering::Relaxed)).collect()
    }

    /// Convert back to floating-point forces, stride 3.
    #[must_use]
    pub fn to_forces(&self) -> Vec<f64> {
        self.slots
            .iter()
            .map(|s| s.load(Ordering::Relaxed) as f64 / FORCE_SCALE)
            .collect()
    }
}

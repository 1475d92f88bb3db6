// SPDX-License-Identifier: AGPL-3.0-only

//! The many-particle interaction pipeline.
//!
//! One invocation runs five stages over a frozen snapshot of the
//! positions:
//!
//! 1. tiling       — bounding boxes over fixed-width particle tiles
//! 2. discovery    — box-pruned pair search into a shared buffer
//! 3. scan         — offset table over per-particle pair counts
//! 4. assembly     — scatter pairs into segmented neighbor lists
//! 5. evaluation   — combinatorial group enumeration and potential calls
//!
//! Forces accumulate in fixed point, so repeating an invocation on the
//! same snapshot is bit-identical even though stages run on a thread pool.
//! The neighbor buffer self-sizes: discovery reports the exact pair count
//! on overflow and [`evaluate_forces`] rebuilds with headroom.

pub mod assemble;
pub mod combinations;
pub mod discovery;
pub mod evaluate;
pub mod exclusions;
pub mod forcebuf;
pub mod gpu;
pub mod scan;
pub mod shaders;
pub mod tiling;

use crate::error::RiptideError;
use crate::force::{GroupPotential, ManyParticleForce, NonbondedMethod};
use crate::interactions::exclusions::ExclusionSet;
use crate::interactions::forcebuf::FixedPointForceBuffer;
use crate::interactions::tiling::TileBounds;
use crate::tolerances::{
    INITIAL_PAIRS_PER_PARTICLE, MAX_REBUILD_ATTEMPTS, PAIR_CAPACITY_HEADROOM, TILE_WIDTH,
};

/// Output of one pipeline invocation.
#[derive(Debug, Clone)]
pub struct EvaluationResult {
    /// Per-particle forces, stride 3, already converted from fixed point.
    pub forces: Vec<f64>,
    /// Total interaction energy, summed deterministically in anchor order.
    pub energy: f64,
    /// Pairs the discovery stage accepted.
    pub pair_count: usize,
    /// Groups the potential was invoked on.
    pub group_count: u64,
}

fn validate(
    force: &ManyParticleForce,
    potential: &dyn GroupPotential,
    positions: &[f64],
    box_vectors: Option<[f64; 3]>,
) -> Result<(Option<f64>, Option<[f64; 3]>), RiptideError> {
    if potential.group_size() != force.group_size() {
        return Err(RiptideError::Configuration(format!(
            "potential binds {} roles but force groups {} particles",
            potential.group_size(),
            force.group_size()
        )));
    }
    if positions.len() != force.num_particles() * 3 {
        return Err(RiptideError::Configuration(format!(
            "{} position components for {} particles",
            positions.len(),
            force.num_particles()
        )));
    }

    match force.method() {
        NonbondedMethod::NoCutoff => Ok((None, None)),
        NonbondedMethod::CutoffNonPeriodic => {
            let cutoff = force.cutoff();
            if cutoff <= 0.0 {
                return Err(RiptideError::Configuration(format!(
                    "cutoff {cutoff} must be positive"
                )));
            }
            Ok((Some(cutoff), None))
        }
        NonbondedMethod::CutoffPeriodic => {
            let cutoff = force.cutoff();
            if cutoff <= 0.0 {
                return Err(RiptideError::Configuration(format!(
                    "cutoff {cutoff} must be positive"
                )));
            }
            let bx = box_vectors.ok_or_else(|| {
                RiptideError::Configuration(
                    "periodic method requires box vectors".into(),
                )
            })?;
            for (axis, &side) in bx.iter().enumerate() {
                if side < 2.0 * cutoff {
                    return Err(RiptideError::GeometryViolation(format!(
                        "box side {side} on axis {axis} below 2 x cutoff {cutoff}"
                    )));
                }
            }
            Ok((Some(cutoff), Some(bx)))
        }
    }
}

fn run_once(
    force: &ManyParticleForce,
    potential: &dyn GroupPotential,
    positions: &[f64],
    cutoff: Option<f64>,
    bx: Option<[f64; 3]>,
    capacity: usize,
) -> Result<EvaluationResult, RiptideError> {
    let n = force.num_particles();
    let excl = ExclusionSet::from_pairs(n, force.exclusions());

    let bounds = TileBounds::compute(positions, n, bx, TILE_WIDTH);
    let found = discovery::find_neighbor_pairs(
        positions, n, &bounds, cutoff, bx, &excl, capacity,
    );
    let offsets = scan::offset_table(&found.counts);
    let neighbors = assemble::assemble_neighbor_lists(
        &found.pairs,
        found.total_pairs,
        &offsets,
        capacity,
    )?;

    let force_buffer = FixedPointForceBuffer::new(n);
    let (energy, group_count) = evaluate::evaluate_groups(
        positions,
        force,
        potential,
        &neighbors,
        &offsets,
        cutoff,
        bx,
        &excl,
        &force_buffer,
    );

    Ok(EvaluationResult {
        forces: force_buffer.to_forces(),
        energy,
        pair_count: found.total_pairs,
        group_count,
    })
}

/// Run the pipeline with a fixed neighbor-buffer capacity. A single
/// attempt: overflow surfaces as [`RiptideError::CapacityExceeded`] with
/// the exact requirement, and no forces have been accumulated.
pub fn evaluate_forces_with_capacity(
    force: &ManyParticleForce,
    potential: &dyn GroupPotential,
    positions: &[f64],
    box_vectors: Option<[f64; 3]>,
    capacity: usize,
) -> Result<EvaluationResult, RiptideError> {
    let (cutoff, bx) = validate(force, potential, positions, box_vectors)?;
    run_once(force, potential, positions, cutoff, bx, capacity)
}

/// Run the pipeline, growing the neighbor buffer on overflow.
///
/// The first attempt sizes the buffer at
/// [`INITIAL_PAIRS_PER_PARTICLE`] pairs per particle; on overflow the
/// reported requirement is regrown with [`PAIR_CAPACITY_HEADROOM`] and the
/// step is repeated. Discovery reports exact requirements, so at most one
/// retry is expected; the loop is bounded by [`MAX_REBUILD_ATTEMPTS`]
/// regardless.
pub fn evaluate_forces(
    force: &ManyParticleForce,
    potential: &dyn GroupPotential,
    positions: &[f64],
    box_vectors: Option<[f64; 3]>,
) -> Result<EvaluationResult, RiptideError> {
    let (cutoff, bx) = validate(force, potential, positions, box_vectors)?;

    let mut capacity = (force.num_particles() * INITIAL_PAIRS_PER_PARTICLE).max(1);
    let mut last_err = None;
    for _ in 0..MAX_REBUILD_ATTEMPTS {
        match run_once(force, potential, positions, cutoff, bx, capacity) {
            Err(RiptideError::CapacityExceeded { required, .. }) => {
                capacity = ((required as f64 * PAIR_CAPACITY_HEADROOM).ceil() as usize)
                    .max(required);
                last_err = Some(RiptideError::CapacityExceeded {
                    required,
                    capacity,
                });
            }
            other => return other,
        }
    }
    Err(last_err.unwrap_or(RiptideError::CapacityExceeded {
        required: 0,
        capacity,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::potentials::AxilrodTeller;
    use crate::tolerances::{EXACT_F64, NEWTON_3RD_LAW_ABS};

    fn triple_force(n: usize, method: NonbondedMethod, cutoff: f64) -> ManyParticleForce {
        let mut force = ManyParticleForce::new(3).unwrap();
        for _ in 0..n {
            force.add_particle(&[], 0);
        }
        force.set_method(method);
        force.set_cutoff(cutoff);
        force
    }

    fn tetrahedron() -> Vec<f64> {
        vec![
            0.0, 0.0, 0.0, //
            1.0, 0.0, 0.0, //
            0.5, 0.866, 0.0, //
            0.5, 0.289, 0.816,
        ]
    }

    #[test]
    fn group_size_mismatch_is_configuration_error() {
        // AxilrodTeller binds 3 roles; a pair force cannot host it.
        let mut two_body = ManyParticleForce::new(2).unwrap();
        for _ in 0..4 {
            two_body.add_particle(&[], 0);
        }
        let pos = tetrahedron();
        let err = evaluate_forces(&two_body, &AxilrodTeller::new(1.0), &pos, None).unwrap_err();
        assert!(matches!(err, RiptideError::Configuration(_)));
    }

    #[test]
    fn position_length_mismatch_is_configuration_error() {
        let force = triple_force(4, NonbondedMethod::NoCutoff, 0.0);
        let err =
            evaluate_forces(&force, &AxilrodTeller::new(1.0), &[0.0; 9], None).unwrap_err();
        assert!(matches!(err, RiptideError::Configuration(_)));
    }

    #[test]
    fn small_box_is_geometry_violation() {
        let force = triple_force(4, NonbondedMethod::CutoffPeriodic, 2.0);
        let pos = tetrahedron();
        let err = evaluate_forces(&force, &AxilrodTeller::new(1.0), &pos, Some([3.0, 10.0, 10.0]))
            .unwrap_err();
        assert!(matches!(err, RiptideError::GeometryViolation(_)));
    }

    #[test]
    fn periodic_without_box_is_configuration_error() {
        let force = triple_force(4, NonbondedMethod::CutoffPeriodic, 2.0);
        let pos = tetrahedron();
        let err = evaluate_forces(&force, &AxilrodTeller::new(1.0), &pos, None).unwrap_err();
        assert!(matches!(err, RiptideError::Configuration(_)));
    }

    #[test]
    fn tetrahedron_counts_pairs_and_groups() {
        let force = triple_force(4, NonbondedMethod::CutoffNonPeriodic, 2.0);
        let pos = tetrahedron();
        let result = evaluate_forces(&force, &AxilrodTeller::new(1.0), &pos, None).unwrap();
        assert_eq!(result.pair_count, 6);
        assert_eq!(result.group_count, 4);
    }

    #[test]
    fn capacity_one_overflows_without_touching_forces() {
        let force = triple_force(4, NonbondedMethod::CutoffNonPeriodic, 2.0);
        let pos = tetrahedron();
        let err = evaluate_forces_with_capacity(&force, &AxilrodTeller::new(1.0), &pos, None, 1)
            .unwrap_err();
        match err {
            RiptideError::CapacityExceeded { required, capacity } => {
                assert_eq!(required, 6);
                assert_eq!(capacity, 1);
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn growth_loop_recovers_from_small_initial_guess() {
        // 4 particles x 32 initial pairs each covers 6 pairs easily, so
        // force the issue with the capacity entry point instead.
        let force = triple_force(4, NonbondedMethod::CutoffNonPeriodic, 2.0);
        let pos = tetrahedron();
        let full = evaluate_forces(&force, &AxilrodTeller::new(1.0), &pos, None).unwrap();
        let exact = evaluate_forces_with_capacity(&force, &AxilrodTeller::new(1.0), &pos, None, 6)
            .unwrap();
        assert_eq!(full.group_count, exact.group_count);
        assert_eq!(full.energy, exact.energy);
    }

    #[test]
    fn repeat_invocations_are_bit_identical() {
        let force = triple_force(4, NonbondedMethod::CutoffNonPeriodic, 2.0);
        let pos = tetrahedron();
        let at = AxilrodTeller::new(2.5);
        let first = evaluate_forces(&force, &at, &pos, None).unwrap();
        for _ in 0..5 {
            let again = evaluate_forces(&force, &at, &pos, None).unwrap();
            assert_eq!(first.energy.to_bits(), again.energy.to_bits());
            for (a, b) in first.forces.iter().zip(&again.forces) {
                assert_eq!(a.to_bits(), b.to_bits(), "forces must be bit-identical");
            }
        }
    }

    #[test]
    fn no_cutoff_matches_generous_cutoff() {
        let pos = tetrahedron();
        let at = AxilrodTeller::new(1.0);
        let open = triple_force(4, NonbondedMethod::NoCutoff, 0.0);
        let wide = triple_force(4, NonbondedMethod::CutoffNonPeriodic, 100.0);
        let a = evaluate_forces(&open, &at, &pos, None).unwrap();
        let b = evaluate_forces(&wide, &at, &pos, None).unwrap();
        assert_eq!(a.group_count, b.group_count);
        assert!((a.energy - b.energy).abs() < EXACT_F64);
    }

    #[test]
    fn net_force_vanishes() {
        let force = triple_force(4, NonbondedMethod::CutoffNonPeriodic, 2.0);
        let pos = tetrahedron();
        let result = evaluate_forces(&force, &AxilrodTeller::new(3.0), &pos, None).unwrap();
        for axis in 0..3 {
            let net: f64 = (0..4).map(|i| result.forces[i * 3 + axis]).sum();
            assert!(net.abs() < NEWTON_3RD_LAW_ABS, "net force {net} on axis {axis}");
        }
    }

    #[test]
    fn empty_system_is_quiet() {
        let force = triple_force(0, NonbondedMethod::CutoffNonPeriodic, 2.0);
        let result = evaluate_forces(&force, &AxilrodTeller::new(1.0), &[], None).unwrap();
        assert_eq!(result.pair_count, 0);
        assert_eq!(result.group_count, 0);
        assert_eq!(result.energy, 0.0);
        assert!(result.forces.is_empty());
    }
}

// SPDX-License-Identifier: AGPL-3.0-only

//! Integration tests: staged pipeline end-to-end behavior.
//!
//! These tests exercise the public evaluation API against a brute-force
//! triple enumeration, verifying that tiling, discovery, compaction,
//! assembly, and evaluation compose correctly across module boundaries.

use riptide::interactions::tiling::min_image;
use riptide::potentials::AxilrodTeller;
use riptide::tolerances;
use riptide::{
    evaluate_forces, evaluate_forces_with_capacity, GroupPotential, ManyParticleForce,
    NonbondedMethod, RiptideError,
};

fn triple_force(n: usize, method: NonbondedMethod, cutoff: f64) -> ManyParticleForce {
    let mut force = ManyParticleForce::new(3).expect("group size 3");
    for _ in 0..n {
        force.add_particle(&[1.0], 0);
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

/// Deterministic pseudo-random positions in a cubic box.
fn random_cluster(n: usize, box_side: f64, seed: u64) -> Vec<f64> {
    let mut state = seed;
    let mut pos = Vec::with_capacity(n * 3);
    for _ in 0..n * 3 {
        state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
        pos.push((state >> 33) as f64 / (1u64 << 31) as f64 * box_side);
    }
    pos
}

/// Unstaged reference: enumerate every ascending triple and apply the same
/// cutoff, exclusion, and folding rules the pipeline documents.
fn brute_force_energy(
    positions: &[f64],
    potential: &AxilrodTeller,
    cutoff: Option<f64>,
    bx: Option<[f64; 3]>,
    exclusions: &[(usize, usize)],
) -> (f64, u64, Vec<f64>) {
    let n = positions.len() / 3;
    let pair_ok = |i: usize, j: usize| {
        if exclusions.contains(&(i.min(j), i.max(j))) {
            return false;
        }
        let Some(rc) = cutoff else { return true };
        let delta = min_image(
            [
                positions[i * 3] - positions[j * 3],
                positions[i * 3 + 1] - positions[j * 3 + 1],
                positions[i * 3 + 2] - positions[j * 3 + 2],
            ],
            bx,
        );
        delta.iter().map(|d| d * d).sum::<f64>() < rc * rc
    };

    let mut energy = 0.0;
    let mut groups = 0u64;
    let mut forces = vec![0.0; n * 3];
    for i in 0..n {
        for j in (i + 1)..n {
            for k in (j + 1)..n {
                if !(pair_ok(i, j) && pair_ok(i, k) && pair_ok(j, k)) {
                    continue;
                }
                let anchor = [positions[i * 3], positions[i * 3 + 1], positions[i * 3 + 2]];
                let mut pos = [[0.0; 3]; 3];
                for (slot, &p) in [i, j, k].iter().enumerate() {
                    let delta = min_image(
                        [
                            positions[p * 3] - anchor[0],
                            positions[p * 3 + 1] - anchor[1],
                            positions[p * 3 + 2] - anchor[2],
                        ],
                        bx,
                    );
                    for axis in 0..3 {
                        pos[slot][axis] = anchor[axis] + delta[axis];
                    }
                }
                let mut f = [[0.0; 3]; 3];
                let params: [&[f64]; 3] = [&[], &[], &[]];
                energy += potential.evaluate(&pos, &params, &mut f);
                groups += 1;
                for (slot, &p) in [i, j, k].iter().enumerate() {
                    for axis in 0..3 {
                        forces[p * 3 + axis] += f[slot][axis];
                    }
                }
            }
        }
    }
    (energy, groups, forces)
}

#[test]
fn pipeline_matches_brute_force_nonperiodic() {
    let n = 48;
    let pos = random_cluster(n, 5.0, 7);
    let at = AxilrodTeller::new(0.8);
    let force = triple_force(n, NonbondedMethod::CutoffNonPeriodic, 1.4);

    let result = evaluate_forces(&force, &at, &pos, None).expect("evaluation");
    let (ref_e, ref_groups, ref_f) = brute_force_energy(&pos, &at, Some(1.4), None, &[]);

    assert_eq!(result.group_count, ref_groups);
    assert!(
        ((result.energy - ref_e) / ref_e.abs().max(1e-300)).abs()
            < tolerances::NUMERICAL_GRADIENT_REL,
        "energy {} vs reference {ref_e}",
        result.energy
    );
    for (a, b) in result.forces.iter().zip(&ref_f) {
        assert!((a - b).abs() < tolerances::FORCE_PARITY_ABS, "{a} vs {b}");
    }
}

#[test]
fn pipeline_matches_brute_force_periodic() {
    let n = 40;
    let box_side = 4.0;
    let pos = random_cluster(n, box_side, 13);
    let bx = Some([box_side; 3]);
    let at = AxilrodTeller::new(0.5);
    let force = triple_force(n, NonbondedMethod::CutoffPeriodic, 1.2);

    let result = evaluate_forces(&force, &at, &pos, bx).expect("evaluation");
    let (ref_e, ref_groups, _) = brute_force_energy(&pos, &at, Some(1.2), bx, &[]);

    assert_eq!(result.group_count, ref_groups);
    assert!(
        ((result.energy - ref_e) / ref_e.abs().max(1e-300)).abs()
            < tolerances::NUMERICAL_GRADIENT_REL
    );
}

#[test]
fn exclusions_remove_groups_from_both_paths() {
    let pos = tetrahedron();
    let at = AxilrodTeller::new(1.0);
    let mut force = triple_force(4, NonbondedMethod::CutoffNonPeriodic, 2.0);
    force.add_exclusion(0, 1).expect("in range");
    force.add_exclusion(2, 3).expect("in range");

    let result = evaluate_forces(&force, &at, &pos, None).expect("evaluation");
    let (ref_e, ref_groups, _) =
        brute_force_energy(&pos, &at, Some(2.0), None, &[(0, 1), (2, 3)]);

    // Every triple of the tetrahedron contains (0,1) or (2,3).
    assert_eq!(ref_groups, 0);
    assert_eq!(result.group_count, 0);
    assert!((result.energy - ref_e).abs() < tolerances::EXACT_F64);
}

#[test]
fn bond_derived_exclusions_flow_into_pipeline() {
    let pos = tetrahedron();
    let at = AxilrodTeller::new(1.0);
    let mut force = triple_force(4, NonbondedMethod::CutoffNonPeriodic, 2.0);
    // Single bond 0-1 with bond cutoff 1 excludes exactly that pair.
    force
        .create_exclusions_from_bonds(&[(0, 1)], 1)
        .expect("bonds in range");

    let result = evaluate_forces(&force, &at, &pos, None).expect("evaluation");
    let (_, ref_groups, _) =
        brute_force_energy(&pos, &at, Some(2.0), None, force.exclusions());
    assert_eq!(result.group_count, ref_groups);
    // {0,2,3} and {1,2,3} survive; the other two triples hold the bond.
    assert_eq!(result.group_count, 2);
}

#[test]
fn tight_cutoff_yields_empty_result() {
    let pos = tetrahedron();
    let force = triple_force(4, NonbondedMethod::CutoffNonPeriodic, 0.5);
    let result =
        evaluate_forces(&force, &AxilrodTeller::new(1.0), &pos, None).expect("evaluation");
    assert_eq!(result.pair_count, 0);
    assert_eq!(result.group_count, 0);
    assert_eq!(result.energy, 0.0);
    assert!(result.forces.iter().all(|&f| f == 0.0));
}

#[test]
fn overflow_reports_exact_requirement_and_writes_nothing() {
    let pos = tetrahedron();
    let force = triple_force(4, NonbondedMethod::CutoffNonPeriodic, 2.0);
    let err = evaluate_forces_with_capacity(&force, &AxilrodTeller::new(1.0), &pos, None, 1)
        .expect_err("capacity 1 must overflow");
    match err {
        RiptideError::CapacityExceeded { required, capacity } => {
            assert_eq!(required, 6);
            assert_eq!(capacity, 1);
        }
        other => panic!("unexpected error {other}"),
    }
}

#[test]
fn self_sizing_entry_point_recovers_from_overflow() {
    // Dense cluster under NoCutoff: 70 particles give 2415 pairs, above
    // the initial 32-per-particle guess, so the growth loop must fire.
    let n = 70;
    let pos = random_cluster(n, 4.0, 3);
    let at = AxilrodTeller::new(0.2);
    let force = triple_force(n, NonbondedMethod::NoCutoff, 0.0);

    let auto = evaluate_forces(&force, &at, &pos, None).expect("self-sizing run");
    let exact =
        evaluate_forces_with_capacity(&force, &at, &pos, None, n * (n - 1) / 2).expect("exact");
    assert_eq!(auto.pair_count, n * (n - 1) / 2);
    assert_eq!(auto.group_count, exact.group_count);
    assert_eq!(auto.energy.to_bits(), exact.energy.to_bits());
}

#[test]
fn repeat_runs_are_bit_identical() {
    let n = 32;
    let pos = random_cluster(n, 4.0, 21);
    let at = AxilrodTeller::new(1.5);
    let force = triple_force(n, NonbondedMethod::CutoffNonPeriodic, 1.5);

    let first = evaluate_forces(&force, &at, &pos, None).expect("first run");
    for _ in 0..3 {
        let again = evaluate_forces(&force, &at, &pos, None).expect("repeat run");
        assert_eq!(first.energy.to_bits(), again.energy.to_bits());
        for (a, b) in first.forces.iter().zip(&again.forces) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }
}

#[test]
fn no_cutoff_equals_generous_cutoff() {
    let n = 16;
    let pos = random_cluster(n, 3.0, 5);
    let at = AxilrodTeller::new(1.0);
    let open = triple_force(n, NonbondedMethod::NoCutoff, 0.0);
    let wide = triple_force(n, NonbondedMethod::CutoffNonPeriodic, 1e6);

    let a = evaluate_forces(&open, &at, &pos, None).expect("no cutoff");
    let b = evaluate_forces(&wide, &at, &pos, None).expect("wide cutoff");
    assert_eq!(a.pair_count, b.pair_count);
    assert_eq!(a.group_count, b.group_count);
    assert!((a.energy - b.energy).abs() < tolerances::EXACT_F64);
}

#[test]
fn small_periodic_box_rejected_before_any_work() {
    let force = triple_force(4, NonbondedMethod::CutoffPeriodic, 2.0);
    let err = evaluate_forces(
        &force,
        &AxilrodTeller::new(1.0),
        &tetrahedron(),
        Some([3.9, 10.0, 10.0]),
    )
    .expect_err("box side below 2 x cutoff");
    assert!(matches!(err, RiptideError::GeometryViolation(_)));
}

#[test]
fn type_filters_select_admissible_groups() {
    let pos = tetrahedron();
    let at = AxilrodTeller::new(1.0);
    let mut force = ManyParticleForce::new(3).expect("group size 3");
    for t in [0, 0, 1, 1] {
        force.add_particle(&[1.0], t);
    }
    force.set_method(NonbondedMethod::CutoffNonPeriodic);
    force.set_cutoff(2.0);
    force
        .set_type_filter(0, [0].into_iter().collect())
        .expect("role 0");
    force
        .set_type_filter(1, [0].into_iter().collect())
        .expect("role 1");
    force
        .set_type_filter(2, [1].into_iter().collect())
        .expect("role 2");

    let result = evaluate_forces(&force, &at, &pos, None).expect("filtered run");
    // Admissible triples need two type-0 particles and one type-1:
    // {0,1,2} and {0,1,3} only.
    assert_eq!(result.group_count, 2);

    // Filters only prune; relaxing them back to empty restores all triples.
    let unfiltered = triple_force(4, NonbondedMethod::CutoffNonPeriodic, 2.0);
    let full = evaluate_forces(&unfiltered, &at, &pos, None).expect("unfiltered run");
    assert_eq!(full.group_count, 4);
    assert!(result.group_count < full.group_count);
}

#[test]
fn net_force_vanishes_on_random_cluster() {
    let n = 30;
    let pos = random_cluster(n, 3.0, 11);
    let force = triple_force(n, NonbondedMethod::CutoffNonPeriodic, 1.5);
    let result =
        evaluate_forces(&force, &AxilrodTeller::new(2.0), &pos, None).expect("evaluation");
    for axis in 0..3 {
        let net: f64 = result.forces.iter().skip(axis).step_by(3).sum();
        assert!(
            net.abs() < tolerances::NEWTON_3RD_LAW_ABS,
            "net force {net} on axis {axis}"
        );
    }
}

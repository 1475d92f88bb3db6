// SPDX-License-Identifier: AGPL-3.0-only

//! Many-Particle Interaction Pipeline Validation
//!
//! Validates the staged pipeline (tiling → discovery → scan → scatter →
//! evaluation) against a brute-force triple enumeration computed in plain
//! f64:
//!   - Group counts under cutoff, exclusion, and type-filter semantics
//!   - Force and energy parity with the unstaged reference
//!   - Newton's third law on the summed forces
//!   - Bit-identical repeatability of the fixed-point accumulation
//!   - Optional GPU parity when an f64-capable adapter is present
//!
//! **Provenance**: expected values are analytical (Axilrod-Teller on an
//! equilateral triangle gives U = 11C/(8 r⁹)) or the brute-force reference
//! itself; no external baselines.

use riptide::force::{GroupPotential, ManyParticleForce, NonbondedMethod};
use riptide::interactions::tiling::min_image;
use riptide::interactions::{evaluate_forces, evaluate_forces_with_capacity};
use riptide::potentials::AxilrodTeller;
use riptide::tolerances;
use riptide::validation::ValidationHarness;
use riptide::RiptideError;

// ═══════════════════════════════════════════════════════════════════
// Brute-Force Reference (f64, unstaged)
// ═══════════════════════════════════════════════════════════════════

struct Reference {
    forces: Vec<f64>,
    energy: f64,
    group_count: u64,
}

/// Enumerate every ascending triple, apply cutoff and exclusion tests to
/// all three pairs, fold into the first member's periodic image, and sum
/// energies and forces in plain f64.
fn brute_force_triples(
    positions: &[f64],
    potential: &AxilrodTeller,
    cutoff: Option<f64>,
    bx: Option<[f64; 3]>,
    exclusions: &[(usize, usize)],
) -> Reference {
    let n = positions.len() / 3;
    let excluded = |i: usize, j: usize| {
        exclusions
            .iter()
            .any(|&(a, b)| (a, b) == (i.min(j), i.max(j)))
    };
    let pair_ok = |i: usize, j: usize| {
        if excluded(i, j) {
            return false;
        }
        match cutoff {
            None => true,
            Some(rc) => {
                let mut d_sq = 0.0;
                let delta = min_image(
                    [
                        positions[i * 3] - positions[j * 3],
                        positions[i * 3 + 1] - positions[j * 3 + 1],
                        positions[i * 3 + 2] - positions[j * 3 + 2],
                    ],
                    bx,
                );
                for d in delta {
                    d_sq += d * d;
                }
                d_sq < rc * rc
            }
        }
    };

    let mut forces = vec![0.0f64; n * 3];
    let mut energy = 0.0;
    let mut group_count = 0u64;
    for i in 0..n {
        for j in (i + 1)..n {
            for k in (j + 1)..n {
                if !(pair_ok(i, j) && pair_ok(i, k) && pair_ok(j, k)) {
                    continue;
                }
                let anchor = [positions[i * 3], positions[i * 3 + 1], positions[i * 3 + 2]];
                let mut pos = [[0.0f64; 3]; 3];
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
                let mut f = [[0.0f64; 3]; 3];
                let params: [&[f64]; 3] = [&[], &[], &[]];
                energy += potential.evaluate(&pos, &params, &mut f);
                group_count += 1;
                for (slot, &p) in [i, j, k].iter().enumerate() {
                    for axis in 0..3 {
                        forces[p * 3 + axis] += f[slot][axis];
                    }
                }
            }
        }
    }
    Reference {
        forces,
        energy,
        group_count,
    }
}

fn tetrahedron() -> Vec<f64> {
    vec![
        0.0, 0.0, 0.0, //
        1.0, 0.0, 0.0, //
        0.5, 0.866, 0.0, //
        0.5, 0.289, 0.816,
    ]
}

fn random_cluster(n: usize, box_side: f64) -> Vec<f64> {
    let mut pos = Vec::with_capacity(n * 3);
    let mut seed = 2026u64;
    for _ in 0..n {
        for _ in 0..3 {
            seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            pos.push((seed >> 33) as f64 / (1u64 << 31) as f64 * box_side);
        }
    }
    pos
}

fn triple_force(n: usize, method: NonbondedMethod, cutoff: f64) -> ManyParticleForce {
    let mut force = ManyParticleForce::new(3).expect("group size 3 is supported");
    for _ in 0..n {
        force.add_particle(&[1.0], 0);
    }
    force.set_method(method);
    force.set_cutoff(cutoff);
    force
}

fn check_force_parity(
    harness: &mut ValidationHarness,
    label: &str,
    observed: &[f64],
    expected: &[f64],
) {
    let mut max_err = 0.0f64;
    for (a, b) in observed.iter().zip(expected) {
        max_err = max_err.max((a - b).abs());
    }
    harness.check_upper(
        &format!("{label}: max |F_pipeline - F_reference|"),
        max_err,
        tolerances::FORCE_PARITY_ABS,
    );
}

fn check_newton(harness: &mut ValidationHarness, label: &str, forces: &[f64]) {
    for axis in 0..3 {
        let net: f64 = forces.iter().skip(axis).step_by(3).sum();
        harness.check_abs(
            &format!("{label}: net force axis {axis}"),
            net,
            0.0,
            tolerances::NEWTON_3RD_LAW_ABS,
        );
    }
}

// ═══════════════════════════════════════════════════════════════════
// CPU Scenarios
// ═══════════════════════════════════════════════════════════════════

fn validate_tetrahedron(harness: &mut ValidationHarness) {
    let pos = tetrahedron();
    let at = AxilrodTeller::new(1.0);
    let force = triple_force(4, NonbondedMethod::CutoffNonPeriodic, 2.0);
    let result = evaluate_forces(&force, &at, &pos, None).expect("tetrahedron evaluation");
    let reference = brute_force_triples(&pos, &at, Some(2.0), None, &[]);

    println!("  tetrahedron: {} pairs, {} groups, E = {:.9}",
        result.pair_count, result.group_count, result.energy);

    harness.check_abs("tetrahedron: pair count", result.pair_count as f64, 6.0, 0.5);
    harness.check_abs(
        "tetrahedron: group count",
        result.group_count as f64,
        reference.group_count as f64,
        0.5,
    );
    harness.check_rel(
        "tetrahedron: energy vs reference",
        result.energy,
        reference.energy,
        tolerances::NUMERICAL_GRADIENT_REL,
    );
    check_force_parity(harness, "tetrahedron", &result.forces, &reference.forces);
    check_newton(harness, "tetrahedron", &result.forces);

    // Equilateral sub-triangle (0,1,2) of side 1: U = 11C/8. The full
    // tetrahedron energy must exceed that single-triple value.
    harness.check_lower("tetrahedron: energy above one triple", result.energy, 11.0 / 8.0);
}

fn validate_exclusions(harness: &mut ValidationHarness) {
    let pos = tetrahedron();
    let at = AxilrodTeller::new(1.0);
    let mut force = triple_force(4, NonbondedMethod::CutoffNonPeriodic, 2.0);
    force.add_exclusion(0, 1).expect("exclusion in range");
    let result = evaluate_forces(&force, &at, &pos, None).expect("excluded evaluation");
    let reference = brute_force_triples(&pos, &at, Some(2.0), None, &[(0, 1)]);

    harness.check_abs("exclusion: group count", result.group_count as f64, 2.0, 0.5);
    harness.check_rel(
        "exclusion: energy vs reference",
        result.energy,
        reference.energy,
        tolerances::NUMERICAL_GRADIENT_REL,
    );
    check_force_parity(harness, "exclusion", &result.forces, &reference.forces);
}

fn validate_tight_cutoff(harness: &mut ValidationHarness) {
    let pos = tetrahedron();
    let at = AxilrodTeller::new(1.0);
    let force = triple_force(4, NonbondedMethod::CutoffNonPeriodic, 0.5);
    let result = evaluate_forces(&force, &at, &pos, None).expect("tight-cutoff evaluation");

    harness.check_abs("tight cutoff: group count", result.group_count as f64, 0.0, 0.5);
    harness.check_abs("tight cutoff: energy", result.energy, 0.0, tolerances::EXACT_F64);
    let max_f = result.forces.iter().fold(0.0f64, |m, &f| m.max(f.abs()));
    harness.check_abs("tight cutoff: forces", max_f, 0.0, tolerances::EXACT_F64);
}

fn validate_periodic_cluster(harness: &mut ValidationHarness) {
    let n = 64;
    let box_side = 6.0;
    let pos = random_cluster(n, box_side);
    let bx = Some([box_side; 3]);
    let at = AxilrodTeller::new(0.5);
    let force = triple_force(n, NonbondedMethod::CutoffPeriodic, 1.5);

    let result = evaluate_forces(&force, &at, &pos, bx).expect("periodic evaluation");
    let reference = brute_force_triples(&pos, &at, Some(1.5), bx, &[]);

    println!(
        "  periodic cluster: N = {n}, {} pairs, {} groups",
        result.pair_count, result.group_count
    );
    harness.check_abs(
        "periodic: group count",
        result.group_count as f64,
        reference.group_count as f64,
        0.5,
    );
    harness.check_rel(
        "periodic: energy vs reference",
        result.energy,
        reference.energy,
        tolerances::NUMERICAL_GRADIENT_REL,
    );
    check_force_parity(harness, "periodic", &result.forces, &reference.forces);
    check_newton(harness, "periodic", &result.forces);

    // Fixed-point accumulation is bit-identical across repeats.
    let again = evaluate_forces(&force, &at, &pos, bx).expect("repeat evaluation");
    let identical = result.energy.to_bits() == again.energy.to_bits()
        && result
            .forces
            .iter()
            .zip(&again.forces)
            .all(|(a, b)| a.to_bits() == b.to_bits());
    harness.check_bool("periodic: repeat run bit-identical", identical);
}

fn validate_overflow(harness: &mut ValidationHarness) {
    let pos = tetrahedron();
    let at = AxilrodTeller::new(1.0);
    let force = triple_force(4, NonbondedMethod::CutoffNonPeriodic, 2.0);
    let err = evaluate_forces_with_capacity(&force, &at, &pos, None, 1);
    let reported = matches!(
        err,
        Err(RiptideError::CapacityExceeded {
            required: 6,
            capacity: 1
        })
    );
    harness.check_bool("overflow: exact requirement reported", reported);
}

fn validate_type_filters(harness: &mut ValidationHarness) {
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

    let result = evaluate_forces(&force, &at, &pos, None).expect("filtered evaluation");
    // Only {0,1,2} and {0,1,3} carry two type-0 particles and one type-1.
    harness.check_abs("type filter: group count", result.group_count as f64, 2.0, 0.5);
}

// ═══════════════════════════════════════════════════════════════════
// GPU Parity (skipped without an f64 adapter)
// ═══════════════════════════════════════════════════════════════════

async fn validate_gpu(harness: &mut ValidationHarness) {
    use riptide::gpu::GpuF64;
    use riptide::interactions::gpu::GpuInteractionPipeline;
    use riptide::interactions::shaders;

    let gpu = match GpuF64::new().await {
        Ok(gpu) => gpu,
        Err(e) => {
            println!("  GPU parity skipped: {e}");
            return;
        }
    };
    gpu.print_info();

    let pos = tetrahedron();
    let at = AxilrodTeller::new(1.0);
    let force = triple_force(4, NonbondedMethod::CutoffNonPeriodic, 2.0);
    let cpu = evaluate_forces(&force, &at, &pos, None).expect("CPU evaluation");

    let pipeline = match GpuInteractionPipeline::new(
        &gpu,
        &force,
        shaders::AXILROD_TELLER_WGSL,
        64,
        None,
    ) {
        Ok(p) => p,
        Err(e) => {
            println!("  GPU parity skipped (pipeline setup): {e}");
            return;
        }
    };
    match pipeline.execute(&gpu, &pos) {
        Ok(result) => {
            harness.check_abs(
                "gpu: group count",
                result.group_count as f64,
                cpu.group_count as f64,
                0.5,
            );
            harness.check_abs(
                "gpu: energy parity",
                result.energy,
                cpu.energy,
                tolerances::GPU_VS_CPU_F64,
            );
            let mut max_err = 0.0f64;
            for (a, b) in result.forces.iter().zip(&cpu.forces) {
                max_err = max_err.max((a - b).abs());
            }
            harness.check_upper("gpu: max force error", max_err, tolerances::GPU_VS_CPU_F64);
        }
        Err(e) => {
            println!("  GPU parity skipped (execute): {e}");
        }
    }
}

// ═══════════════════════════════════════════════════════════════════
// Main
// ═══════════════════════════════════════════════════════════════════

#[tokio::main]
async fn main() {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║  Many-Particle Interaction Pipeline Validation               ║");
    println!("║  Staged pipeline vs. brute-force f64 reference               ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    let mut harness = ValidationHarness::new("interaction_pipeline");

    println!("── Tetrahedron (Axilrod-Teller, cutoff 2.0) ───────────────");
    validate_tetrahedron(&mut harness);

    println!("── Exclusion Semantics ────────────────────────────────────");
    validate_exclusions(&mut harness);

    println!("── Tight Cutoff ───────────────────────────────────────────");
    validate_tight_cutoff(&mut harness);

    println!("── Periodic Random Cluster (N = 64) ───────────────────────");
    validate_periodic_cluster(&mut harness);

    println!("── Capacity Overflow ──────────────────────────────────────");
    validate_overflow(&mut harness);

    println!("── Type Filters ───────────────────────────────────────────");
    validate_type_filters(&mut harness);

    println!("── GPU Parity ─────────────────────────────────────────────");
    validate_gpu(&mut harness).await;

    match serde_json::to_string(&harness) {
        Ok(json) => println!("{json}"),
        Err(e) => println!("summary serialization failed: {e}"),
    }

    harness.finish();
}

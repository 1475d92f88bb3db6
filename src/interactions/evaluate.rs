// SPDX-License-Identifier: AGPL-3.0-only

//! Combinatorial group evaluation.
//!
//! One worker per anchor particle. The anchor's forward-neighbor segment is
//! the candidate pool; each group is the anchor plus one k-combination of
//! the pool, decoded by rank so no group is ever visited twice. Pairs that
//! include the anchor were validated at discovery; the remaining member
//! pairs are checked here for cutoff and exclusion. Surviving groups get a
//! role assignment (identity when no type filters are set, otherwise the
//! lexicographically first permutation the filters admit), positions folded
//! into the anchor's periodic image, and one potential call whose forces
//! land in the shared fixed-point accumulator.
//!
//! Per-anchor energies are reduced sequentially in anchor order, so the
//! total energy is deterministic even though anchors run in parallel.

use crate::force::{GroupPotential, ManyParticleForce};
use crate::interactions::combinations::{binomial, next_permutation, unrank_combination};
use crate::interactions::exclusions::ExclusionSet;
use crate::interactions::forcebuf::FixedPointForceBuffer;
use crate::interactions::tiling::{dist_sq, min_image};
use crate::tolerances::MAX_GROUP_SIZE;
use rayon::prelude::*;
use std::collections::BTreeSet;

/// Lexicographically first role permutation the type filters admit for
/// `group`, written to `perm[..g]`. Returns false when no assignment is
/// valid. The identity fast path covers the no-filter case.
fn assign_roles(
    group: &[usize],
    types: &[i32],
    filters: &[BTreeSet<i32>],
    perm: &mut [usize],
) -> bool {
    let g = group.len();
    for (r, slot) in perm.iter_mut().take(g).enumerate() {
        *slot = r;
    }
    if filters.iter().all(BTreeSet::is_empty) {
        return true;
    }
    loop {
        let valid = (0..g).all(|role| {
            filters[role].is_empty() || filters[role].contains(&types[group[perm[role]]])
        });
        if valid {
            return true;
        }
        if !next_permutation(&mut perm[..g]) {
            return false;
        }
    }
}

/// Evaluate every valid group reachable from the neighbor lists.
///
/// Returns the summed energy and the number of groups the potential was
/// invoked on. Forces accumulate into `force_buffer`.
#[allow(clippy::too_many_arguments)]
pub fn evaluate_groups(
    positions: &[f64],
    force: &ManyParticleForce,
    potential: &dyn GroupPotential,
    neighbors: &[u32],
    offsets: &[u32],
    cutoff: Option<f64>,
    box_vectors: Option<[f64; 3]>,
    exclusions: &ExclusionSet,
    force_buffer: &FixedPointForceBuffer,
) -> (f64, u64) {
    let n = offsets.len() - 1;
    let g = force.group_size();
    let k = g - 1;
    let types = force.particle_types();
    let filters = force.type_filters();
    let cutoff_sq = cutoff.map(|rc| rc * rc);

    let per_anchor: Vec<(f64, u64)> = (0..n)
        .into_par_iter()
        .map(|anchor| {
            let pool = &neighbors[offsets[anchor] as usize..offsets[anchor + 1] as usize];
            if pool.len() < k {
                return (0.0, 0);
            }

            let anchor_pos = [
                positions[anchor * 3],
                positions[anchor * 3 + 1],
                positions[anchor * 3 + 2],
            ];
            let mut chosen = [0u32; MAX_GROUP_SIZE];
            let mut group = [0usize; MAX_GROUP_SIZE];
            let mut perm = [0usize; MAX_GROUP_SIZE];
            let mut role_pos = [[0.0f64; 3]; MAX_GROUP_SIZE];
            let mut role_forces = [[0.0f64; 3]; MAX_GROUP_SIZE];

            let mut energy = 0.0;
            let mut evaluated = 0u64;

            let n_combos = binomial(pool.len() as u64, k as u64);
            'combos: for rank in 0..n_combos {
                unrank_combination(rank, pool.len() as u32, k as u32, &mut chosen[..k]);
                group[0] = anchor;
                for (slot, &c) in chosen[..k].iter().enumerate() {
                    group[slot + 1] = pool[c as usize] as usize;
                }
                // Pool indices all exceed the anchor; sorting the members
                // keeps the whole tuple ascending.
                group[1..g].sort_unstable();

                // Anchor pairs passed discovery. Member pairs still need
                // the cutoff and exclusion tests.
                for a in 1..g {
                    for b in (a + 1)..g {
                        if let Some(rc_sq) = cutoff_sq {
                            if dist_sq(positions, group[a], group[b], box_vectors) >= rc_sq {
                                continue 'combos;
                            }
                        }
                        if exclusions.contains(group[a], group[b]) {
                            continue 'combos;
                        }
                    }
                }

                if !assign_roles(&group[..g], &types, filters, &mut perm[..g]) {
                    continue;
                }

                for role in 0..g {
                    let p = group[perm[role]];
                    let delta = min_image(
                        [
                            positions[p * 3] - anchor_pos[0],
                            positions[p * 3 + 1] - anchor_pos[1],
                            positions[p * 3 + 2] - anchor_pos[2],
                        ],
                        box_vectors,
                    );
                    for axis in 0..3 {
                        role_pos[role][axis] = anchor_pos[axis] + delta[axis];
                        role_forces[role][axis] = 0.0;
                    }
                }

                let mut params = [&[] as &[f64]; MAX_GROUP_SIZE];
                for role in 0..g {
                    params[role] = force.particle_parameters(group[perm[role]]);
                }

                energy += potential.evaluate(
                    &role_pos[..g],
                    &params[..g],
                    &mut role_forces[..g],
                );
                evaluated += 1;

                for role in 0..g {
                    force_buffer.add(group[perm[role]], role_forces[role]);
                }
            }

            (energy, evaluated)
        })
        .collect();

    let mut energy = 0.0;
    let mut groups = 0u64;
    for (e, c) in per_anchor {
        energy += e;
        groups += c;
    }
    (energy, groups)
}

// SPDX-License-Identifier: AGPL-3.0-only

//! Many-particle force configuration.
//!
//! [`ManyParticleForce`] holds the long-lived configuration state of one
//! N-particle interaction: group size, nonbonded method and cutoff,
//! per-particle parameters and integer types, excluded pairs, and per-role
//! type filters. It is immutable during an invocation of the pipeline;
//! only positions change step to step.
//!
//! The interaction itself is supplied through [`GroupPotential`] — the
//! pipeline calls it exactly once per valid group.

use crate::error::RiptideError;
use crate::tolerances::MAX_GROUP_SIZE;
use std::collections::{BTreeSet, VecDeque};

/// How nonbonded interactions are bounded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NonbondedMethod {
    /// No cutoff: every set of N particles is evaluated. Forces a true
    /// O(N^2) pair scan; periodic boundaries cannot be used.
    NoCutoff,
    /// Sets containing any pair beyond the cutoff are omitted.
    CutoffNonPeriodic,
    /// Minimum-image periodic boundaries; sets containing any pair beyond
    /// the cutoff are omitted.
    CutoffPeriodic,
}

#[derive(Clone, Debug)]
struct ParticleInfo {
    parameters: Vec<f64>,
    type_id: i32,
}

/// Configuration for one N-particle interaction.
#[derive(Clone, Debug)]
#[must_use]
pub struct ManyParticleForce {
    group_size: usize,
    method: NonbondedMethod,
    cutoff: f64,
    particles: Vec<ParticleInfo>,
    exclusions: Vec<(usize, usize)>,
    type_filters: Vec<BTreeSet<i32>>,
}

impl ManyParticleForce {
    /// Create a force evaluating groups of `group_size` particles.
    ///
    /// Defaults: `NoCutoff`, no exclusions, all type filters empty
    /// (unconstrained).
    ///
    /// # Errors
    ///
    /// Returns [`RiptideError::Configuration`] for `group_size` of 0, 1,
    /// or above [`MAX_GROUP_SIZE`].
    pub fn new(group_size: usize) -> Result<Self, RiptideError> {
        if !(2..=MAX_GROUP_SIZE).contains(&group_size) {
            return Err(RiptideError::Configuration(format!(
                "group size {group_size} outside supported range 2..={MAX_GROUP_SIZE}"
            )));
        }
        Ok(Self {
            group_size,
            method: NonbondedMethod::NoCutoff,
            cutoff: 0.0,
            particles: Vec::new(),
            exclusions: Vec::new(),
            type_filters: vec![BTreeSet::new(); group_size],
        })
    }

    /// Number of particles in each evaluated group.
    #[must_use]
    pub const fn group_size(&self) -> usize {
        self.group_size
    }

    /// Number of configured particles.
    #[must_use]
    pub fn num_particles(&self) -> usize {
        self.particles.len()
    }

    /// Nonbonded method in use.
    #[must_use]
    pub const fn method(&self) -> NonbondedMethod {
        self.method
    }

    pub fn set_method(&mut self, method: NonbondedMethod) {
        self.method = method;
    }

    /// Cutoff distance. Ignored under [`NonbondedMethod::NoCutoff`].
    #[must_use]
    pub const fn cutoff(&self) -> f64 {
        self.cutoff
    }

    pub fn set_cutoff(&mut self, cutoff: f64) {
        self.cutoff = cutoff;
    }

    /// Add a particle with its per-particle parameters and type tag.
    /// Returns the particle's index.
    pub fn add_particle(&mut self, parameters: &[f64], type_id: i32) -> usize {
        self.particles.push(ParticleInfo {
            parameters: parameters.to_vec(),
            type_id,
        });
        self.particles.len() - 1
    }

    /// Per-particle parameter slice.
    #[must_use]
    pub fn particle_parameters(&self, index: usize) -> &[f64] {
        &self.particles[index].parameters
    }

    /// Integer type tags for all particles, in index order.
    #[must_use]
    pub fn particle_types(&self) -> Vec<i32> {
        self.particles.iter().map(|p| p.type_id).collect()
    }

    /// Exclude the pair (i, j): every group containing both is omitted.
    ///
    /// # Errors
    ///
    /// Returns [`RiptideError::Configuration`] if the indices are equal or
    /// out of range.
    pub fn add_exclusion(&mut self, i: usize, j: usize) -> Result<(), RiptideError> {
        if i == j {
            return Err(RiptideError::Configuration(format!(
                "cannot exclude particle {i} from itself"
            )));
        }
        let n = self.particles.len();
        if i >= n || j >= n {
            return Err(RiptideError::Configuration(format!(
                "exclusion ({i}, {j}) out of range for {n} particles"
            )));
        }
        let pair = (i.min(j), i.max(j));
        if !self.exclusions.contains(&pair) {
            self.exclusions.push(pair);
        }
        Ok(())
    }

    /// Excluded pairs, normalized so the smaller index is first.
    #[must_use]
    pub fn exclusions(&self) -> &[(usize, usize)] {
        &self.exclusions
    }

    /// Exclude every pair of particles separated by `bond_cutoff` bonds or
    /// fewer in the given bond graph.
    ///
    /// Breadth-first walk from each particle; a particle never excludes
    /// itself.
    ///
    /// # Errors
    ///
    /// Returns [`RiptideError::Configuration`] if any bond index is out of
    /// range.
    pub fn create_exclusions_from_bonds(
        &mut self,
        bonds: &[(usize, usize)],
        bond_cutoff: usize,
    ) -> Result<(), RiptideError> {
        let n = self.particles.len();
        let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); n];
        for &(a, b) in bonds {
            if a >= n || b >= n {
                return Err(RiptideError::Configuration(format!(
                    "bond ({a}, {b}) out of range for {n} particles"
                )));
            }
            adjacency[a].push(b);
            adjacency[b].push(a);
        }

        for start in 0..n {
            let mut depth = vec![usize::MAX; n];
            depth[start] = 0;
            let mut queue = VecDeque::from([start]);
            while let Some(p) = queue.pop_front() {
                if depth[p] == bond_cutoff {
                    continue;
                }
                for &q in &adjacency[p] {
                    if depth[q] == usize::MAX {
                        depth[q] = depth[p] + 1;
                        queue.push_back(q);
                        if q > start {
                            self.add_exclusion(start, q)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Restrict role `role` (0..group_size) to the given particle types.
    /// An empty set removes the constraint.
    ///
    /// # Errors
    ///
    /// Returns [`RiptideError::Configuration`] if `role` is out of range.
    pub fn set_type_filter(&mut self, role: usize, types: BTreeSet<i32>) -> Result<(), RiptideError> {
        if role >= self.group_size {
            return Err(RiptideError::Configuration(format!(
                "type filter role {role} out of range for group size {}",
                self.group_size
            )));
        }
        self.type_filters[role] = types;
        Ok(())
    }

    /// Per-role allowed type sets; empty set = unconstrained.
    #[must_use]
    pub fn type_filters(&self) -> &[BTreeSet<i32>] {
        &self.type_filters
    }

    /// Whether any role carries a non-empty type filter.
    #[must_use]
    pub fn has_type_filters(&self) -> bool {
        self.type_filters.iter().any(|f| !f.is_empty())
    }
}

/// One N-particle interaction expression.
///
/// The pipeline invokes `evaluate` exactly once per valid group, with role
/// positions already folded into the anchor particle's periodic image.
///
/// # Symmetry precondition
///
/// The expression must be symmetric under relabeling of the roles, except
/// where type filters break that symmetry. When filters admit more than one
/// role assignment for a group, only one deterministic assignment is
/// evaluated; if the expression is not symmetric across the admissible
/// assignments the result is implementation-defined.
pub trait GroupPotential: Sync {
    /// Number of roles the expression binds. Must match the force's group
    /// size.
    fn group_size(&self) -> usize;

    /// Compute the group's energy and write the force on each role into
    /// `forces` (same length and order as `positions`). `parameters[r]` is
    /// the per-particle parameter slice of the particle bound to role `r`.
    fn evaluate(
        &self,
        positions: &[[f64; 3]],
        parameters: &[&[f64]],
        forces: &mut [[f64; 3]],
    ) -> f64;
}

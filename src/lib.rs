// SPDX-License-Identifier: AGPL-3.0-only

//! riptide — staged many-particle interaction pipeline.
//!
//! Evaluates N-particle interaction potentials (three-body dispersion and
//! the like) over large particle sets without materializing the O(N^G)
//! tuple space: spatial tiling with bounding-box pruning, parallel pair
//! discovery, prefix-sum compaction into segmented neighbor lists, and
//! combinatorial group enumeration with exclusion and type-filter
//! semantics. Forces accumulate in fixed point, so repeated invocations
//! on the same snapshot are bit-identical.
//!
//! ## Active modules
//!   - `force` — interaction configuration and the `GroupPotential` trait
//!   - `interactions` — the five-stage CPU pipeline and its GPU twin
//!   - `potentials` — concrete potentials (Axilrod-Teller-Muto)
//!   - `gpu` — wgpu `SHADER_F64` device plumbing
//!   - `tolerances` — tuning constants and validation tolerances
//!
//! ## Validation binaries
//!   - `validate_interactions` — pipeline vs brute-force reference,
//!     Newton's third law, exclusion and cutoff semantics, optional GPU
//!     parity when an f64-capable adapter is present

pub mod error;
pub mod force;
pub mod gpu;
pub mod interactions;
pub mod potentials;
pub mod tolerances;
pub mod validation;

pub use error::RiptideError;
pub use force::{GroupPotential, ManyParticleForce, NonbondedMethod};
pub use interactions::{evaluate_forces, evaluate_forces_with_capacity, EvaluationResult};

// SPDX-License-Identifier: AGPL-3.0-only

//! Typed errors for riptide GPU and interaction-pipeline operations.
//!
//! A single enum so callers can pattern-match on failure modes (neighbor
//! buffer overflow, bad periodic geometry, missing GPU features) rather
//! than parsing opaque strings.

use std::fmt;

/// Errors arising from interaction evaluation or GPU initialization.
#[derive(Debug)]
pub enum RiptideError {
    /// The neighbor pair buffer was too small for the actual pair count.
    ///
    /// Recoverable: reallocate with at least `required` slots and re-run
    /// discovery + assembly for the same step. No force state has been
    /// written when this is returned.
    CapacityExceeded {
        /// Exact pair count observed by discovery.
        required: usize,
        /// Capacity the buffer was allocated with.
        capacity: usize,
    },

    /// Periodic box geometry incompatible with the minimum-image convention
    /// (a box side smaller than twice the cutoff). Fatal for the step.
    GeometryViolation(String),

    /// Inconsistent force configuration (particle count mismatch, filter
    /// role out of range, cutoff missing for a cutoff method, ...).
    Configuration(String),

    /// No compatible GPU adapter was found by wgpu.
    NoAdapter,

    /// GPU device creation failed (wraps the underlying wgpu error message).
    DeviceCreation(String),

    /// GPU lacks the `SHADER_F64` feature required for f64 compute.
    NoShaderF64,

    /// A GPU compute pass or readback failed.
    GpuCompute(String),
}

impl fmt::Display for RiptideError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapacityExceeded { required, capacity } => write!(
                f,
                "Neighbor buffer overflow: {required} pairs found, capacity {capacity}"
            ),
            Self::GeometryViolation(msg) => write!(f, "Periodic geometry violation: {msg}"),
            Self::Configuration(msg) => write!(f, "Invalid force configuration: {msg}"),
            Self::NoAdapter => write!(f, "No GPU adapter found"),
            Self::DeviceCreation(e) => write!(f, "Failed to create GPU device: {e}"),
            Self::NoShaderF64 => {
                write!(
                    f,
                    "GPU does not support SHADER_F64 — cannot run f64 computation"
                )
            }
            Self::GpuCompute(msg) => write!(f, "GPU compute failed: {msg}"),
        }
    }
}

impl std::error::Error for RiptideError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_capacity_exceeded() {
        let err = RiptideError::CapacityExceeded {
            required: 3,
            capacity: 1,
        };
        assert_eq!(
            err.to_string(),
            "Neighbor buffer overflow: 3 pairs found, capacity 1"
        );
    }

    #[test]
    fn display_geometry_violation() {
        let err = RiptideError::GeometryViolation("box side 1.0 < 2 x cutoff 0.8".into());
        assert!(err.to_string().contains("box side 1.0"));
    }

    #[test]
    fn display_no_shader_f64() {
        let err = RiptideError::NoShaderF64;
        assert!(err.to_string().contains("SHADER_F64"));
    }

    #[test]
    fn error_trait_works() {
        let err = RiptideError::NoAdapter;
        let dyn_err: &dyn std::error::Error = &err;
        assert_eq!(dyn_err.to_string(), "No GPU adapter found");
    }
}

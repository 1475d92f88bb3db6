// SPDX-License-Identifier: AGPL-3.0-only

//! WGSL shader sources for the GPU interaction pipeline.
//!
//! All stage kernels are f64 and rely on native WGSL builtins behind
//! `SHADER_F64`; they compile via [`crate::gpu::GpuF64::create_pipeline`].
//! The evaluation kernel is a template: the interaction expression is
//! spliced in with [`splice_potential`] before compilation, so one staged
//! pipeline serves any [`crate::force::GroupPotential`] that can state its
//! energy and forces in WGSL.

// ═══════════════════════════════════════════════════════════════════
// Tile Bounding Boxes (f64)
// ═══════════════════════════════════════════════════════════════════
//
// One thread per tile. Periodic folding relative to the running box
// center keeps tiles straddling a box face tight.

pub const SHADER_TILE_BOUNDS: &str = include_str!("shaders/tile_bounds_f64.wgsl");

// ═══════════════════════════════════════════════════════════════════
// Pair Discovery (f64)
// ═══════════════════════════════════════════════════════════════════
//
// One thread per particle; box-pruned tile scan, batched atomic
// reservation into the shared pair buffer. The cursor counts past
// capacity so the host learns the exact requirement on overflow.

pub const SHADER_PAIR_DISCOVERY: &str = include_str!("shaders/pair_discovery_f64.wgsl");

// ═══════════════════════════════════════════════════════════════════
// Prefix Sum (u32)
// ═══════════════════════════════════════════════════════════════════
//
// Single-workgroup windowed inclusive scan with a running carry,
// producing the exclusive offset table (with total sentinel).

pub const SHADER_PREFIX_SUM: &str = include_str!("shaders/prefix_sum_u32.wgsl");

// ═══════════════════════════════════════════════════════════════════
// Pair Scatter
// ═══════════════════════════════════════════════════════════════════
//
// One thread per pair; per-particle atomic cursors place each pair
// inside its owner's segment.

pub const SHADER_PAIR_SCATTER: &str = include_str!("shaders/pair_scatter.wgsl");

// ═══════════════════════════════════════════════════════════════════
// Group Evaluation Template (f64)
// ═══════════════════════════════════════════════════════════════════
//
// One thread per anchor. Combinatorial unranking, member-pair filters,
// permutation-table role assignment, split-u32 fixed-point force
// accumulation. Requires `splice_potential` before compilation.

pub const SHADER_GROUP_EVALUATE_TEMPLATE: &str =
    include_str!("shaders/group_evaluate_f64.wgsl");

/// Marker in the evaluation template replaced by the potential's WGSL body.
pub const POTENTIAL_MARKER: &str = "//__GROUP_POTENTIAL__";

/// Splice a potential's WGSL implementation of `group_energy_forces` into
/// the evaluation template.
///
/// # Panics
///
/// Panics if the template does not contain [`POTENTIAL_MARKER`]; that is a
/// programming error, not a runtime condition.
#[must_use]
pub fn splice_potential(template: &str, potential_wgsl: &str) -> String {
    assert!(
        template.contains(POTENTIAL_MARKER),
        "evaluation template lost its splice marker"
    );
    template.replacen(POTENTIAL_MARKER, potential_wgsl, 1)
}

/// Axilrod-Teller-Muto triple-dipole energy and analytic forces, expressed
/// in squared distances. The strength C is read from role 0's first
/// per-particle parameter. Mirrors `crate::potentials::AxilrodTeller`.
pub const AXILROD_TELLER_WGSL: &str = r"
fn group_energy_forces(
    pos: array<vec3<f64>, 4>,
    par: array<vec4<f64>, 4>,
    g: u32,
    forces: ptr<function, array<vec3<f64>, 4>>,
) -> f64 {
    let c = par[0].x;
    let d12 = pos[0] - pos[1];
    let d13 = pos[0] - pos[2];
    let d23 = pos[1] - pos[2];

    let a = dot(d12, d12);
    let b = dot(d13, d13);
    let cc = dot(d23, d23);

    let abc = a * b * cc;
    let inv32 = 1.0 / (abc * sqrt(abc));
    let inv52 = inv32 / abc;
    let inv72 = inv52 / abc;

    let p = a + b - cc;
    let q = a + cc - b;
    let r = b + cc - a;
    let w = p * q * r;

    let de_da = c * (-1.5 * b * cc * inv52
        + 0.375 * ((q * r + p * r - p * q) * inv52 - 2.5 * w * b * cc * inv72));
    let de_db = c * (-1.5 * a * cc * inv52
        + 0.375 * ((q * r - p * r + p * q) * inv52 - 2.5 * w * a * cc * inv72));
    let de_dc = c * (-1.5 * a * b * inv52
        + 0.375 * ((p * r + p * q - q * r) * inv52 - 2.5 * w * a * b * inv72));

    (*forces)[0] = -2.0 * (de_da * d12 + de_db * d13);
    (*forces)[1] = -2.0 * (-de_da * d12 + de_dc * d23);
    (*forces)[2] = -2.0 * (-de_db * d13 - de_dc * d23);

    return c * (inv32 + 0.375 * w * inv52);
}
";

#[cfg(test)]
mod tests {
    use super::*;

    const SHADER_CONSTANTS: &[(&str, &str)] = &[
        ("SHADER_TILE_BOUNDS", SHADER_TILE_BOUNDS),
        ("SHADER_PAIR_DISCOVERY", SHADER_PAIR_DISCOVERY),
        ("SHADER_PREFIX_SUM", SHADER_PREFIX_SUM),
        ("SHADER_PAIR_SCATTER", SHADER_PAIR_SCATTER),
        ("SHADER_GROUP_EVALUATE_TEMPLATE", SHADER_GROUP_EVALUATE_TEMPLATE),
    ];

    #[test]
    fn each_shader_constant_non_empty() {
        for (name, shader) in SHADER_CONSTANTS {
            assert!(!shader.is_empty(), "{name} must not be empty");
            assert!(shader.len() > 100, "{name} should be substantial");
        }
    }

    #[test]
    fn each_shader_has_compute_and_workgroup_size() {
        for (name, shader) in SHADER_CONSTANTS {
            assert!(shader.contains("@compute"), "{name} must contain @compute");
            assert!(
                shader.contains("@workgroup_size"),
                "{name} must contain @workgroup_size"
            );
        }
    }

    #[test]
    fn each_shader_has_binding_declarations() {
        for (name, shader) in SHADER_CONSTANTS {
            assert!(
                shader.contains("@group("),
                "{name} must contain @group binding"
            );
            assert!(
                shader.contains("@binding("),
                "{name} must contain @binding declaration"
            );
        }
    }

    #[test]
    fn only_the_evaluation_template_carries_the_marker() {
        assert!(SHADER_GROUP_EVALUATE_TEMPLATE.contains(POTENTIAL_MARKER));
        assert!(!SHADER_PAIR_DISCOVERY.contains(POTENTIAL_MARKER));
    }

    #[test]
    fn splice_replaces_marker_with_potential_body() {
        let spliced = splice_potential(SHADER_GROUP_EVALUATE_TEMPLATE, AXILROD_TELLER_WGSL);
        assert!(!spliced.contains(POTENTIAL_MARKER));
        assert!(spliced.contains("fn group_energy_forces"));
        assert!(spliced.contains("@compute"));
    }

    #[test]
    fn axilrod_teller_snippet_defines_the_contract() {
        assert!(AXILROD_TELLER_WGSL.contains("fn group_energy_forces"));
        assert!(AXILROD_TELLER_WGSL.contains("array<vec3<f64>, 4>"));
    }

    #[test]
    fn evaluation_template_uses_split_fixed_point() {
        assert!(SHADER_GROUP_EVALUATE_TEMPLATE.contains("force_lo"));
        assert!(SHADER_GROUP_EVALUATE_TEMPLATE.contains("force_hi"));
        assert!(SHADER_GROUP_EVALUATE_TEMPLATE.contains("4294967296.0"));
    }

    #[test]
    fn discovery_shader_batches_reservations() {
        assert!(SHADER_PAIR_DISCOVERY.contains("const BATCH"));
        assert!(SHADER_PAIR_DISCOVERY.contains("atomicAdd(&cursor"));
    }
}

// SPDX-License-Identifier: AGPL-3.0-only

//! Concrete group potentials.
//!
//! Ships the Axilrod-Teller triple-dipole interaction, the canonical
//! three-body dispersion term:
//!
//! ```text
//! U = C * (1 + 3 cos(g1) cos(g2) cos(g3)) / (r12 r13 r23)^3
//! ```
//!
//! where `g1..g3` are the interior angles of the particle triangle.
//! Expressed in squared distances `a = r12^2`, `b = r13^2`, `c = r23^2`:
//!
//! ```text
//! U = C * [ (abc)^-3/2 + 3/8 * (a+b-c)(a+c-b)(b+c-a) * (abc)^-5/2 ]
//! ```
//!
//! which gives an analytic gradient through the chain rule on the squared
//! distances (grad_i r_ij^2 = 2 (r_i - r_j)).

use crate::force::GroupPotential;

/// Axilrod-Teller-Muto three-body dispersion.
#[derive(Clone, Copy, Debug)]
pub struct AxilrodTeller {
    /// Triple-dipole strength C.
    pub c: f64,
}

impl AxilrodTeller {
    #[must_use]
    pub const fn new(c: f64) -> Self {
        Self { c }
    }
}

fn sub(u: [f64; 3], v: [f64; 3]) -> [f64; 3] {
    [u[0] - v[0], u[1] - v[1], u[2] - v[2]]
}

fn dot(u: [f64; 3], v: [f64; 3]) -> f64 {
    u[0] * v[0] + u[1] * v[1] + u[2] * v[2]
}

impl GroupPotential for AxilrodTeller {
    fn group_size(&self) -> usize {
        3
    }

    fn evaluate(
        &self,
        positions: &[[f64; 3]],
        _parameters: &[&[f64]],
        forces: &mut [[f64; 3]],
    ) -> f64 {
        let d12 = sub(positions[0], positions[1]);
        let d13 = sub(positions[0], positions[2]);
        let d23 = sub(positions[1], positions[2]);

        let a = dot(d12, d12);
        let b = dot(d13, d13);
        let c = dot(d23, d23);

        let abc = a * b * c;
        let inv32 = abc.powf(-1.5);
        let inv52 = inv32 / abc;
        let inv72 = inv52 / abc;

        let p = a + b - c;
        let q = a + c - b;
        let r = b + c - a;
        let w = p * q * r;

        let energy = self.c * (inv32 + 0.375 * w * inv52);

        // dU/d(squared distance), W differentiated by the product rule.
        let de_da =
            self.c * (-1.5 * b * c * inv52 + 0.375 * ((q * r + p * r - p * q) * inv52 - 2.5 * w * b * c * inv72));
        let de_db =
            self.c * (-1.5 * a * c * inv52 + 0.375 * ((q * r - p * r + p * q) * inv52 - 2.5 * w * a * c * inv72));
        let de_dc =
            self.c * (-1.5 * a * b * inv52 + 0.375 * ((p * r + p * q - q * r) * inv52 - 2.5 * w * a * b * inv72));

        for k in 0..3 {
            forces[0][k] = -2.0 * (de_da * d12[k] + de_db * d13[k]);
            forces[1][k] = -2.0 * (-de_da * d12[k] + de_dc * d23[k]);
            forces[2][k] = -2.0 * (-de_db * d13[k] - de_dc * d23[k]);
        }

        energy
    }
}

use std::f64::consts::PI;

use super::{ContactCoefficients, ContactForceModel, EffectiveProperties};
use crate::config::PhysicalProperties;

/// Hertz-Mindlin contact: the normal force grows with overlap^(3/2)
#[derive(Debug, Clone, Copy, Default)]
pub struct NonLinearContactForce;

impl ContactForceModel for NonLinearContactForce {
    fn name(&self) -> &'static str {
        "nonlinear"
    }

    fn coefficients(
        &self,
        overlap: f64,
        effective: &EffectiveProperties,
        props: &PhysicalProperties,
    ) -> ContactCoefficients {
        let youngs = props.youngs_modulus;
        let poisson = props.poisson_ratio;
        let effective_youngs = youngs / (2.0 * (1.0 - poisson * poisson));
        let effective_shear = youngs / (4.0 * (2.0 - poisson) * (1.0 + poisson));

        let ln_e = props.restitution.ln();
        let beta = ln_e / (ln_e * ln_e + PI * PI).sqrt();
        let contact_radius = (effective.radius * overlap).sqrt();
        let normal_modulus = 2.0 * effective_youngs * contact_radius;
        let tangential_modulus = 8.0 * effective_shear * contact_radius;
        let damping_factor = -2.0 * (5.0f64 / 6.0).sqrt() * beta;

        ContactCoefficients {
            normal_stiffness: 4.0 / 3.0 * effective_youngs * contact_radius,
            normal_damping: damping_factor * (normal_modulus * effective.mass).sqrt(),
            tangential_stiffness: tangential_modulus,
            tangential_damping: damping_factor * (tangential_modulus * effective.mass).sqrt(),
        }
    }
}

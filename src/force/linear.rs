use std::f64::consts::PI;

use super::{ContactCoefficients, ContactForceModel, EffectiveProperties};
use crate::config::PhysicalProperties;

/// Linear spring-dashpot with constant stiffness
///
/// The normal damping is chosen so that an isolated binary collision has
/// exactly the configured coefficient of restitution.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearContactForce;

impl ContactForceModel for LinearContactForce {
    fn name(&self) -> &'static str {
        "linear"
    }

    fn coefficients(
        &self,
        _overlap: f64,
        effective: &EffectiveProperties,
        props: &PhysicalProperties,
    ) -> ContactCoefficients {
        let stiffness = props.normal_stiffness;
        let ln_e = props.restitution.ln();
        let damping = -2.0 * ln_e * (effective.mass * stiffness).sqrt() / (ln_e * ln_e + PI * PI).sqrt();
        ContactCoefficients {
            normal_stiffness: stiffness,
            normal_damping: damping,
            tangential_stiffness: 2.0 / 7.0 * stiffness,
            tangential_damping: damping,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_damping_matches_restitution() {
        let props = PhysicalProperties {
            normal_stiffness: 2.0e3,
            restitution: 0.5,
            ..Default::default()
        };
        let effective = EffectiveProperties { radius: 0.01, mass: 0.2 };
        let c = LinearContactForce.coefficients(1e-3, &effective, &props);

        // Damped oscillator: e = exp(-pi * zeta / sqrt(1 - zeta^2))
        let zeta = c.normal_damping / (2.0 * (effective.mass * c.normal_stiffness).sqrt());
        let e = (-PI * zeta / (1.0 - zeta * zeta).sqrt()).exp();
        assert!((e - 0.5).abs() < 1e-12);
        assert!((c.tangential_stiffness - 2.0 / 7.0 * 2.0e3).abs() < 1e-9);
    }

    #[test]
    fn test_elastic_contact_has_no_damping() {
        let props = PhysicalProperties {
            restitution: 1.0,
            ..Default::default()
        };
        let effective = EffectiveProperties { radius: 0.01, mass: 0.2 };
        let c = LinearContactForce.coefficients(1e-3, &effective, &props);
        assert_eq!(c.normal_damping, 0.0);
    }
}

//! Time integration of particle motion
//!
//! Integrators consume the contact force and torque accumulated during the
//! step, add the body force, and advance the translational and rotational
//! state of every owned particle by one timestep.

mod euler;
mod verlet;

pub use euler::ExplicitEulerIntegrator;
pub use verlet::VelocityVerletIntegrator;

use glam::{DQuat, DVec3};

use crate::config::IntegrationMethod;
use crate::particles::Particle;

/// Interchangeable time integrator
pub trait Integrator: Send + Sync {
    fn name(&self) -> &'static str;

    fn integrate(&self, particles: &mut [Particle], body_force: DVec3, dt: f64);
}

/// Build the integrator selected in the configuration
pub fn create_integrator(method: IntegrationMethod) -> Box<dyn Integrator> {
    match method {
        IntegrationMethod::ExplicitEuler => Box::new(ExplicitEulerIntegrator),
        IntegrationMethod::VelocityVerlet => Box::new(VelocityVerletIntegrator),
    }
}

/// Linear and angular acceleration of a particle
#[inline]
fn accelerations(particle: &Particle, body_force: DVec3) -> (DVec3, DVec3) {
    (
        particle.force / particle.mass + body_force,
        particle.torque / particle.moment_of_inertia,
    )
}

/// Rotate an orientation by the angular velocity over one step
#[inline]
fn rotate(orientation: DQuat, angular_velocity: DVec3, dt: f64) -> DQuat {
    (DQuat::from_scaled_axis(angular_velocity * dt) * orientation).normalize()
}

use glam::DVec3;

use super::{accelerations, rotate, Integrator};
use crate::particles::Particle;

/// Semi-implicit Euler: the position advances with the updated velocity
#[derive(Debug, Clone, Copy, Default)]
pub struct ExplicitEulerIntegrator;

impl Integrator for ExplicitEulerIntegrator {
    fn name(&self) -> &'static str {
        "explicit_euler"
    }

    fn integrate(&self, particles: &mut [Particle], body_force: DVec3, dt: f64) {
        for particle in particles.iter_mut() {
            let (acceleration, angular_acceleration) = accelerations(particle, body_force);
            particle.velocity += acceleration * dt;
            particle.position += particle.velocity * dt;
            particle.angular_velocity += angular_acceleration * dt;
            particle.orientation = rotate(particle.orientation, particle.angular_velocity, dt);
        }
    }
}

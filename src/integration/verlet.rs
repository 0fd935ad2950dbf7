use glam::DVec3;

use super::{accelerations, rotate, Integrator};
use crate::particles::Particle;

/// Velocity-Verlet
///
/// The end-of-step acceleration is only known after the next force
/// evaluation, so each step first completes the previous velocity update
/// with half the change in acceleration, then advances the position and
/// predicts the velocity with the current acceleration.
///
/// Velocities read between steps are therefore the prediction; they lag the
/// half-step correction, which the next step applies.
#[derive(Debug, Clone, Copy, Default)]
pub struct VelocityVerletIntegrator;

impl Integrator for VelocityVerletIntegrator {
    fn name(&self) -> &'static str {
        "velocity_verlet"
    }

    fn integrate(&self, particles: &mut [Particle], body_force: DVec3, dt: f64) {
        for particle in particles.iter_mut() {
            let (acceleration, angular_acceleration) = accelerations(particle, body_force);

            if let Some(previous) = particle.previous_acceleration {
                particle.velocity += 0.5 * (acceleration - previous) * dt;
            }
            if let Some(previous) = particle.previous_angular_acceleration {
                particle.angular_velocity += 0.5 * (angular_acceleration - previous) * dt;
            }

            particle.position += particle.velocity * dt + 0.5 * acceleration * dt * dt;
            let rotation = particle.angular_velocity + 0.5 * angular_acceleration * dt;
            particle.orientation = rotate(particle.orientation, rotation, dt);

            particle.velocity += acceleration * dt;
            particle.angular_velocity += angular_acceleration * dt;
            particle.previous_acceleration = Some(acceleration);
            particle.previous_angular_acceleration = Some(angular_acceleration);
        }
    }
}

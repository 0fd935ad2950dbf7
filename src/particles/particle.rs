use glam::{DQuat, DVec3};
use serde::{Deserialize, Serialize};

use crate::config::PhysicalProperties;
use crate::decomposition::CellId;

/// Stable global particle identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct ParticleId(pub u64);

impl std::fmt::Display for ParticleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Rigid spherical particle
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Particle {
    pub id: ParticleId,
    pub position: DVec3,
    pub velocity: DVec3,
    pub angular_velocity: DVec3,
    pub orientation: DQuat,
    /// Contact force accumulated during the current step
    pub force: DVec3,
    /// Contact torque accumulated during the current step
    pub torque: DVec3,
    pub radius: f64,
    pub mass: f64,
    pub moment_of_inertia: f64,
    /// Cell the particle was sorted into at the last detection step
    pub cell: CellId,
    /// Acceleration used by the previous integration step (velocity-Verlet)
    pub previous_acceleration: Option<DVec3>,
    /// Angular acceleration used by the previous integration step
    pub previous_angular_acceleration: Option<DVec3>,
}

impl Particle {
    /// Create a resting particle made of the given material
    pub fn new(id: ParticleId, position: DVec3, radius: f64, props: &PhysicalProperties) -> Self {
        Self {
            id,
            position,
            velocity: DVec3::ZERO,
            angular_velocity: DVec3::ZERO,
            orientation: DQuat::IDENTITY,
            force: DVec3::ZERO,
            torque: DVec3::ZERO,
            radius,
            mass: props.mass_of(radius),
            moment_of_inertia: props.moment_of_inertia_of(radius),
            cell: CellId::INVALID,
            previous_acceleration: None,
            previous_angular_acceleration: None,
        }
    }

    pub fn with_velocity(mut self, velocity: DVec3) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_angular_velocity(mut self, angular_velocity: DVec3) -> Self {
        self.angular_velocity = angular_velocity;
        self
    }

    pub fn diameter(&self) -> f64 {
        2.0 * self.radius
    }

    /// Zero the force and torque accumulators
    pub fn reset_forces(&mut self) {
        self.force = DVec3::ZERO;
        self.torque = DVec3::ZERO;
    }

    /// Accumulate a contact force and torque
    #[inline]
    pub fn apply(&mut self, force: DVec3, torque: DVec3) {
        self.force += force;
        self.torque += torque;
    }

    pub fn kinetic_energy(&self) -> f64 {
        0.5 * self.mass * self.velocity.length_squared()
            + 0.5 * self.moment_of_inertia * self.angular_velocity.length_squared()
    }

    /// True if two spheres intersect
    pub fn overlaps(&self, position: DVec3, radius: f64) -> bool {
        let reach = self.radius + radius;
        self.position.distance_squared(position) < reach * reach
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_particle_derives_mass() {
        let props = PhysicalProperties::default();
        let particle = Particle::new(ParticleId(3), DVec3::ZERO, 0.01, &props);
        assert!((particle.mass - props.mass_of(0.01)).abs() < 1e-15);
        assert!(particle.previous_acceleration.is_none());
        assert_eq!(particle.cell, CellId::INVALID);
    }

    #[test]
    fn test_reset_forces() {
        let props = PhysicalProperties::default();
        let mut particle = Particle::new(ParticleId(1), DVec3::ZERO, 0.01, &props);
        particle.apply(DVec3::X, DVec3::Y);
        particle.apply(DVec3::X, DVec3::ZERO);
        assert_eq!(particle.force, DVec3::new(2.0, 0.0, 0.0));
        particle.reset_forces();
        assert_eq!(particle.force, DVec3::ZERO);
        assert_eq!(particle.torque, DVec3::ZERO);
    }

    #[test]
    fn test_overlap_excludes_touching() {
        let props = PhysicalProperties::default();
        let particle = Particle::new(ParticleId(1), DVec3::ZERO, 0.5, &props);
        assert!(particle.overlaps(DVec3::new(0.9, 0.0, 0.0), 0.5));
        assert!(!particle.overlaps(DVec3::new(1.0, 0.0, 0.0), 0.5));
    }
}

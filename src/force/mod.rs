//! Contact force models
//!
//! Every model shares the spring-dashpot contact law with a Coulomb-limited
//! tangential spring; the models differ in how stiffness and damping depend on
//! the contact. The law is evaluated every step for every live contact object.

mod linear;
mod nonlinear;

pub use linear::LinearContactForce;
pub use nonlinear::NonLinearContactForce;

use glam::DVec3;

use crate::config::{ContactForceMethod, PhysicalProperties};
use crate::contact::{BoundaryKey, ContactObject, ContactRegistry, PairKey};
use crate::error::{invariant_violation, DemResult};
use crate::particles::{Particle, ParticleId, ParticleStore};

/// Effective radius and mass of a contact
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectiveProperties {
    pub radius: f64,
    pub mass: f64,
}

/// Spring and dashpot coefficients of a contact at its current overlap
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactCoefficients {
    pub normal_stiffness: f64,
    pub normal_damping: f64,
    pub tangential_stiffness: f64,
    pub tangential_damping: f64,
}

/// Interchangeable contact force law
pub trait ContactForceModel: Send + Sync {
    fn name(&self) -> &'static str;

    fn coefficients(
        &self,
        overlap: f64,
        effective: &EffectiveProperties,
        props: &PhysicalProperties,
    ) -> ContactCoefficients;
}

/// Build the model selected in the configuration
pub fn create_force_model(method: ContactForceMethod) -> Box<dyn ContactForceModel> {
    match method {
        ContactForceMethod::Linear => Box::new(LinearContactForce),
        ContactForceMethod::Nonlinear => Box::new(NonLinearContactForce),
    }
}

/// Kinematic state of an entity taking part in a contact
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactBody {
    pub velocity: DVec3,
    pub angular_velocity: DVec3,
    pub radius: f64,
    pub mass: f64,
}

impl From<&Particle> for ContactBody {
    fn from(particle: &Particle) -> Self {
        Self {
            velocity: particle.velocity,
            angular_velocity: particle.angular_velocity,
            radius: particle.radius,
            mass: particle.mass,
        }
    }
}

/// Force and torques produced by one contact
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactForce {
    pub normal_force: DVec3,
    pub tangential_force: DVec3,
    /// Torque on the first entity
    pub torque_first: DVec3,
    /// Torque on the second entity (discarded for boundaries)
    pub torque_second: DVec3,
}

impl ContactForce {
    /// Total force on the first entity; the second receives the opposite
    pub fn force(&self) -> DVec3 {
        self.normal_force + self.tangential_force
    }
}

/// Evaluate the contact law, advancing the tangential history of the contact.
/// `second` is `None` for a static boundary feature.
pub fn evaluate(
    model: &dyn ContactForceModel,
    contact: &mut ContactObject,
    first: &ContactBody,
    second: Option<&ContactBody>,
    props: &PhysicalProperties,
    dt: f64,
) -> DemResult<ContactForce> {
    let overlap = contact.normal_overlap;
    if !(overlap > 0.0) {
        return Err(invariant_violation(format!(
            "{} force model received overlap {}",
            model.name(),
            overlap
        )));
    }
    let normal = contact.normal;

    let (second_velocity, second_angular, second_radius) = second
        .map(|body| (body.velocity, body.angular_velocity, body.radius))
        .unwrap_or((DVec3::ZERO, DVec3::ZERO, 0.0));
    let relative_velocity = (first.velocity - second_velocity)
        + (first.radius * first.angular_velocity + second_radius * second_angular).cross(normal);
    let normal_velocity = relative_velocity.dot(normal);
    let tangential_velocity = relative_velocity - normal_velocity * normal;
    contact.normal_relative_velocity = normal_velocity;
    contact.tangential_relative_velocity = tangential_velocity;

    // Keep the accumulated displacement in the current tangent plane
    let mut displacement = contact.tangential_displacement;
    displacement -= displacement.dot(normal) * normal;
    displacement += tangential_velocity * dt;

    let effective = match second {
        Some(body) => EffectiveProperties {
            radius: first.radius * body.radius / (first.radius + body.radius),
            mass: first.mass * body.mass / (first.mass + body.mass),
        },
        None => EffectiveProperties {
            radius: first.radius,
            mass: first.mass,
        },
    };
    let c = model.coefficients(overlap, &effective, props);

    let normal_force = -(c.normal_stiffness * overlap + c.normal_damping * normal_velocity) * normal;
    let mut tangential_force = -c.tangential_stiffness * displacement - c.tangential_damping * tangential_velocity;

    let limit = props.friction * normal_force.length();
    let magnitude = tangential_force.length();
    if magnitude > limit {
        // Sliding: clamp to the Coulomb limit and shorten the spring to match
        tangential_force *= limit / magnitude;
        displacement = if c.tangential_stiffness > 0.0 {
            -(tangential_force + c.tangential_damping * tangential_velocity) / c.tangential_stiffness
        } else {
            DVec3::ZERO
        };
    }
    contact.tangential_displacement = displacement;
    contact.age += 1;

    let mut torque_first = (first.radius * normal).cross(tangential_force);
    let mut torque_second = (second_radius * normal).cross(tangential_force);

    if props.rolling_friction > 0.0 {
        let spin = first.angular_velocity - second_angular;
        if spin.length_squared() > 0.0 {
            let rolling = -props.rolling_friction * effective.radius * normal_force.length() * spin.normalize();
            torque_first += rolling;
            torque_second -= rolling;
        }
    }

    Ok(ContactForce {
        normal_force,
        tangential_force,
        torque_first,
        torque_second,
    })
}

fn apply(store: &mut ParticleStore, id: ParticleId, force: DVec3, torque: DVec3) -> bool {
    match store.local_mut(id) {
        Some(particle) => {
            particle.apply(force, torque);
            true
        }
        None => false,
    }
}

/// Accumulate particle-particle forces. Pairs with a ghost partner only
/// update the owned particle; the owner of the ghost computes the same
/// force for its side.
pub fn compute_particle_particle_forces(
    contacts: &mut ContactRegistry,
    store: &mut ParticleStore,
    model: &dyn ContactForceModel,
    props: &PhysicalProperties,
    dt: f64,
) -> DemResult<()> {
    for (key, contact) in contacts.local_pairs_mut() {
        let result = pair_force(key, contact, store, model, props, dt)?;
        let applied_first = apply(store, key.first, result.force(), result.torque_first);
        let applied_second = apply(store, key.second, -result.force(), result.torque_second);
        if !(applied_first && applied_second) {
            return Err(invariant_violation(format!(
                "local contact {}-{} involves a particle this domain does not own",
                key.first, key.second
            )));
        }
    }

    for (key, contact) in contacts.ghost_pairs_mut() {
        let result = pair_force(key, contact, store, model, props, dt)?;
        let applied_first = apply(store, key.first, result.force(), result.torque_first);
        let applied_second = apply(store, key.second, -result.force(), result.torque_second);
        if applied_first == applied_second {
            return Err(invariant_violation(format!(
                "ghost contact {}-{} must involve exactly one owned particle",
                key.first, key.second
            )));
        }
    }
    Ok(())
}

fn pair_force(
    key: &PairKey,
    contact: &mut ContactObject,
    store: &ParticleStore,
    model: &dyn ContactForceModel,
    props: &PhysicalProperties,
    dt: f64,
) -> DemResult<ContactForce> {
    let first = ContactBody::from(store.require(key.first)?);
    let second = ContactBody::from(store.require(key.second)?);
    evaluate(model, contact, &first, Some(&second), props, dt)
}

/// Accumulate particle-boundary forces; the boundary reaction is discarded
pub fn compute_particle_boundary_forces(
    contacts: &mut ContactRegistry,
    store: &mut ParticleStore,
    model: &dyn ContactForceModel,
    props: &PhysicalProperties,
    dt: f64,
) -> DemResult<()> {
    for (key, contact) in contacts.boundary_contacts_mut() {
        let BoundaryKey { particle, .. } = *key;
        let body = ContactBody::from(store.require(particle)?);
        let result = evaluate(model, contact, &body, None, props, dt)?;
        if !apply(store, particle, result.force(), result.torque_first) {
            return Err(invariant_violation(format!(
                "boundary contact involves particle {} which this domain does not own",
                particle
            )));
        }
    }
    Ok(())
}

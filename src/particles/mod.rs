pub mod particle;
pub mod store;

pub use particle::{Particle, ParticleId};
pub use store::{ParticleStore, Slot};

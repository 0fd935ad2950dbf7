use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::boundary::BoundaryFeatureId;
use crate::particles::ParticleId;

/// Particle-particle contact key, ordered so that `first < second`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey {
    pub first: ParticleId,
    pub second: ParticleId,
}

impl PairKey {
    pub fn new(a: ParticleId, b: ParticleId) -> Self {
        if a <= b {
            Self { first: a, second: b }
        } else {
            Self { first: b, second: a }
        }
    }

    pub fn involves(&self, id: ParticleId) -> bool {
        self.first == id || self.second == id
    }
}

/// Particle-boundary contact key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BoundaryKey {
    pub particle: ParticleId,
    pub feature: BoundaryFeatureId,
}

/// Key of any contact object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ContactKey {
    Pair(PairKey),
    Boundary(BoundaryKey),
}

impl ContactKey {
    pub fn involves(&self, id: ParticleId) -> bool {
        match self {
            ContactKey::Pair(pair) => pair.involves(id),
            ContactKey::Boundary(boundary) => boundary.particle == id,
        }
    }
}

/// Persistent state of one contact
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContactObject {
    /// Positive penetration depth confirmed at the last refresh
    pub normal_overlap: f64,
    /// Unit normal from the first entity toward the second
    pub normal: DVec3,
    pub normal_relative_velocity: f64,
    pub tangential_relative_velocity: DVec3,
    /// Time integral of the tangential relative velocity while in contact
    pub tangential_displacement: DVec3,
    /// Number of force evaluations the contact has seen
    pub age: u64,
}

impl ContactObject {
    pub fn new(normal_overlap: f64, normal: DVec3) -> Self {
        Self {
            normal_overlap,
            normal,
            normal_relative_velocity: 0.0,
            tangential_relative_velocity: DVec3::ZERO,
            tangential_displacement: DVec3::ZERO,
            age: 0,
        }
    }

    fn from_record(record: &ContactRecord) -> Self {
        Self {
            tangential_displacement: record.tangential_displacement,
            age: record.age,
            ..Self::new(0.0, DVec3::ZERO)
        }
    }

    pub fn record(&self, key: ContactKey) -> ContactRecord {
        ContactRecord {
            key,
            tangential_displacement: self.tangential_displacement,
            age: self.age,
        }
    }
}

/// History of a contact shipped alongside a migrating particle.
/// It only seeds a contact that the next fine search re-confirms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContactRecord {
    pub key: ContactKey,
    pub tangential_displacement: DVec3,
    pub age: u64,
}

impl ContactRecord {
    pub(crate) fn into_object(self) -> ContactObject {
        ContactObject::from_record(&self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_key_is_order_independent() {
        let a = ParticleId(9);
        let b = ParticleId(4);
        assert_eq!(PairKey::new(a, b), PairKey::new(b, a));
        assert_eq!(PairKey::new(a, b).first, b);
        assert!(PairKey::new(a, b).involves(a));
        assert!(!PairKey::new(a, b).involves(ParticleId(5)));
    }

    #[test]
    fn test_record_keeps_history_only() {
        let mut object = ContactObject::new(0.01, DVec3::X);
        object.tangential_displacement = DVec3::new(0.0, 1e-4, 0.0);
        object.age = 12;
        let key = ContactKey::Pair(PairKey::new(ParticleId(1), ParticleId(2)));
        let restored = object.record(key).into_object();
        assert_eq!(restored.tangential_displacement, object.tangential_displacement);
        assert_eq!(restored.age, 12);
        assert_eq!(restored.normal_overlap, 0.0);
    }
}

use std::hash::Hash;

use glam::DVec3;
use rustc_hash::FxHashMap;

use super::{BoundaryKey, ContactCandidates, ContactKey, ContactObject, ContactRecord, PairKey};
use crate::boundary::BoundaryCatalog;
use crate::error::DemResult;
use crate::particles::{Particle, ParticleId, ParticleStore};

/// Overlap and normal of two entities at their current positions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactGeometry {
    /// Positive when the entities interpenetrate
    pub overlap: f64,
    /// Unit vector from the particle toward its partner
    pub normal: DVec3,
}

pub fn pair_geometry(a: &Particle, b: &Particle) -> ContactGeometry {
    let offset = b.position - a.position;
    let distance = offset.length();
    // Coincident centers have no defined normal; any unit vector will do
    let normal = if distance > 0.0 { offset / distance } else { DVec3::X };
    ContactGeometry {
        overlap: a.radius + b.radius - distance,
        normal,
    }
}

pub fn boundary_geometry(catalog: &BoundaryCatalog, key: &BoundaryKey, particle: &Particle) -> Option<ContactGeometry> {
    let hit = catalog.distance(key.feature, particle.position, particle.radius)?;
    Some(ContactGeometry {
        overlap: hit.overlap(particle.radius),
        normal: hit.normal,
    })
}

/// Outcome of one fine search
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FineSearchSummary {
    pub created: usize,
    pub carried: usize,
    pub tracked: usize,
}

/// Number of live contact objects per collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContactCounts {
    pub local: usize,
    pub ghost: usize,
    pub boundary: usize,
}

impl ContactCounts {
    pub fn total(&self) -> usize {
        self.local + self.ghost + self.boundary
    }
}

/// Persistent contact state of one domain
///
/// Contact objects live in three collections: pairs of owned particles,
/// pairs with a ghost partner, and particle-boundary contacts. Candidates
/// within the search margin are tracked until the next fine search and
/// refreshed every step, so an object exists exactly while its overlap is
/// positive.
#[derive(Debug, Default)]
pub struct ContactRegistry {
    local: FxHashMap<PairKey, ContactObject>,
    ghost: FxHashMap<PairKey, ContactObject>,
    boundary: FxHashMap<BoundaryKey, ContactObject>,
    tracked_local: Vec<PairKey>,
    tracked_ghost: Vec<PairKey>,
    tracked_boundary: Vec<BoundaryKey>,
    seeds: FxHashMap<ContactKey, ContactRecord>,
}

impl ContactRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild every collection from fresh candidates. Existing objects and
    /// seeded history survive only when their key is confirmed again.
    pub fn fine_search(
        &mut self,
        candidates: &ContactCandidates,
        store: &ParticleStore,
        catalog: &BoundaryCatalog,
        search_margin: f64,
    ) -> DemResult<FineSearchSummary> {
        let mut previous: FxHashMap<ContactKey, ContactObject> = self
            .seeds
            .drain()
            .map(|(key, record)| (key, record.into_object()))
            .collect();
        previous.extend(self.local.drain().map(|(key, object)| (ContactKey::Pair(key), object)));
        previous.extend(self.ghost.drain().map(|(key, object)| (ContactKey::Pair(key), object)));
        previous.extend(
            self.boundary
                .drain()
                .map(|(key, object)| (ContactKey::Boundary(key), object)),
        );
        self.tracked_local.clear();
        self.tracked_ghost.clear();
        self.tracked_boundary.clear();

        let mut summary = FineSearchSummary::default();

        for &key in &candidates.local_pairs {
            let geometry = pair_geometry(store.require(key.first)?, store.require(key.second)?);
            if geometry.overlap > -search_margin {
                self.tracked_local.push(key);
            }
            confirm(&mut self.local, &mut previous, key, ContactKey::Pair(key), geometry, &mut summary);
        }

        for &key in &candidates.ghost_pairs {
            let geometry = pair_geometry(store.require(key.first)?, store.require(key.second)?);
            if geometry.overlap > -search_margin {
                self.tracked_ghost.push(key);
            }
            confirm(&mut self.ghost, &mut previous, key, ContactKey::Pair(key), geometry, &mut summary);
        }

        for &key in &candidates.boundary {
            let particle = store.require(key.particle)?;
            let Some(geometry) = boundary_geometry(catalog, &key, particle) else {
                continue;
            };
            if geometry.overlap > -search_margin {
                self.tracked_boundary.push(key);
            }
            confirm(
                &mut self.boundary,
                &mut previous,
                key,
                ContactKey::Boundary(key),
                geometry,
                &mut summary,
            );
        }

        summary.tracked = self.tracked_local.len() + self.tracked_ghost.len() + self.tracked_boundary.len();
        log::debug!(
            "Fine search: {} tracked, {} contacts created, {} carried over, {} dropped",
            summary.tracked,
            summary.created,
            summary.carried,
            previous.len()
        );
        Ok(summary)
    }

    /// Apply the create/update/delete rule to every tracked pair at the
    /// current positions
    pub fn refresh(&mut self, store: &ParticleStore, catalog: &BoundaryCatalog) -> DemResult<()> {
        for &key in &self.tracked_local {
            let geometry = pair_geometry(store.require(key.first)?, store.require(key.second)?);
            update(&mut self.local, key, Some(geometry));
        }
        for &key in &self.tracked_ghost {
            let geometry = pair_geometry(store.require(key.first)?, store.require(key.second)?);
            update(&mut self.ghost, key, Some(geometry));
        }
        for &key in &self.tracked_boundary {
            let particle = store.require(key.particle)?;
            update(&mut self.boundary, key, boundary_geometry(catalog, &key, particle));
        }
        Ok(())
    }

    /// History of every contact involving a particle about to leave the domain
    pub fn history_for(&self, particle: ParticleId) -> Vec<ContactRecord> {
        let pairs = self
            .local
            .iter()
            .chain(self.ghost.iter())
            .filter(|(key, _)| key.involves(particle))
            .map(|(key, object)| object.record(ContactKey::Pair(*key)));
        let boundary = self
            .boundary
            .iter()
            .filter(|(key, _)| key.particle == particle)
            .map(|(key, object)| object.record(ContactKey::Boundary(*key)));
        let seeded = self
            .seeds
            .values()
            .filter(|record| record.key.involves(particle))
            .copied();
        pairs.chain(boundary).chain(seeded).collect()
    }

    /// Keep received history until the next fine search confirms or drops it
    pub fn add_seeds(&mut self, records: impl IntoIterator<Item = ContactRecord>) {
        for record in records {
            self.seeds.insert(record.key, record);
        }
    }

    /// Turn every collection into seed history and forget tracked pairs.
    /// Used when the decomposition changes under the contacts.
    pub fn invalidate(&mut self) {
        let local = self.local.drain().map(|(key, object)| object.record(ContactKey::Pair(key)));
        let ghost = self.ghost.drain().map(|(key, object)| object.record(ContactKey::Pair(key)));
        let boundary = self
            .boundary
            .drain()
            .map(|(key, object)| object.record(ContactKey::Boundary(key)));
        let records: Vec<ContactRecord> = local.chain(ghost).chain(boundary).collect();
        self.add_seeds(records);
        self.tracked_local.clear();
        self.tracked_ghost.clear();
        self.tracked_boundary.clear();
    }

    pub fn counts(&self) -> ContactCounts {
        ContactCounts {
            local: self.local.len(),
            ghost: self.ghost.len(),
            boundary: self.boundary.len(),
        }
    }

    pub fn seed_count(&self) -> usize {
        self.seeds.len()
    }

    /// Look up a particle-particle contact in either collection
    pub fn pair(&self, key: PairKey) -> Option<&ContactObject> {
        self.local.get(&key).or_else(|| self.ghost.get(&key))
    }

    pub fn boundary_contact(&self, key: BoundaryKey) -> Option<&ContactObject> {
        self.boundary.get(&key)
    }

    pub fn local_pairs_mut(&mut self) -> impl Iterator<Item = (&PairKey, &mut ContactObject)> {
        self.local.iter_mut()
    }

    pub fn ghost_pairs_mut(&mut self) -> impl Iterator<Item = (&PairKey, &mut ContactObject)> {
        self.ghost.iter_mut()
    }

    pub fn boundary_contacts_mut(&mut self) -> impl Iterator<Item = (&BoundaryKey, &mut ContactObject)> {
        self.boundary.iter_mut()
    }
}

fn confirm<K: Hash + Eq + Copy>(
    collection: &mut FxHashMap<K, ContactObject>,
    previous: &mut FxHashMap<ContactKey, ContactObject>,
    key: K,
    contact_key: ContactKey,
    geometry: ContactGeometry,
    summary: &mut FineSearchSummary,
) {
    if geometry.overlap <= 0.0 {
        return;
    }
    let mut object = match previous.remove(&contact_key) {
        Some(object) => {
            summary.carried += 1;
            object
        }
        None => {
            summary.created += 1;
            ContactObject::new(geometry.overlap, geometry.normal)
        }
    };
    object.normal_overlap = geometry.overlap;
    object.normal = geometry.normal;
    collection.insert(key, object);
}

fn update<K: Hash + Eq + Copy>(
    collection: &mut FxHashMap<K, ContactObject>,
    key: K,
    geometry: Option<ContactGeometry>,
) {
    match geometry {
        Some(geometry) if geometry.overlap > 0.0 => {
            let object = collection
                .entry(key)
                .or_insert_with(|| ContactObject::new(geometry.overlap, geometry.normal));
            object.normal_overlap = geometry.overlap;
            object.normal = geometry.normal;
        }
        _ => {
            collection.remove(&key);
        }
    }
}

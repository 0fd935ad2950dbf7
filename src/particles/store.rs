use rustc_hash::FxHashMap;

use super::{Particle, ParticleId};
use crate::error::{invariant_violation, DemResult};

/// Where a particle id resolves inside a domain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Local(usize),
    Ghost(usize),
}

/// Particle storage of one domain: owned particles plus read-only ghost copies
#[derive(Debug, Default)]
pub struct ParticleStore {
    locals: Vec<Particle>,
    ghosts: Vec<Particle>,
    index: FxHashMap<ParticleId, Slot>,
}

impl ParticleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn local_count(&self) -> usize {
        self.locals.len()
    }

    pub fn ghost_count(&self) -> usize {
        self.ghosts.len()
    }

    pub fn locals(&self) -> &[Particle] {
        &self.locals
    }

    pub fn locals_mut(&mut self) -> &mut [Particle] {
        &mut self.locals
    }

    pub fn ghosts(&self) -> &[Particle] {
        &self.ghosts
    }

    pub fn slot(&self, id: ParticleId) -> Option<Slot> {
        self.index.get(&id).copied()
    }

    pub fn is_local(&self, id: ParticleId) -> bool {
        matches!(self.slot(id), Some(Slot::Local(_)))
    }

    /// Look up a local or ghost particle
    pub fn get(&self, id: ParticleId) -> Option<&Particle> {
        match self.slot(id)? {
            Slot::Local(i) => self.locals.get(i),
            Slot::Ghost(i) => self.ghosts.get(i),
        }
    }

    /// Look up a particle that contact bookkeeping expects to be present
    pub fn require(&self, id: ParticleId) -> DemResult<&Particle> {
        self.get(id).ok_or_else(|| {
            invariant_violation(format!("contact references particle {} which is not present", id))
        })
    }

    pub fn local_mut(&mut self, id: ParticleId) -> Option<&mut Particle> {
        match self.slot(id)? {
            Slot::Local(i) => self.locals.get_mut(i),
            Slot::Ghost(_) => None,
        }
    }

    /// Add an owned particle
    pub fn insert_local(&mut self, particle: Particle) -> DemResult<()> {
        if let Some(Slot::Local(_)) = self.index.get(&particle.id) {
            return Err(invariant_violation(format!(
                "particle {} is already owned by this domain",
                particle.id
            )));
        }
        self.index.insert(particle.id, Slot::Local(self.locals.len()));
        self.locals.push(particle);
        Ok(())
    }

    /// Remove and return every owned particle matching the predicate
    pub fn extract_locals<F>(&mut self, mut predicate: F) -> Vec<Particle>
    where
        F: FnMut(&Particle) -> bool,
    {
        let mut extracted = Vec::new();
        let mut kept = Vec::with_capacity(self.locals.len());
        for particle in self.locals.drain(..) {
            if predicate(&particle) {
                extracted.push(particle);
            } else {
                kept.push(particle);
            }
        }
        self.locals = kept;
        self.rebuild_index();
        extracted
    }

    /// Replace every ghost copy with a fresh set received from the owners
    pub fn replace_ghosts(&mut self, ghosts: Vec<Particle>) {
        self.ghosts = ghosts;
        self.rebuild_index();
    }

    /// Order owned particles by cell then id so each cell is contiguous
    pub fn sort_locals(&mut self) {
        self.locals.sort_by_key(|p| (p.cell, p.id));
        self.rebuild_index();
    }

    pub fn reset_forces(&mut self) {
        for particle in &mut self.locals {
            particle.reset_forces();
        }
    }

    fn rebuild_index(&mut self) {
        self.index.clear();
        self.index.reserve(self.locals.len() + self.ghosts.len());
        for (i, ghost) in self.ghosts.iter().enumerate() {
            self.index.insert(ghost.id, Slot::Ghost(i));
        }
        // Owned copies shadow stale ghosts of the same particle
        for (i, local) in self.locals.iter().enumerate() {
            self.index.insert(local.id, Slot::Local(i));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PhysicalProperties;
    use glam::DVec3;

    fn particle(id: u64, x: f64) -> Particle {
        Particle::new(ParticleId(id), DVec3::new(x, 0.0, 0.0), 0.1, &PhysicalProperties::default())
    }

    #[test]
    fn test_local_and_ghost_lookup() {
        let mut store = ParticleStore::new();
        store.insert_local(particle(1, 0.0)).unwrap();
        store.insert_local(particle(2, 1.0)).unwrap();
        store.replace_ghosts(vec![particle(7, 2.0)]);

        assert_eq!(store.slot(ParticleId(2)), Some(Slot::Local(1)));
        assert_eq!(store.slot(ParticleId(7)), Some(Slot::Ghost(0)));
        assert!(store.local_mut(ParticleId(7)).is_none());
        assert!(store.require(ParticleId(9)).is_err());
    }

    #[test]
    fn test_duplicate_local_rejected() {
        let mut store = ParticleStore::new();
        store.insert_local(particle(1, 0.0)).unwrap();
        assert!(store.insert_local(particle(1, 0.5)).is_err());
    }

    #[test]
    fn test_extract_locals_reindexes() {
        let mut store = ParticleStore::new();
        for id in 0..5 {
            store.insert_local(particle(id, id as f64)).unwrap();
        }
        let moved = store.extract_locals(|p| p.id.0 % 2 == 0);
        assert_eq!(moved.len(), 3);
        assert_eq!(store.local_count(), 2);
        assert_eq!(store.slot(ParticleId(3)), Some(Slot::Local(1)));
        assert!(store.get(ParticleId(4)).is_none());
    }
}

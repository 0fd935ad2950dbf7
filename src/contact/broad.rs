use rustc_hash::FxHashMap;

use super::{BoundaryKey, NeighborLists, PairKey};
use crate::boundary::{BoundaryCells, BoundaryFeatureId};
use crate::decomposition::CellId;
use crate::particles::{Particle, ParticleId, ParticleStore};

/// Conservative contact candidates of one domain
#[derive(Debug, Clone, Default)]
pub struct ContactCandidates {
    /// Both particles owned by this domain
    pub local_pairs: Vec<PairKey>,
    /// One owned particle and one ghost
    pub ghost_pairs: Vec<PairKey>,
    /// Owned particle against a face, point or line
    pub boundary: Vec<BoundaryKey>,
}

/// Candidate counts per geometry kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CandidateCounts {
    pub particle_particle: usize,
    pub particle_wall: usize,
    pub particle_point: usize,
    pub particle_line: usize,
}

impl ContactCandidates {
    pub fn len(&self) -> usize {
        self.local_pairs.len() + self.ghost_pairs.len() + self.boundary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.local_pairs.clear();
        self.ghost_pairs.clear();
        self.boundary.clear();
    }

    pub fn counts(&self) -> CandidateCounts {
        let mut counts = CandidateCounts {
            particle_particle: self.local_pairs.len() + self.ghost_pairs.len(),
            ..Default::default()
        };
        for key in &self.boundary {
            match key.feature {
                BoundaryFeatureId::Face(_) => counts.particle_wall += 1,
                BoundaryFeatureId::Point(_) => counts.particle_point += 1,
                BoundaryFeatureId::Line(_) => counts.particle_line += 1,
            }
        }
        counts
    }
}

/// Particle ids per cell, in id order
fn occupancy<'a>(particles: impl Iterator<Item = &'a Particle>) -> FxHashMap<CellId, Vec<ParticleId>> {
    let mut cells: FxHashMap<CellId, Vec<ParticleId>> = FxHashMap::default();
    for particle in particles {
        cells.entry(particle.cell).or_default().push(particle.id);
    }
    for ids in cells.values_mut() {
        ids.sort_unstable();
    }
    cells
}

/// Enumerate candidates from the cell occupancy recorded at the last sort
pub fn broad_search(
    store: &ParticleStore,
    neighbors: &NeighborLists,
    boundary_cells: &BoundaryCells,
) -> ContactCandidates {
    let locals = occupancy(store.locals().iter());
    let ghosts = occupancy(store.ghosts().iter());
    let mut candidates = ContactCandidates::default();

    for &cell in neighbors.owned_cells() {
        let Some(members) = locals.get(&cell) else {
            continue;
        };

        // Same cell: the second id is always greater
        for (i, &a) in members.iter().enumerate() {
            for &b in &members[i + 1..] {
                candidates.local_pairs.push(PairKey::new(a, b));
            }
        }

        for neighbor in neighbors.local_neighbors(cell).iter().skip(1) {
            if let Some(others) = locals.get(neighbor) {
                for &a in members {
                    for &b in others {
                        candidates.local_pairs.push(PairKey::new(a, b));
                    }
                }
            }
        }

        for neighbor in neighbors.ghost_neighbors(cell) {
            if let Some(others) = ghosts.get(neighbor) {
                for &a in members {
                    for &b in others {
                        candidates.ghost_pairs.push(PairKey::new(a, b));
                    }
                }
            }
        }

        for &feature in boundary_cells.features(cell) {
            for &particle in members {
                candidates.boundary.push(BoundaryKey { particle, feature });
            }
        }
    }

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PhysicalProperties;
    use crate::decomposition::{CartesianGrid, Decomposition};
    use glam::DVec3;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use rustc_hash::FxHashSet;

    #[test]
    fn test_no_false_negatives_against_brute_force() {
        let grid = CartesianGrid::new(DVec3::ZERO, DVec3::ONE, [8, 8, 8]).unwrap();
        let decomposition = Decomposition::new(grid.clone(), 1).unwrap();
        let radius = 0.04;
        let lists = NeighborLists::build(&decomposition, 0, 2.0 * radius * 1.3).unwrap();
        let props = PhysicalProperties::default();

        let mut rng = StdRng::seed_from_u64(7);
        let mut store = ParticleStore::new();
        for id in 0..300 {
            let position = DVec3::new(rng.gen(), rng.gen(), rng.gen());
            let mut particle = Particle::new(ParticleId(id), position, radius, &props);
            particle.cell = grid.locate(position);
            store.insert_local(particle).unwrap();
        }

        let candidates = broad_search(&store, &lists, &BoundaryCells::default());
        let found: FxHashSet<PairKey> = candidates.local_pairs.iter().copied().collect();
        assert_eq!(found.len(), candidates.local_pairs.len(), "duplicate candidates");

        let particles = store.locals();
        for (i, a) in particles.iter().enumerate() {
            for b in &particles[i + 1..] {
                if a.overlaps(b.position, b.radius) {
                    assert!(found.contains(&PairKey::new(a.id, b.id)));
                }
            }
        }
    }

    #[test]
    fn test_ghost_pairs_are_separate() {
        let grid = CartesianGrid::new(DVec3::ZERO, DVec3::ONE, [2, 1, 1]).unwrap();
        let decomposition = Decomposition::new(grid.clone(), 2).unwrap();
        let lists = NeighborLists::build(&decomposition, 0, 0.2).unwrap();
        let props = PhysicalProperties::default();

        let mut store = ParticleStore::new();
        let mut local = Particle::new(ParticleId(5), DVec3::new(0.45, 0.5, 0.5), 0.05, &props);
        local.cell = grid.locate(local.position);
        store.insert_local(local).unwrap();
        let mut ghost = Particle::new(ParticleId(2), DVec3::new(0.55, 0.5, 0.5), 0.05, &props);
        ghost.cell = grid.locate(ghost.position);
        store.replace_ghosts(vec![ghost]);

        let candidates = broad_search(&store, &lists, &BoundaryCells::default());
        assert!(candidates.local_pairs.is_empty());
        assert_eq!(candidates.ghost_pairs, vec![PairKey::new(ParticleId(2), ParticleId(5))]);
    }
}

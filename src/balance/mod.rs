//! Load-balancing signal for the repartitioner
//!
//! Each domain measures the particle load of the cells it owns; the cluster
//! gathers the measurements and hands the combined weights to
//! [`Decomposition::repartition`](crate::decomposition::Decomposition::repartition).

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::decomposition::{CellId, CellWeight, DomainId};
use crate::particles::Particle;

/// Cell weights measured by one domain
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DomainLoad {
    pub domain: DomainId,
    pub particles: usize,
    weights: Vec<(CellId, u32)>,
}

impl DomainLoad {
    /// Weight every owned cell by `count × particle_weight`. Particles count
    /// toward the cell they were last sorted into, which the domain owns
    /// even if the particle has since drifted into a neighbor's cell.
    pub fn measure(domain: DomainId, particles: &[Particle], particle_weight: u32) -> Self {
        let mut counts: FxHashMap<CellId, u32> = FxHashMap::default();
        for particle in particles {
            *counts.entry(particle.cell).or_default() += 1;
        }
        let mut weights: Vec<(CellId, u32)> = counts
            .into_iter()
            .map(|(cell, count)| (cell, count.saturating_mul(particle_weight)))
            .collect();
        weights.sort_unstable();
        Self {
            domain,
            particles: particles.len(),
            weights,
        }
    }
}

impl CellWeight for DomainLoad {
    /// Zero for cells holding none of this domain's particles
    fn cell_weight(&self, cell: CellId) -> u32 {
        self.weights
            .binary_search_by_key(&cell, |&(c, _)| c)
            .map(|i| self.weights[i].1)
            .unwrap_or(0)
    }
}

/// Cell-weight callback registered with the decomposition
#[derive(Debug, Clone, Default)]
pub struct LoadBalancer {
    weights: FxHashMap<CellId, u32>,
    particles: usize,
}

impl LoadBalancer {
    pub fn from_loads(loads: &[DomainLoad]) -> Self {
        let mut weights: FxHashMap<CellId, u32> = FxHashMap::default();
        for load in loads {
            for &(cell, weight) in &load.weights {
                let entry = weights.entry(cell).or_default();
                *entry = entry.saturating_add(weight);
            }
        }
        Self {
            weights,
            particles: loads.iter().map(|load| load.particles).sum(),
        }
    }

    pub fn particle_count(&self) -> usize {
        self.particles
    }
}

impl CellWeight for LoadBalancer {
    fn cell_weight(&self, cell: CellId) -> u32 {
        self.weights.get(&cell).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PhysicalProperties;
    use crate::particles::ParticleId;
    use glam::DVec3;

    fn sorted_particle(id: u64, x: f64, cell: u32) -> Particle {
        let mut particle = Particle::new(ParticleId(id), DVec3::new(x, 0.5, 0.5), 0.01, &PhysicalProperties::default());
        particle.cell = CellId(cell);
        particle
    }

    #[test]
    fn test_weights_follow_sorted_cells() {
        // The last particle drifted to x = 0.9 after the sort that put it in cell 0
        let particles = vec![
            sorted_particle(0, 0.1, 0),
            sorted_particle(1, 0.2, 0),
            sorted_particle(2, 0.9, 0),
        ];
        let load = DomainLoad::measure(0, &particles, 10_000);
        assert_eq!(load.cell_weight(CellId(0)), 30_000);
        assert_eq!(load.cell_weight(CellId(1)), 0);

        let other = DomainLoad::measure(1, &[sorted_particle(3, 0.8, 1)], 10_000);
        let balancer = LoadBalancer::from_loads(&[load, other]);
        assert_eq!(balancer.cell_weight(CellId(0)), 30_000);
        assert_eq!(balancer.cell_weight(CellId(1)), 10_000);
        assert_eq!(balancer.particle_count(), 4);
    }
}

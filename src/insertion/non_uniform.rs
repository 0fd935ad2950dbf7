use glam::DVec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{InsertionLattice, InsertionStrategy};
use crate::config::InsertionParameters;

/// Lattice sites shifted by a seeded random offset
///
/// The offset per axis never exceeds half the free space between two sites,
/// so particles of one batch cannot overlap each other.
pub struct NonUniformInsertion {
    lattice: InsertionLattice,
    amplitude: f64,
    rng: StdRng,
}

impl NonUniformInsertion {
    pub fn new(lattice: InsertionLattice, params: &InsertionParameters, diameter: f64) -> Self {
        let free_space = 0.5 * (lattice.spacing() - diameter);
        let amplitude = (params.random_range * diameter).min(free_space).max(0.0);
        Self {
            lattice,
            amplitude,
            rng: StdRng::seed_from_u64(params.seed),
        }
    }

    pub fn amplitude(&self) -> f64 {
        self.amplitude
    }
}

impl InsertionStrategy for NonUniformInsertion {
    fn name(&self) -> &'static str {
        "non_uniform"
    }

    fn positions(&mut self, count: usize) -> Vec<DVec3> {
        let sites: Vec<DVec3> = self.lattice.sites(count).collect();
        if self.amplitude == 0.0 {
            return sites;
        }
        let amplitude = self.amplitude;
        sites
            .into_iter()
            .map(|site| {
                let offset = DVec3::new(
                    self.rng.gen_range(-amplitude..=amplitude),
                    self.rng.gen_range(-amplitude..=amplitude),
                    self.rng.gen_range(-amplitude..=amplitude),
                );
                site + offset
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> InsertionParameters {
        InsertionParameters {
            box_min: DVec3::ZERO,
            box_max: DVec3::new(0.1, 0.1, 0.1),
            distance_threshold: 1.6,
            random_range: 0.5,
            seed: 42,
            ..Default::default()
        }
    }

    #[test]
    fn test_batch_never_overlaps() {
        let diameter = 0.01;
        let params = params();
        let mut strategy = NonUniformInsertion::new(InsertionLattice::new(&params, diameter), &params, diameter);
        assert!((strategy.amplitude() - 0.003).abs() < 1e-12);
        let positions = strategy.positions(200);
        assert_eq!(positions.len(), 200);
        for (i, a) in positions.iter().enumerate() {
            for b in &positions[i + 1..] {
                assert!(a.distance(*b) >= diameter);
            }
        }
    }

    #[test]
    fn test_same_seed_same_positions() {
        let diameter = 0.01;
        let params = params();
        let mut first = NonUniformInsertion::new(InsertionLattice::new(&params, diameter), &params, diameter);
        let mut second = NonUniformInsertion::new(InsertionLattice::new(&params, diameter), &params, diameter);
        assert_eq!(first.positions(20), second.positions(20));
    }
}

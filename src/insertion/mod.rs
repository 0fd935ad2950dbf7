//! Periodic particle insertion
//!
//! An insertion strategy proposes positions inside the insertion box; the
//! owning domain accepts a position only if the new particle overlaps none of
//! its owned or ghost particles. Rejected particles stay pending and are
//! retried at the next insertion event.

mod non_uniform;
mod uniform;

pub use non_uniform::NonUniformInsertion;
pub use uniform::UniformInsertion;

use glam::DVec3;

use crate::config::{InsertionMethod, InsertionParameters};

/// Interchangeable placement pattern
pub trait InsertionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Up to `count` candidate centers for one insertion event
    fn positions(&mut self, count: usize) -> Vec<DVec3>;
}

/// Build the strategy selected in the configuration
pub fn create_insertion_strategy(params: &InsertionParameters, diameter: f64) -> Box<dyn InsertionStrategy> {
    let lattice = InsertionLattice::new(params, diameter);
    match params.method {
        InsertionMethod::Uniform => Box::new(UniformInsertion::new(lattice)),
        InsertionMethod::NonUniform => Box::new(NonUniformInsertion::new(lattice, params, diameter)),
    }
}

/// Regular lattice of insertion sites filling the box along x, then y, then z
#[derive(Debug, Clone)]
pub struct InsertionLattice {
    origin: DVec3,
    spacing: f64,
    counts: [usize; 3],
}

impl InsertionLattice {
    pub fn new(params: &InsertionParameters, diameter: f64) -> Self {
        let spacing = params.distance_threshold * diameter;
        let extent = params.box_max - params.box_min;
        let mut counts = [0usize; 3];
        for axis in 0..3 {
            if extent[axis] >= diameter {
                counts[axis] = ((extent[axis] - diameter) / spacing).floor() as usize + 1;
            }
        }
        Self {
            origin: params.box_min + DVec3::splat(0.5 * diameter),
            spacing,
            counts,
        }
    }

    pub fn capacity(&self) -> usize {
        self.counts.iter().product()
    }

    pub fn spacing(&self) -> f64 {
        self.spacing
    }

    pub fn site(&self, k: usize) -> DVec3 {
        let [nx, ny, _] = self.counts;
        let index = DVec3::new((k % nx) as f64, ((k / nx) % ny) as f64, (k / (nx * ny)) as f64);
        self.origin + index * self.spacing
    }

    /// The first `count` sites, or every site if the lattice is smaller
    pub fn sites(&self, count: usize) -> impl Iterator<Item = DVec3> + '_ {
        (0..count.min(self.capacity())).map(move |k| self.site(k))
    }
}

/// Outcome of one insertion event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertionReport {
    pub requested: usize,
    pub inserted: usize,
    /// Requested particles that could not be placed without overlap
    pub unplaced: usize,
}

/// Insertion schedule and pending total
pub struct Inserter {
    strategy: Box<dyn InsertionStrategy>,
    params: InsertionParameters,
    inserted: usize,
}

impl Inserter {
    pub fn new(params: &InsertionParameters, diameter: f64) -> Self {
        Self {
            strategy: create_insertion_strategy(params, diameter),
            params: params.clone(),
            inserted: 0,
        }
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn inserted(&self) -> usize {
        self.inserted
    }

    pub fn remaining(&self) -> usize {
        self.params.total_particles.saturating_sub(self.inserted)
    }

    pub fn initial_velocity(&self) -> DVec3 {
        self.params.initial_velocity
    }

    /// Insertion happens when `step % frequency == 1`, every step for a
    /// frequency of one, and only while particles remain to be inserted
    pub fn is_insertion_step(&self, step: u64) -> bool {
        let frequency = self.params.insertion_frequency;
        self.remaining() > 0 && (frequency == 1 || step % frequency == 1)
    }

    /// Requested count and candidate positions of the next event
    pub fn next_batch(&mut self) -> (usize, Vec<DVec3>) {
        let requested = self.params.particles_per_insertion.min(self.remaining());
        (requested, self.strategy.positions(requested))
    }

    pub fn record(&mut self, requested: usize, inserted: usize) -> InsertionReport {
        self.inserted += inserted;
        InsertionReport {
            requested,
            inserted,
            unplaced: requested.saturating_sub(inserted),
        }
    }
}

use glam::DVec3;

use super::{InsertionLattice, InsertionStrategy};

/// Places particles on the insertion lattice
#[derive(Debug, Clone)]
pub struct UniformInsertion {
    lattice: InsertionLattice,
}

impl UniformInsertion {
    pub fn new(lattice: InsertionLattice) -> Self {
        Self { lattice }
    }
}

impl InsertionStrategy for UniformInsertion {
    fn name(&self) -> &'static str {
        "uniform"
    }

    fn positions(&mut self, count: usize) -> Vec<DVec3> {
        self.lattice.sites(count).collect()
    }
}

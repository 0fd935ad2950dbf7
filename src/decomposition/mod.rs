//! Spatial decomposition of the background grid across domains
//!
//! Cells are ordered along a Morton curve and split into contiguous runs of
//! roughly equal weight, one run per domain. The engine feeds the split through
//! the [`CellWeight`] hook so that domains are balanced by particle load.

mod grid;
pub mod morton;

pub use grid::{CartesianGrid, CellBounds, CellId};

use glam::DVec3;

use crate::error::{decomposition_error, DemResult};
use morton::morton_encode;

/// Rank of a domain
pub type DomainId = usize;

/// Weight every cell carries regardless of its particles
pub const BASE_CELL_WEIGHT: u64 = 1000;

/// Cell-weight callback consumed by [`Decomposition::repartition`]
pub trait CellWeight {
    /// Extra work attributed to a cell on top of [`BASE_CELL_WEIGHT`]
    fn cell_weight(&self, cell: CellId) -> u32;
}

/// Outcome of a repartition
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepartitionSummary {
    pub loads_before: Vec<u64>,
    pub loads_after: Vec<u64>,
    pub moved_cells: usize,
}

impl RepartitionSummary {
    /// Ratio of the heaviest domain load to the mean load
    pub fn imbalance_after(&self) -> f64 {
        imbalance(&self.loads_after)
    }

    pub fn imbalance_before(&self) -> f64 {
        imbalance(&self.loads_before)
    }
}

fn imbalance(loads: &[u64]) -> f64 {
    let total: u64 = loads.iter().sum();
    if loads.is_empty() || total == 0 {
        return 1.0;
    }
    let mean = total as f64 / loads.len() as f64;
    loads.iter().copied().max().unwrap_or(0) as f64 / mean
}

/// Ownership of every background cell
#[derive(Debug, Clone)]
pub struct Decomposition {
    grid: CartesianGrid,
    owners: Vec<DomainId>,
    n_domains: usize,
    morton_order: Vec<CellId>,
}

impl Decomposition {
    /// Split the grid into `n_domains` parts of equal cell count
    pub fn new(grid: CartesianGrid, n_domains: usize) -> DemResult<Self> {
        if n_domains == 0 || n_domains > grid.cell_count() {
            return Err(decomposition_error(format!(
                "cannot split {} cells across {} domains",
                grid.cell_count(),
                n_domains
            )));
        }
        let mut morton_order: Vec<CellId> = grid.cells().collect();
        morton_order.sort_by_key(|&cell| {
            let [x, y, z] = grid.coords(cell);
            morton_encode(x, y, z)
        });
        let owners = split_weighted(&morton_order, grid.cell_count(), n_domains, |_| BASE_CELL_WEIGHT);
        let decomposition = Self {
            grid,
            owners,
            n_domains,
            morton_order,
        };
        decomposition.check_consistency()?;
        Ok(decomposition)
    }

    /// Build a decomposition from an explicit ownership table
    pub fn from_owners(grid: CartesianGrid, n_domains: usize, owners: Vec<DomainId>) -> DemResult<Self> {
        let mut decomposition = Self::new(grid, n_domains)?;
        decomposition.owners = owners;
        decomposition.check_consistency()?;
        Ok(decomposition)
    }

    pub fn grid(&self) -> &CartesianGrid {
        &self.grid
    }

    pub fn n_domains(&self) -> usize {
        self.n_domains
    }

    pub fn owner(&self, cell: CellId) -> DomainId {
        self.owners[cell.index()]
    }

    pub fn owner_of(&self, position: DVec3) -> DomainId {
        self.owner(self.grid.locate(position))
    }

    pub fn owned_cells(&self, domain: DomainId) -> Vec<CellId> {
        self.grid
            .cells()
            .filter(|&cell| self.owners[cell.index()] == domain)
            .collect()
    }

    /// Reassign cell ownership so that every domain carries a similar weight
    pub fn repartition(&mut self, weights: &dyn CellWeight) -> DemResult<RepartitionSummary> {
        let cell_load = |cell: CellId| BASE_CELL_WEIGHT + weights.cell_weight(cell) as u64;
        let loads_before = self.domain_loads(&cell_load);

        let owners = split_weighted(&self.morton_order, self.grid.cell_count(), self.n_domains, cell_load);
        let moved_cells = owners
            .iter()
            .zip(self.owners.iter())
            .filter(|(new, old)| new != old)
            .count();
        self.owners = owners;
        self.check_consistency()?;

        Ok(RepartitionSummary {
            loads_before,
            loads_after: self.domain_loads(&cell_load),
            moved_cells,
        })
    }

    fn domain_loads(&self, cell_load: &dyn Fn(CellId) -> u64) -> Vec<u64> {
        let mut loads = vec![0u64; self.n_domains];
        for cell in self.grid.cells() {
            loads[self.owner(cell)] += cell_load(cell);
        }
        loads
    }

    /// Every cell has a valid owner and every domain owns at least one cell
    pub fn check_consistency(&self) -> DemResult<()> {
        if self.owners.len() != self.grid.cell_count() {
            return Err(decomposition_error(format!(
                "ownership table has {} entries for {} cells",
                self.owners.len(),
                self.grid.cell_count()
            )));
        }
        let mut owned = vec![0usize; self.n_domains];
        for (cell, &owner) in self.owners.iter().enumerate() {
            if owner >= self.n_domains {
                return Err(decomposition_error(format!(
                    "cell {} is owned by unknown domain {}",
                    cell, owner
                )));
            }
            owned[owner] += 1;
        }
        if let Some(empty) = owned.iter().position(|&count| count == 0) {
            return Err(decomposition_error(format!("domain {} owns no cells", empty)));
        }
        Ok(())
    }
}

/// Cut an ordered cell list into `n_domains` contiguous runs of similar load.
/// Every run receives at least one cell.
fn split_weighted<F>(order: &[CellId], cell_count: usize, n_domains: usize, load: F) -> Vec<DomainId>
where
    F: Fn(CellId) -> u64,
{
    let total: u64 = order.iter().map(|&cell| load(cell)).sum();
    let mut owners = vec![0; cell_count];
    let mut domain = 0usize;
    let mut in_domain = 0usize;
    let mut accumulated = 0u64;

    for (k, &cell) in order.iter().enumerate() {
        let cells_left = order.len() - k;
        let domains_after = n_domains - domain - 1;
        let boundary = total as u128 * (domain as u128 + 1) / n_domains as u128;
        let reached_share = accumulated as u128 >= boundary;
        let must_advance = cells_left <= domains_after;
        if domains_after > 0 && in_domain > 0 && (reached_share || must_advance) {
            domain += 1;
            in_domain = 0;
        }
        owners[cell.index()] = domain;
        accumulated += load(cell);
        in_domain += 1;
    }
    owners
}

#[cfg(test)]
mod tests {
    use super::*;

    struct HotCorner;

    impl CellWeight for HotCorner {
        fn cell_weight(&self, cell: CellId) -> u32 {
            if cell.0 < 4 {
                50_000
            } else {
                0
            }
        }
    }

    fn grid(n: u32) -> CartesianGrid {
        CartesianGrid::new(DVec3::ZERO, DVec3::ONE, [n, n, n]).unwrap()
    }

    #[test]
    fn test_initial_split_is_even() {
        let decomposition = Decomposition::new(grid(4), 4).unwrap();
        for domain in 0..4 {
            assert_eq!(decomposition.owned_cells(domain).len(), 16);
        }
    }

    #[test]
    fn test_every_domain_owns_a_cell() {
        let decomposition = Decomposition::new(grid(2), 8).unwrap();
        for domain in 0..8 {
            assert_eq!(decomposition.owned_cells(domain).len(), 1);
        }
        assert!(Decomposition::new(grid(2), 9).is_err());
    }

    #[test]
    fn test_repartition_balances_weighted_cells() {
        let mut decomposition = Decomposition::new(grid(4), 4).unwrap();
        let summary = decomposition.repartition(&HotCorner).unwrap();
        assert!(summary.moved_cells > 0);
        assert!(summary.imbalance_after() < summary.imbalance_before());
        assert_eq!(
            summary.loads_before.iter().sum::<u64>(),
            summary.loads_after.iter().sum::<u64>()
        );
        decomposition.check_consistency().unwrap();
    }

    #[test]
    fn test_inconsistent_owner_table_rejected() {
        let g = grid(2);
        assert!(Decomposition::from_owners(g.clone(), 2, vec![0; 8]).is_err());
        assert!(Decomposition::from_owners(g.clone(), 2, vec![0, 1, 2, 0, 1, 0, 1, 0]).is_err());
        assert!(Decomposition::from_owners(g, 2, vec![0; 7]).is_err());
    }
}

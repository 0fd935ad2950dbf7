use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

use crate::decomposition::{CellId, Decomposition, DomainId};
use crate::error::{decomposition_error, DemResult};

/// Neighbor cells of every cell owned by one domain
///
/// The local list of an owned cell holds the cell itself followed by the
/// owned neighbors with a greater id, so each pair of owned cells is visited
/// exactly once. The ghost list holds every neighbor owned by another domain.
#[derive(Debug, Clone, Default)]
pub struct NeighborLists {
    owned_cells: Vec<CellId>,
    local: FxHashMap<CellId, Vec<CellId>>,
    ghost: FxHashMap<CellId, Vec<CellId>>,
}

impl NeighborLists {
    pub fn build(decomposition: &Decomposition, domain: DomainId, interaction_distance: f64) -> DemResult<Self> {
        decomposition.check_consistency()?;
        let owned_cells = decomposition.owned_cells(domain);
        if owned_cells.is_empty() {
            return Err(decomposition_error(format!("domain {} owns no cells", domain)));
        }

        let grid = decomposition.grid();
        let reach = grid.neighbor_reach(interaction_distance);
        let mut local = FxHashMap::default();
        let mut ghost = FxHashMap::default();

        for &cell in &owned_cells {
            let mut local_list = vec![cell];
            let mut ghost_list = Vec::new();
            for neighbor in grid.neighbors(cell, reach) {
                if decomposition.owner(neighbor) == domain {
                    if neighbor > cell {
                        local_list.push(neighbor);
                    }
                } else {
                    ghost_list.push(neighbor);
                }
            }
            local.insert(cell, local_list);
            ghost.insert(cell, ghost_list);
        }

        Ok(Self {
            owned_cells,
            local,
            ghost,
        })
    }

    pub fn owned_cells(&self) -> &[CellId] {
        &self.owned_cells
    }

    pub fn local_neighbors(&self, cell: CellId) -> &[CellId] {
        self.local.get(&cell).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn ghost_neighbors(&self, cell: CellId) -> &[CellId] {
        self.ghost.get(&cell).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.owned_cells.is_empty()
    }

    pub fn clear(&mut self) {
        self.owned_cells.clear();
        self.local.clear();
        self.ghost.clear();
    }
}

/// Owned cells whose particles every other domain needs as ghosts
#[derive(Debug, Clone, Default)]
pub struct GhostPlan {
    sends: BTreeMap<DomainId, Vec<CellId>>,
}

impl GhostPlan {
    pub fn build(decomposition: &Decomposition, domain: DomainId, interaction_distance: f64) -> Self {
        let grid = decomposition.grid();
        let reach = grid.neighbor_reach(interaction_distance);
        let mut sends: BTreeMap<DomainId, Vec<CellId>> = BTreeMap::new();
        for cell in decomposition.owned_cells(domain) {
            let mut receivers: Vec<DomainId> = grid
                .neighbors(cell, reach)
                .into_iter()
                .map(|neighbor| decomposition.owner(neighbor))
                .filter(|&owner| owner != domain)
                .collect();
            receivers.sort_unstable();
            receivers.dedup();
            for receiver in receivers {
                sends.entry(receiver).or_default().push(cell);
            }
        }
        Self { sends }
    }

    /// Cells to ship to a domain (empty when the domains do not touch)
    pub fn cells_for(&self, receiver: DomainId) -> &[CellId] {
        self.sends.get(&receiver).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn receivers(&self) -> impl Iterator<Item = DomainId> + '_ {
        self.sends.keys().copied()
    }

    pub fn clear(&mut self) {
        self.sends.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decomposition::CartesianGrid;
    use glam::DVec3;
    use rustc_hash::FxHashSet;

    fn decomposition(n_domains: usize) -> Decomposition {
        let grid = CartesianGrid::new(DVec3::ZERO, DVec3::ONE, [4, 4, 4]).unwrap();
        Decomposition::new(grid, n_domains).unwrap()
    }

    #[test]
    fn test_single_domain_has_no_ghosts() {
        let decomposition = decomposition(1);
        let lists = NeighborLists::build(&decomposition, 0, 0.2).unwrap();
        assert_eq!(lists.owned_cells().len(), 64);
        for &cell in lists.owned_cells() {
            assert!(lists.ghost_neighbors(cell).is_empty());
            assert_eq!(lists.local_neighbors(cell)[0], cell);
        }
    }

    #[test]
    fn test_each_owned_cell_pair_visited_once() {
        let decomposition = decomposition(1);
        let lists = NeighborLists::build(&decomposition, 0, 0.2).unwrap();
        let mut seen = FxHashSet::default();
        for &cell in lists.owned_cells() {
            for &neighbor in &lists.local_neighbors(cell)[1..] {
                let pair = (cell.min(neighbor), cell.max(neighbor));
                assert!(seen.insert(pair), "pair {:?} visited twice", pair);
            }
        }
        // 4x4x4 grid with a 26-cell stencil: (26 * 8 + 17 * 24 + 11 * 24 + 7 * 8) / 2
        let interior = 8 * 26;
        let faces = 24 * 17;
        let edges = 24 * 11;
        let corners = 8 * 7;
        assert_eq!(seen.len(), (interior + faces + edges + corners) / 2);
    }

    #[test]
    fn test_ghost_lists_mirror_ghost_plans() {
        let decomposition = decomposition(4);
        for domain in 0..4 {
            let lists = NeighborLists::build(&decomposition, domain, 0.2).unwrap();
            for &cell in lists.owned_cells() {
                for &ghost in lists.ghost_neighbors(cell) {
                    let owner = decomposition.owner(ghost);
                    let plan = GhostPlan::build(&decomposition, owner, 0.2);
                    assert!(plan.cells_for(domain).contains(&ghost));
                }
            }
        }
    }

    #[test]
    fn test_domain_without_cells_rejected() {
        let grid = CartesianGrid::new(DVec3::ZERO, DVec3::ONE, [2, 2, 2]).unwrap();
        let decomposition = Decomposition::new(grid, 2).unwrap();
        assert!(NeighborLists::build(&decomposition, 5, 0.2).is_err());
    }
}

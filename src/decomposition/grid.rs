use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::config::DomainParameters;
use crate::error::{decomposition_error, DemResult};

/// Identifier of a background cell (linear index, x fastest)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct CellId(pub u32);

impl CellId {
    pub const INVALID: Self = Self(u32::MAX);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Axis-aligned bounds of a cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellBounds {
    pub min: DVec3,
    pub max: DVec3,
}

impl CellBounds {
    /// Distance from a point to the box (zero inside)
    pub fn distance_to(&self, point: DVec3) -> f64 {
        let clamped = point.clamp(self.min, self.max);
        point.distance(clamped)
    }

    pub fn center(&self) -> DVec3 {
        0.5 * (self.min + self.max)
    }

    pub fn half_diagonal(&self) -> f64 {
        0.5 * (self.max - self.min).length()
    }

    /// True if the box grown by `margin` intersects the other box
    pub fn intersects_expanded(&self, min: DVec3, max: DVec3, margin: f64) -> bool {
        let lo = self.min - DVec3::splat(margin);
        let hi = self.max + DVec3::splat(margin);
        lo.cmple(max).all() && hi.cmpge(min).all()
    }
}

/// Regular Cartesian background grid
#[derive(Debug, Clone)]
pub struct CartesianGrid {
    min: DVec3,
    max: DVec3,
    dims: [u32; 3],
    cell_size: DVec3,
}

impl CartesianGrid {
    pub fn new(min: DVec3, max: DVec3, dims: [u32; 3]) -> DemResult<Self> {
        if dims.iter().any(|&n| n == 0) || min.cmpge(max).any() {
            return Err(decomposition_error(format!(
                "empty grid: min {:?}, max {:?}, cells {:?}",
                min, max, dims
            )));
        }
        let cell_size = (max - min) / DVec3::new(dims[0] as f64, dims[1] as f64, dims[2] as f64);
        Ok(Self { min, max, dims, cell_size })
    }

    pub fn from_parameters(params: &DomainParameters) -> DemResult<Self> {
        Self::new(params.min, params.max, params.cells)
    }

    pub fn min(&self) -> DVec3 {
        self.min
    }

    pub fn max(&self) -> DVec3 {
        self.max
    }

    pub fn dims(&self) -> [u32; 3] {
        self.dims
    }

    pub fn cell_size(&self) -> DVec3 {
        self.cell_size
    }

    pub fn cell_count(&self) -> usize {
        self.dims.iter().map(|&n| n as usize).product()
    }

    pub fn cells(&self) -> impl Iterator<Item = CellId> {
        (0..self.cell_count() as u32).map(CellId)
    }

    pub fn coords(&self, cell: CellId) -> [u32; 3] {
        let [nx, ny, _] = self.dims;
        let i = cell.0;
        [i % nx, (i / nx) % ny, i / (nx * ny)]
    }

    pub fn cell_at(&self, coords: [u32; 3]) -> CellId {
        let [nx, ny, _] = self.dims;
        CellId(coords[0] + nx * (coords[1] + ny * coords[2]))
    }

    pub fn contains(&self, position: DVec3) -> bool {
        position.cmpge(self.min).all() && position.cmple(self.max).all()
    }

    /// Cell containing a position; positions outside the grid map to the
    /// nearest boundary cell
    pub fn locate(&self, position: DVec3) -> CellId {
        let relative = (position - self.min) / self.cell_size;
        let mut coords = [0u32; 3];
        for axis in 0..3 {
            let max_index = (self.dims[axis] - 1) as f64;
            let value = relative[axis].floor();
            let clamped = if value.is_nan() { 0.0 } else { value.clamp(0.0, max_index) };
            coords[axis] = clamped as u32;
        }
        self.cell_at(coords)
    }

    pub fn bounds(&self, cell: CellId) -> CellBounds {
        let [x, y, z] = self.coords(cell);
        let min = self.min + DVec3::new(x as f64, y as f64, z as f64) * self.cell_size;
        CellBounds {
            min,
            max: min + self.cell_size,
        }
    }

    /// Number of cell layers needed to cover an interaction distance
    pub fn neighbor_reach(&self, distance: f64) -> u32 {
        let edge = self.cell_size.min_element();
        ((distance / edge).ceil() as u32).max(1)
    }

    /// Every cell within `reach` layers of the given cell, excluding itself
    pub fn neighbors(&self, cell: CellId, reach: u32) -> Vec<CellId> {
        let center = self.coords(cell);
        let reach = reach as i64;
        let mut neighbors = Vec::new();
        for dz in -reach..=reach {
            for dy in -reach..=reach {
                for dx in -reach..=reach {
                    if dx == 0 && dy == 0 && dz == 0 {
                        continue;
                    }
                    let candidate = [
                        center[0] as i64 + dx,
                        center[1] as i64 + dy,
                        center[2] as i64 + dz,
                    ];
                    let inside = candidate
                        .iter()
                        .zip(self.dims.iter())
                        .all(|(&c, &n)| c >= 0 && c < n as i64);
                    if inside {
                        neighbors.push(self.cell_at([
                            candidate[0] as u32,
                            candidate[1] as u32,
                            candidate[2] as u32,
                        ]));
                    }
                }
            }
        }
        neighbors
    }
}

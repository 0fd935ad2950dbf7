//! Boundary geometry eligible for particle-boundary contact
//!
//! The catalog holds the faces, points and lines of the simulation boundary.
//! Each domain associates the features with the owned cells they can reach so
//! the broad phase only tests nearby features.

mod features;

pub use features::{BoundaryFace, BoundaryFeatureId, BoundaryLine, BoundaryPoint, FeatureDistance};

use glam::DVec3;
use rustc_hash::FxHashMap;

use crate::config::{BoundaryParameters, DomainParameters};
use crate::decomposition::{CartesianGrid, CellBounds, CellId};
use crate::error::{config_error, DemResult};

/// Every boundary feature of the simulation
#[derive(Debug, Clone, Default)]
pub struct BoundaryCatalog {
    faces: Vec<BoundaryFace>,
    points: Vec<BoundaryPoint>,
    lines: Vec<BoundaryLine>,
}

impl BoundaryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the catalog from the box walls (when enabled) and extra features
    pub fn from_config(boundary: &BoundaryParameters, domain: &DomainParameters) -> DemResult<Self> {
        let mut catalog = Self::new();
        if domain.walls {
            for vertices in box_walls(domain.min, domain.max) {
                catalog.add_face(vertices)?;
            }
        }
        for face in &boundary.faces {
            catalog.add_face(face.vertices.clone())?;
        }
        for point in &boundary.points {
            catalog.add_point(point.position)?;
        }
        for line in &boundary.lines {
            catalog.add_line(line.start, line.end)?;
        }
        log::debug!(
            "Boundary catalog: {} faces, {} points, {} lines",
            catalog.faces.len(),
            catalog.points.len(),
            catalog.lines.len()
        );
        Ok(catalog)
    }

    pub fn add_face(&mut self, vertices: Vec<DVec3>) -> DemResult<BoundaryFeatureId> {
        let id = self.faces.len() as u32;
        self.faces.push(BoundaryFace::new(id, vertices)?);
        Ok(BoundaryFeatureId::Face(id))
    }

    pub fn add_point(&mut self, position: DVec3) -> DemResult<BoundaryFeatureId> {
        if !position.is_finite() {
            return Err(config_error("boundary point must be finite"));
        }
        let id = self.points.len() as u32;
        self.points.push(BoundaryPoint { id, position });
        Ok(BoundaryFeatureId::Point(id))
    }

    pub fn add_line(&mut self, start: DVec3, end: DVec3) -> DemResult<BoundaryFeatureId> {
        let id = self.lines.len() as u32;
        self.lines.push(BoundaryLine::new(id, start, end)?);
        Ok(BoundaryFeatureId::Line(id))
    }

    pub fn faces(&self) -> &[BoundaryFace] {
        &self.faces
    }

    pub fn feature_count(&self) -> usize {
        self.faces.len() + self.points.len() + self.lines.len()
    }

    /// Distance from a particle to a feature, if the feature can be touched
    pub fn distance(&self, feature: BoundaryFeatureId, center: DVec3, radius: f64) -> Option<FeatureDistance> {
        match feature {
            BoundaryFeatureId::Face(id) => self.faces.get(id as usize)?.distance(center, radius),
            BoundaryFeatureId::Point(id) => self.points.get(id as usize)?.distance(center),
            BoundaryFeatureId::Line(id) => self.lines.get(id as usize)?.distance(center),
        }
    }

    /// True if a particle anywhere in the cell could come within `reach` of the feature
    fn reaches(&self, feature: BoundaryFeatureId, bounds: &CellBounds, reach: f64) -> bool {
        let center = bounds.center();
        let slack = bounds.half_diagonal() + reach;
        match feature {
            BoundaryFeatureId::Face(id) => {
                let face = &self.faces[id as usize];
                let (min, max) = face.bounding_box();
                bounds.intersects_expanded(min, max, reach) && face.signed_distance(center).abs() <= slack
            }
            BoundaryFeatureId::Point(id) => bounds.distance_to(self.points[id as usize].position) <= reach,
            BoundaryFeatureId::Line(id) => {
                let line = &self.lines[id as usize];
                let min = line.start.min(line.end);
                let max = line.start.max(line.end);
                bounds.intersects_expanded(min, max, reach)
                    && line.closest_point(center).distance(center) <= slack
            }
        }
    }

    fn feature_ids(&self) -> impl Iterator<Item = BoundaryFeatureId> + '_ {
        let faces = (0..self.faces.len() as u32).map(BoundaryFeatureId::Face);
        let points = (0..self.points.len() as u32).map(BoundaryFeatureId::Point);
        let lines = (0..self.lines.len() as u32).map(BoundaryFeatureId::Line);
        faces.chain(points).chain(lines)
    }

    /// Associate features with the given cells
    pub fn associate(&self, grid: &CartesianGrid, cells: &[CellId], reach: f64) -> BoundaryCells {
        let mut features = FxHashMap::default();
        for &cell in cells {
            let bounds = grid.bounds(cell);
            let near: Vec<BoundaryFeatureId> = self
                .feature_ids()
                .filter(|&feature| self.reaches(feature, &bounds, reach))
                .collect();
            if !near.is_empty() {
                features.insert(cell, near);
            }
        }
        BoundaryCells { features }
    }
}

/// Features registered on each owned cell
#[derive(Debug, Clone, Default)]
pub struct BoundaryCells {
    features: FxHashMap<CellId, Vec<BoundaryFeatureId>>,
}

impl BoundaryCells {
    pub fn features(&self, cell: CellId) -> &[BoundaryFeatureId] {
        self.features.get(&cell).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn boundary_cell_count(&self) -> usize {
        self.features.len()
    }

    pub fn clear(&mut self) {
        self.features.clear();
    }
}

/// The six faces of an axis-aligned box with normals pointing inward
pub fn box_walls(min: DVec3, max: DVec3) -> Vec<Vec<DVec3>> {
    let (x0, y0, z0) = (min.x, min.y, min.z);
    let (x1, y1, z1) = (max.x, max.y, max.z);
    vec![
        // z = min
        vec![
            DVec3::new(x0, y0, z0),
            DVec3::new(x1, y0, z0),
            DVec3::new(x1, y1, z0),
            DVec3::new(x0, y1, z0),
        ],
        // z = max
        vec![
            DVec3::new(x0, y0, z1),
            DVec3::new(x0, y1, z1),
            DVec3::new(x1, y1, z1),
            DVec3::new(x1, y0, z1),
        ],
        // x = min
        vec![
            DVec3::new(x0, y0, z0),
            DVec3::new(x0, y1, z0),
            DVec3::new(x0, y1, z1),
            DVec3::new(x0, y0, z1),
        ],
        // x = max
        vec![
            DVec3::new(x1, y0, z0),
            DVec3::new(x1, y0, z1),
            DVec3::new(x1, y1, z1),
            DVec3::new(x1, y1, z0),
        ],
        // y = min
        vec![
            DVec3::new(x0, y0, z0),
            DVec3::new(x0, y0, z1),
            DVec3::new(x1, y0, z1),
            DVec3::new(x1, y0, z0),
        ],
        // y = max
        vec![
            DVec3::new(x0, y1, z0),
            DVec3::new(x1, y1, z0),
            DVec3::new(x1, y1, z1),
            DVec3::new(x0, y1, z1),
        ],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FaceParameters, LineParameters};

    fn unit_domain() -> DomainParameters {
        DomainParameters {
            min: DVec3::ZERO,
            max: DVec3::ONE,
            cells: [4, 4, 4],
            subdomains: 1,
            walls: true,
        }
    }

    #[test]
    fn test_box_walls_point_inward() {
        let catalog = BoundaryCatalog::from_config(&BoundaryParameters::default(), &unit_domain()).unwrap();
        assert_eq!(catalog.faces().len(), 6);
        let center = DVec3::splat(0.5);
        for face in catalog.faces() {
            assert!((face.signed_distance(center) - 0.5).abs() < 1e-12);
        }
    }

    #[test]
    fn test_malformed_feature_is_config_error() {
        let boundary = BoundaryParameters {
            faces: vec![FaceParameters {
                vertices: vec![DVec3::ZERO, DVec3::X],
            }],
            ..Default::default()
        };
        let err = BoundaryCatalog::from_config(&boundary, &unit_domain()).unwrap_err();
        assert!(matches!(err, crate::error::DemError::Config { .. }));

        let boundary = BoundaryParameters {
            lines: vec![LineParameters {
                start: DVec3::ONE,
                end: DVec3::ONE,
            }],
            ..Default::default()
        };
        assert!(BoundaryCatalog::from_config(&boundary, &unit_domain()).is_err());
    }

    #[test]
    fn test_association_only_near_walls() {
        let domain = unit_domain();
        let catalog = BoundaryCatalog::from_config(&BoundaryParameters::default(), &domain).unwrap();
        let grid = CartesianGrid::from_parameters(&domain).unwrap();
        let cells: Vec<CellId> = grid.cells().collect();
        let association = catalog.associate(&grid, &cells, 0.05);

        let interior = grid.cell_at([1, 1, 1]);
        assert!(association.features(interior).is_empty());
        let corner = grid.cell_at([0, 0, 0]);
        assert_eq!(association.features(corner).len(), 3);
        let face_cell = grid.cell_at([1, 1, 0]);
        assert_eq!(association.features(face_cell), &[BoundaryFeatureId::Face(0)]);
        // 64 cells minus the 8 interior ones
        assert_eq!(association.boundary_cell_count(), 56);
    }
}

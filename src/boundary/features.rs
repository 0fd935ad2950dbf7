use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::error::{config_error, DemResult};

/// Identifier of a boundary feature a particle can touch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BoundaryFeatureId {
    Face(u32),
    Point(u32),
    Line(u32),
}

/// Distance from a particle center to a boundary feature
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureDistance {
    /// Center-to-feature distance; negative when the center is behind a face
    pub distance: f64,
    /// Unit vector from the particle center toward the feature
    pub normal: DVec3,
}

impl FeatureDistance {
    pub fn overlap(&self, radius: f64) -> f64 {
        radius - self.distance
    }
}

const GEOMETRY_TOLERANCE: f64 = 1e-9;

/// Planar convex polygon; the normal points to the side particles live on
#[derive(Debug, Clone)]
pub struct BoundaryFace {
    pub id: u32,
    vertices: Vec<DVec3>,
    normal: DVec3,
    min: DVec3,
    max: DVec3,
}

impl BoundaryFace {
    pub fn new(id: u32, vertices: Vec<DVec3>) -> DemResult<Self> {
        if vertices.len() < 3 {
            return Err(config_error(format!(
                "boundary face {} needs at least 3 vertices, got {}",
                id,
                vertices.len()
            )));
        }
        if vertices.iter().any(|v| !v.is_finite()) {
            return Err(config_error(format!("boundary face {} has a non-finite vertex", id)));
        }
        let raw_normal = (vertices[1] - vertices[0]).cross(vertices[2] - vertices[0]);
        let scale = vertices
            .iter()
            .map(|v| v.distance(vertices[0]))
            .fold(0.0f64, f64::max);
        if raw_normal.length() <= GEOMETRY_TOLERANCE * scale * scale {
            return Err(config_error(format!("boundary face {} is degenerate", id)));
        }
        let normal = raw_normal.normalize();

        for vertex in &vertices {
            if (*vertex - vertices[0]).dot(normal).abs() > GEOMETRY_TOLERANCE * scale.max(1.0) {
                return Err(config_error(format!("boundary face {} is not planar", id)));
            }
        }
        let n = vertices.len();
        for k in 0..n {
            let a = vertices[k];
            let b = vertices[(k + 1) % n];
            let c = vertices[(k + 2) % n];
            if (b - a).cross(c - b).dot(normal) <= 0.0 {
                return Err(config_error(format!(
                    "boundary face {} is not a convex counter-clockwise polygon",
                    id
                )));
            }
        }

        let min = vertices.iter().copied().fold(DVec3::splat(f64::INFINITY), DVec3::min);
        let max = vertices.iter().copied().fold(DVec3::splat(f64::NEG_INFINITY), DVec3::max);
        Ok(Self {
            id,
            vertices,
            normal,
            min,
            max,
        })
    }

    pub fn normal(&self) -> DVec3 {
        self.normal
    }

    pub fn vertices(&self) -> &[DVec3] {
        &self.vertices
    }

    pub fn bounding_box(&self) -> (DVec3, DVec3) {
        (self.min, self.max)
    }

    pub fn signed_distance(&self, point: DVec3) -> f64 {
        (point - self.vertices[0]).dot(self.normal)
    }

    fn projection_inside(&self, projected: DVec3) -> bool {
        let n = self.vertices.len();
        (0..n).all(|k| {
            let a = self.vertices[k];
            let b = self.vertices[(k + 1) % n];
            let edge = b - a;
            edge.cross(projected - a).dot(self.normal) >= -GEOMETRY_TOLERANCE * edge.length()
        })
    }

    /// Distance from a particle center whose projection falls on the face.
    /// Particles entirely behind the face do not interact with it.
    pub fn distance(&self, center: DVec3, radius: f64) -> Option<FeatureDistance> {
        let signed = self.signed_distance(center);
        if signed <= -radius {
            return None;
        }
        let projected = center - signed * self.normal;
        if !self.projection_inside(projected) {
            return None;
        }
        Some(FeatureDistance {
            distance: signed,
            normal: -self.normal,
        })
    }
}

/// Isolated boundary vertex (e.g. a convex corner)
#[derive(Debug, Clone, Copy)]
pub struct BoundaryPoint {
    pub id: u32,
    pub position: DVec3,
}

impl BoundaryPoint {
    pub fn distance(&self, center: DVec3) -> Option<FeatureDistance> {
        towards(center, self.position)
    }
}

/// Boundary edge segment
#[derive(Debug, Clone, Copy)]
pub struct BoundaryLine {
    pub id: u32,
    pub start: DVec3,
    pub end: DVec3,
}

impl BoundaryLine {
    pub fn new(id: u32, start: DVec3, end: DVec3) -> DemResult<Self> {
        if !start.is_finite() || !end.is_finite() || start.distance(end) <= GEOMETRY_TOLERANCE {
            return Err(config_error(format!("boundary line {} is degenerate", id)));
        }
        Ok(Self { id, start, end })
    }

    pub fn closest_point(&self, point: DVec3) -> DVec3 {
        let axis = self.end - self.start;
        let t = ((point - self.start).dot(axis) / axis.length_squared()).clamp(0.0, 1.0);
        self.start + t * axis
    }

    pub fn distance(&self, center: DVec3) -> Option<FeatureDistance> {
        towards(center, self.closest_point(center))
    }
}

fn towards(center: DVec3, target: DVec3) -> Option<FeatureDistance> {
    let offset = target - center;
    let distance = offset.length();
    if distance <= GEOMETRY_TOLERANCE {
        return None;
    }
    Some(FeatureDistance {
        distance,
        normal: offset / distance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floor() -> BoundaryFace {
        BoundaryFace::new(
            0,
            vec![
                DVec3::new(0.0, 0.0, 0.0),
                DVec3::new(1.0, 0.0, 0.0),
                DVec3::new(1.0, 1.0, 0.0),
                DVec3::new(0.0, 1.0, 0.0),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_face_normal_follows_winding() {
        assert_eq!(floor().normal(), DVec3::Z);
    }

    #[test]
    fn test_face_distance_inside_and_outside() {
        let face = floor();
        let hit = face.distance(DVec3::new(0.5, 0.5, 0.1), 0.2).unwrap();
        assert!((hit.distance - 0.1).abs() < 1e-12);
        assert!((hit.overlap(0.2) - 0.1).abs() < 1e-12);
        assert_eq!(hit.normal, -DVec3::Z);
        assert!(face.distance(DVec3::new(1.5, 0.5, 0.1), 0.2).is_none());
        assert!(face.distance(DVec3::new(0.5, 0.5, -0.3), 0.2).is_none());
    }

    #[test]
    fn test_malformed_faces_rejected() {
        assert!(BoundaryFace::new(1, vec![DVec3::ZERO, DVec3::X]).is_err());
        assert!(BoundaryFace::new(2, vec![DVec3::ZERO, DVec3::X, 2.0 * DVec3::X]).is_err());
        // clockwise when seen from +z
        assert!(BoundaryFace::new(
            3,
            vec![DVec3::ZERO, DVec3::Y, DVec3::new(1.0, 1.0, 0.0), DVec3::X, DVec3::new(0.5, -1.0, 0.0)]
        )
        .is_err());
        assert!(BoundaryFace::new(
            4,
            vec![DVec3::ZERO, DVec3::X, DVec3::new(1.0, 1.0, 0.0), DVec3::new(0.0, 1.0, 0.5)]
        )
        .is_err());
    }

    #[test]
    fn test_line_closest_point_clamps_to_segment() {
        let line = BoundaryLine::new(0, DVec3::ZERO, DVec3::X).unwrap();
        assert_eq!(line.closest_point(DVec3::new(0.5, 1.0, 0.0)), DVec3::new(0.5, 0.0, 0.0));
        assert_eq!(line.closest_point(DVec3::new(3.0, 1.0, 0.0)), DVec3::X);
        let hit = line.distance(DVec3::new(0.5, 0.0, 0.3)).unwrap();
        assert!((hit.distance - 0.3).abs() < 1e-12);
        assert!((hit.normal - (-DVec3::Z)).length() < 1e-12);
        assert!(BoundaryLine::new(1, DVec3::X, DVec3::X).is_err());
    }

    #[test]
    fn test_point_distance() {
        let point = BoundaryPoint { id: 0, position: DVec3::ZERO };
        let hit = point.distance(DVec3::new(0.0, 0.4, 0.0)).unwrap();
        assert!((hit.distance - 0.4).abs() < 1e-12);
        assert_eq!(hit.normal, -DVec3::Y);
    }
}

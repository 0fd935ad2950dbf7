use std::f64::consts::PI;
use std::str::FromStr;

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::error::DemError;

/// Time stepping, termination and output cadence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationControlParameters {
    /// Fixed timestep (seconds)
    pub time_step: f64,
    /// Simulation end time (seconds)
    pub time_end: f64,
    /// Steps between output iterations (0 disables output)
    pub output_frequency: u64,
    /// Steps between progression log lines (0 disables them)
    pub log_frequency: u64,
}

impl Default for SimulationControlParameters {
    fn default() -> Self {
        Self {
            time_step: 1.0e-5,
            time_end: 1.0e-2,
            output_frequency: 0,
            log_frequency: 1000,
        }
    }
}

/// Cadences, thresholds and strategy selections of the contact pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelParameters {
    /// Steps between broad/fine contact searches
    pub contact_detection_frequency: u64,
    /// Steps between repartitions; must be a multiple of the detection frequency
    pub repartition_frequency: u64,
    /// Interaction distance in particle diameters
    pub neighborhood_threshold: f64,
    /// Load-balancing weight of one particle (a bare cell weighs 1000)
    pub particle_weight: u32,
    pub pp_contact_force: ContactForceMethod,
    pub pw_contact_force: ContactForceMethod,
    pub integration_method: IntegrationMethod,
}

impl Default for ModelParameters {
    fn default() -> Self {
        Self {
            contact_detection_frequency: 10,
            repartition_frequency: 1000,
            neighborhood_threshold: 1.3,
            particle_weight: 10_000,
            pp_contact_force: ContactForceMethod::Linear,
            pw_contact_force: ContactForceMethod::Linear,
            integration_method: IntegrationMethod::VelocityVerlet,
        }
    }
}

/// Material record shared by every particle and boundary
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicalProperties {
    pub diameter: f64,
    pub density: f64,
    /// Normal spring stiffness of the linear model (N/m)
    pub normal_stiffness: f64,
    pub youngs_modulus: f64,
    pub poisson_ratio: f64,
    pub restitution: f64,
    pub friction: f64,
    pub rolling_friction: f64,
    /// External body force per unit mass (gravity)
    pub body_force: DVec3,
}

impl Default for PhysicalProperties {
    fn default() -> Self {
        Self {
            diameter: 0.005,
            density: 2500.0,
            normal_stiffness: 1.0e3,
            youngs_modulus: 1.0e7,
            poisson_ratio: 0.3,
            restitution: 0.9,
            friction: 0.3,
            rolling_friction: 0.0,
            body_force: DVec3::new(0.0, 0.0, -9.81),
        }
    }
}

impl PhysicalProperties {
    pub fn radius(&self) -> f64 {
        0.5 * self.diameter
    }

    /// Mass of a sphere of the given radius made of this material
    pub fn mass_of(&self, radius: f64) -> f64 {
        self.density * 4.0 / 3.0 * PI * radius.powi(3)
    }

    /// Moment of inertia of a solid sphere
    pub fn moment_of_inertia_of(&self, radius: f64) -> f64 {
        0.4 * self.mass_of(radius) * radius * radius
    }

    /// Distance below which two particles are tracked as neighbors
    pub fn interaction_distance(&self, model: &ModelParameters) -> f64 {
        model.neighborhood_threshold * self.diameter
    }
}

/// Periodic particle insertion
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InsertionParameters {
    pub method: InsertionMethod,
    /// Insertion happens on steps where `step % frequency == 1`
    pub insertion_frequency: u64,
    pub particles_per_insertion: usize,
    pub total_particles: usize,
    pub box_min: DVec3,
    pub box_max: DVec3,
    /// Lattice spacing in particle diameters
    pub distance_threshold: f64,
    /// Random offset amplitude in particle diameters (non-uniform only)
    pub random_range: f64,
    pub seed: u64,
    pub initial_velocity: DVec3,
}

impl Default for InsertionParameters {
    fn default() -> Self {
        Self {
            method: InsertionMethod::Uniform,
            insertion_frequency: 1000,
            particles_per_insertion: 100,
            total_particles: 100,
            box_min: DVec3::new(-0.05, -0.05, 0.0),
            box_max: DVec3::new(0.05, 0.05, 0.05),
            distance_threshold: 2.0,
            random_range: 0.5,
            seed: 19,
            initial_velocity: DVec3::ZERO,
        }
    }
}

/// Cartesian background grid and its split across domains
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainParameters {
    pub min: DVec3,
    pub max: DVec3,
    /// Number of cells along x, y and z
    pub cells: [u32; 3],
    pub subdomains: usize,
    /// Register the six faces of the box as walls
    pub walls: bool,
}

impl Default for DomainParameters {
    fn default() -> Self {
        Self {
            min: DVec3::new(-0.1, -0.1, -0.1),
            max: DVec3::new(0.1, 0.1, 0.1),
            cells: [16, 16, 16],
            subdomains: 1,
            walls: true,
        }
    }
}

/// Additional boundary features beyond the box walls
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundaryParameters {
    pub faces: Vec<FaceParameters>,
    pub points: Vec<PointParameters>,
    pub lines: Vec<LineParameters>,
}

/// Convex planar polygon; vertices are ordered counter-clockwise when seen
/// from the side particles live on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceParameters {
    pub vertices: Vec<DVec3>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointParameters {
    pub position: DVec3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineParameters {
    pub start: DVec3,
    pub end: DVec3,
}

/// Reporting options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputParameters {
    pub timer: TimerMode,
    /// Append an id-ordered `x y z` particle listing to the run summary
    pub test_mode: bool,
}

impl Default for OutputParameters {
    fn default() -> Self {
        Self {
            timer: TimerMode::End,
            test_mode: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactForceMethod {
    Linear,
    Nonlinear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationMethod {
    ExplicitEuler,
    VelocityVerlet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertionMethod {
    Uniform,
    NonUniform,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerMode {
    None,
    Iteration,
    End,
}

impl FromStr for ContactForceMethod {
    type Err = DemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "linear" => Ok(Self::Linear),
            "nonlinear" => Ok(Self::Nonlinear),
            other => Err(DemError::UnknownSelection {
                category: "contact force model",
                value: other.to_string(),
            }),
        }
    }
}

impl FromStr for IntegrationMethod {
    type Err = DemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "explicit_euler" => Ok(Self::ExplicitEuler),
            "velocity_verlet" => Ok(Self::VelocityVerlet),
            other => Err(DemError::UnknownSelection {
                category: "integration method",
                value: other.to_string(),
            }),
        }
    }
}

impl FromStr for InsertionMethod {
    type Err = DemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uniform" => Ok(Self::Uniform),
            "non_uniform" => Ok(Self::NonUniform),
            other => Err(DemError::UnknownSelection {
                category: "insertion method",
                value: other.to_string(),
            }),
        }
    }
}

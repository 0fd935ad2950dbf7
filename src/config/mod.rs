//! Simulation configuration
//!
//! The configuration is a TOML document split into sections mirroring the
//! engine's collaborators. Every section has defaults so a file only needs to
//! state what differs. [`DemConfig::validate`] enforces the startup invariants
//! and is called by the solver before any timestep runs.

mod parameters;

pub use parameters::{
    BoundaryParameters, ContactForceMethod, DomainParameters, FaceParameters,
    InsertionMethod, InsertionParameters, IntegrationMethod, LineParameters, ModelParameters,
    OutputParameters, PhysicalProperties, PointParameters, SimulationControlParameters,
    TimerMode,
};

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{config_error, DemResult};

/// Largest per-axis cell count addressable by the Morton partitioner
const MAX_CELLS_PER_AXIS: u32 = 1 << 21;

/// Complete engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DemConfig {
    pub simulation_control: SimulationControlParameters,
    pub model: ModelParameters,
    pub physical_properties: PhysicalProperties,
    pub insertion: Option<InsertionParameters>,
    pub domain: DomainParameters,
    pub boundary: BoundaryParameters,
    pub output: OutputParameters,
}

impl DemConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(text: &str) -> DemResult<Self> {
        let config: DemConfig = toml::from_str(text)?;
        Ok(config)
    }

    /// Load a configuration file
    pub fn load(path: impl AsRef<Path>) -> DemResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// Check every configuration invariant
    pub fn validate(&self) -> DemResult<()> {
        self.validate_simulation_control()?;
        self.validate_model()?;
        self.validate_physical_properties()?;
        self.validate_domain()?;
        if let Some(insertion) = &self.insertion {
            self.validate_insertion(insertion)?;
        }
        Ok(())
    }

    fn validate_simulation_control(&self) -> DemResult<()> {
        let control = &self.simulation_control;
        if !(control.time_step.is_finite() && control.time_step > 0.0) {
            return Err(config_error(format!(
                "time step must be positive, got {}",
                control.time_step
            )));
        }
        if !(control.time_end.is_finite() && control.time_end > 0.0) {
            return Err(config_error(format!(
                "end time must be positive, got {}",
                control.time_end
            )));
        }
        Ok(())
    }

    fn validate_model(&self) -> DemResult<()> {
        let model = &self.model;
        if model.contact_detection_frequency == 0 {
            return Err(config_error("contact detection frequency must be at least 1"));
        }
        if model.repartition_frequency == 0 {
            return Err(config_error("repartition frequency must be at least 1"));
        }
        if model.repartition_frequency % model.contact_detection_frequency != 0 {
            return Err(config_error(format!(
                "the repartition frequency ({}) must be a multiple of the contact detection frequency ({})",
                model.repartition_frequency, model.contact_detection_frequency
            )));
        }
        if !(model.neighborhood_threshold >= 1.0) {
            return Err(config_error(format!(
                "neighborhood threshold must be at least one diameter, got {}",
                model.neighborhood_threshold
            )));
        }
        Ok(())
    }

    fn validate_physical_properties(&self) -> DemResult<()> {
        let props = &self.physical_properties;
        let positive = [
            ("diameter", props.diameter),
            ("density", props.density),
            ("normal stiffness", props.normal_stiffness),
            ("Young's modulus", props.youngs_modulus),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(config_error(format!("{} must be positive, got {}", name, value)));
            }
        }
        if !(props.poisson_ratio > -1.0 && props.poisson_ratio < 0.5) {
            return Err(config_error(format!(
                "Poisson ratio must lie in (-1, 0.5), got {}",
                props.poisson_ratio
            )));
        }
        if !(props.restitution > 0.0 && props.restitution <= 1.0) {
            return Err(config_error(format!(
                "coefficient of restitution must lie in (0, 1], got {}",
                props.restitution
            )));
        }
        if !(props.friction >= 0.0) || !(props.rolling_friction >= 0.0) {
            return Err(config_error("friction coefficients must be non-negative"));
        }
        if !props.body_force.is_finite() {
            return Err(config_error("body force must be finite"));
        }
        Ok(())
    }

    fn validate_domain(&self) -> DemResult<()> {
        let domain = &self.domain;
        if !domain.min.is_finite() || !domain.max.is_finite() || domain.min.cmpge(domain.max).any() {
            return Err(config_error(format!(
                "domain box is empty: min {:?}, max {:?}",
                domain.min, domain.max
            )));
        }
        if domain.cells.iter().any(|&n| n == 0 || n >= MAX_CELLS_PER_AXIS) {
            return Err(config_error(format!(
                "cell counts must lie in [1, {}), got {:?}",
                MAX_CELLS_PER_AXIS, domain.cells
            )));
        }
        let total_cells: u64 = domain.cells.iter().map(|&n| n as u64).product();
        if total_cells > u32::MAX as u64 {
            return Err(config_error(format!("too many cells: {}", total_cells)));
        }
        if domain.subdomains == 0 || domain.subdomains as u64 > total_cells {
            return Err(config_error(format!(
                "subdomain count must lie in [1, {}], got {}",
                total_cells, domain.subdomains
            )));
        }
        Ok(())
    }

    fn validate_insertion(&self, insertion: &InsertionParameters) -> DemResult<()> {
        if insertion.insertion_frequency == 0 {
            return Err(config_error("insertion frequency must be at least 1"));
        }
        if !(insertion.distance_threshold >= 1.0) {
            return Err(config_error(format!(
                "insertion distance threshold must be at least one diameter, got {}",
                insertion.distance_threshold
            )));
        }
        if !(insertion.random_range >= 0.0) {
            return Err(config_error("insertion random range must be non-negative"));
        }
        if insertion.box_min.cmpge(insertion.box_max).any() {
            return Err(config_error("insertion box is empty"));
        }
        if insertion.box_min.cmplt(self.domain.min).any() || insertion.box_max.cmpgt(self.domain.max).any() {
            return Err(config_error("insertion box must lie inside the domain"));
        }
        if !insertion.initial_velocity.is_finite() {
            return Err(config_error("initial velocity must be finite"));
        }
        Ok(())
    }
}

//! Discrete element method engine for rigid spherical particles
//!
//! Particles are distributed across compute domains that own disjoint sets of
//! background-grid cells. Every timestep the domains exchange ghost copies,
//! detect contacts in a broad and a fine phase, keep persistent per-contact
//! state, evaluate contact forces and integrate the motion. Particles are
//! inserted periodically and the domains are rebalanced by particle load.

pub mod balance;
pub mod boundary;
pub mod comm;
pub mod config;
pub mod contact;
pub mod control;
pub mod decomposition;
pub mod domain;
pub mod error;
pub mod force;
pub mod insertion;
pub mod integration;
pub mod particles;
pub mod profiling;
pub mod solver;

pub use balance::{DomainLoad, LoadBalancer};
pub use boundary::{BoundaryCatalog, BoundaryFeatureId};
pub use config::{ContactForceMethod, DemConfig, InsertionMethod, IntegrationMethod, PhysicalProperties};
pub use contact::{BoundaryKey, ContactKey, ContactObject, ContactRegistry, PairKey};
pub use control::{SimulationControl, TransientControl};
pub use decomposition::{CartesianGrid, CellId, CellWeight, Decomposition, DomainId};
pub use domain::{Cluster, Domain, SimulationContext};
pub use error::{DemError, DemResult};
pub use force::{ContactForceModel, LinearContactForce, NonLinearContactForce};
pub use insertion::{Inserter, InsertionStrategy};
pub use integration::{ExplicitEulerIntegrator, Integrator, VelocityVerletIntegrator};
pub use particles::{Particle, ParticleId};
pub use solver::{DemSolver, RunSummary, StepObserver, StepReport};

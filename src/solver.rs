//! Timestep driver
//!
//! [`DemSolver`] owns the cluster of domains and runs the per-step pipeline:
//! repartition, force reset, insertion, sort and migrate, ghost exchange,
//! contact search, contact forces, integration and output.

use std::fmt;
use std::fmt::Write as _;

use glam::DVec3;

use crate::config::{DemConfig, TimerMode};
use crate::contact::{CandidateCounts, ContactCounts, FineSearchSummary};
use crate::control::{SimulationControl, TransientControl};
use crate::domain::{Cluster, RepartitionReport, SimulationContext};
use crate::error::DemResult;
use crate::insertion::{Inserter, InsertionReport};
use crate::particles::{Particle, ParticleId};
use crate::profiling::{Phase, PhaseTimer};

/// What happened during one timestep
#[derive(Debug, Clone, Default)]
pub struct StepReport {
    pub step: u64,
    pub time: f64,
    /// Particles owned across every domain after the step
    pub particles: usize,
    pub insertion: Option<InsertionReport>,
    pub repartition: Option<RepartitionReport>,
    /// True when sorting, migration and contact search ran this step
    pub detection: bool,
    pub migrated: usize,
    pub candidates: Option<CandidateCounts>,
    pub fine_search: Option<FineSearchSummary>,
    pub contacts: ContactCounts,
    /// Physical contacts, counting each cross-domain pair once
    pub active_contacts: usize,
    pub output: bool,
}

/// Receives step reports and, on output iterations, a particle snapshot
pub trait StepObserver {
    fn on_step(&mut self, _report: &StepReport) {}

    /// Called on output iterations with every particle ordered by id
    fn on_output(&mut self, report: &StepReport, particles: &[Particle]);
}

impl StepObserver for () {
    fn on_output(&mut self, _report: &StepReport, _particles: &[Particle]) {}
}

/// End-of-run report
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub steps: u64,
    pub time: f64,
    pub particles: usize,
    pub inserted: usize,
    /// Insertion attempts that found no free position
    pub unplaced: usize,
    pub repartitions: usize,
    pub active_contacts: usize,
    pub timing: Option<String>,
    /// `x y z` per particle in id order, when test mode is on
    pub positions: Option<String>,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Run summary ===")?;
        writeln!(f, "  steps:           {}", self.steps)?;
        writeln!(f, "  time:            {:.6} s", self.time)?;
        writeln!(f, "  particles:       {}", self.particles)?;
        writeln!(f, "  inserted:        {}", self.inserted)?;
        writeln!(f, "  unplaced:        {}", self.unplaced)?;
        writeln!(f, "  repartitions:    {}", self.repartitions)?;
        writeln!(f, "  active contacts: {}", self.active_contacts)?;
        if let Some(timing) = &self.timing {
            write!(f, "{}", timing)?;
        }
        if let Some(positions) = &self.positions {
            write!(f, "{}", positions)?;
        }
        Ok(())
    }
}

/// Distributed DEM solver
pub struct DemSolver {
    config: DemConfig,
    cluster: Cluster,
    inserter: Option<Inserter>,
    control: Box<dyn SimulationControl>,
    timer: PhaseTimer,
    detection_pending: bool,
    repartitions: usize,
    unplaced: usize,
}

impl DemSolver {
    /// Validate the configuration and build every domain. Configuration
    /// errors surface here, before any timestep runs.
    pub fn new(config: DemConfig) -> DemResult<Self> {
        config.validate()?;
        let ctx = SimulationContext::new(&config)?;
        log::info!(
            "DEM solver: {} domains, {} cells, {} boundary features, {} / {} contact models, {} integrator",
            ctx.decomposition.n_domains(),
            ctx.decomposition.grid().cell_count(),
            ctx.catalog.feature_count(),
            ctx.pp_model.name(),
            ctx.pw_model.name(),
            ctx.integrator.name()
        );
        let cluster = Cluster::new(ctx)?;
        let inserter = config
            .insertion
            .as_ref()
            .map(|params| Inserter::new(params, config.physical_properties.diameter));
        if let Some(inserter) = &inserter {
            log::info!("{} insertion of {} particles", inserter.strategy_name(), inserter.remaining());
        }
        let control = Box::new(TransientControl::new(&config.simulation_control));
        let timer = PhaseTimer::new(config.output.timer);

        Ok(Self {
            config,
            cluster,
            inserter,
            control,
            timer,
            detection_pending: true,
            repartitions: 0,
            unplaced: 0,
        })
    }

    /// Replace the default transient control; the timestep of every step is
    /// taken from the control
    pub fn with_control(mut self, control: Box<dyn SimulationControl>) -> Self {
        self.control = control;
        self
    }

    pub fn config(&self) -> &DemConfig {
        &self.config
    }

    pub fn cluster(&self) -> &Cluster {
        &self.cluster
    }

    pub fn step(&self) -> u64 {
        self.control.step()
    }

    /// Place one particle outside the insertion schedule
    pub fn place_particle(
        &mut self,
        position: DVec3,
        velocity: DVec3,
        angular_velocity: DVec3,
    ) -> DemResult<Option<ParticleId>> {
        let placed = self.cluster.place_particle(position, velocity, angular_velocity)?;
        if placed.is_some() {
            self.detection_pending = true;
        }
        Ok(placed)
    }

    pub fn particle(&self, id: ParticleId) -> Option<&Particle> {
        self.cluster.particle(id)
    }

    pub fn snapshot(&self) -> Vec<Particle> {
        self.cluster.snapshot()
    }

    pub fn solve(&mut self) -> DemResult<RunSummary> {
        self.solve_with(&mut ())
    }

    /// Run to the end, reporting every step to `observer`
    pub fn solve_with(&mut self, observer: &mut dyn StepObserver) -> DemResult<RunSummary> {
        while let Some(report) = self.advance()? {
            observer.on_step(&report);
            if report.output {
                let snapshot = self.cluster.snapshot();
                self.timer.time(Phase::Output, || observer.on_output(&report, &snapshot));
            }
        }
        let summary = self.summary();
        log::info!(
            "Finished after {} steps: {} particles, {} active contacts",
            summary.steps,
            summary.particles,
            summary.active_contacts
        );
        Ok(summary)
    }

    /// Run one timestep; `None` once the run is complete
    pub fn advance(&mut self) -> DemResult<Option<StepReport>> {
        if !self.control.integrate() {
            return Ok(None);
        }
        let step = self.control.step();
        let dt = self.control.time_step();
        let contact_detection_frequency = self.config.model.contact_detection_frequency;
        let repartition_frequency = self.config.model.repartition_frequency;
        let mut report = StepReport {
            step,
            time: self.control.time(),
            ..Default::default()
        };

        let cluster = &mut self.cluster;
        let timer = &mut self.timer;

        if step % repartition_frequency == 0 {
            let repartition = timer.time(Phase::Repartition, || cluster.repartition())?;
            self.repartitions += 1;
            self.detection_pending = true;
            report.migrated += repartition.migrated;
            report.repartition = Some(repartition);
        }

        cluster.reset_forces();

        let mut inserted_any = false;
        if let Some(inserter) = self.inserter.as_mut() {
            if inserter.is_insertion_step(step) {
                let insertion = timer.time(Phase::Insertion, || -> DemResult<InsertionReport> {
                    let (requested, positions) = inserter.next_batch();
                    let inserted = cluster.insert_batch(&positions, inserter.initial_velocity())?;
                    Ok(inserter.record(requested, inserted))
                })?;
                if insertion.unplaced > 0 {
                    self.unplaced += insertion.unplaced;
                    log::warn!(
                        "Step {}: {} of {} particles could not be placed without overlap",
                        step,
                        insertion.unplaced,
                        insertion.requested
                    );
                }
                log::info!(
                    "Step {}: inserted {} particles, {} remaining",
                    step,
                    insertion.inserted,
                    inserter.remaining()
                );
                inserted_any = insertion.inserted > 0;
                report.insertion = Some(insertion);
            }
        }

        report.detection = inserted_any || step % contact_detection_frequency == 0 || self.detection_pending;
        if report.detection {
            report.migrated += timer.time(Phase::Migration, || cluster.sort_and_migrate())?;
        }

        timer.time(Phase::GhostExchange, || cluster.exchange_ghosts())?;

        if report.detection {
            let candidates = timer.time(Phase::BroadSearch, || cluster.broad_search());
            let fine_search = timer.time(Phase::FineSearch, || cluster.fine_search())?;
            log::debug!(
                "Step {}: candidates pp {} / wall {} / point {} / line {}",
                step,
                candidates.particle_particle,
                candidates.particle_wall,
                candidates.particle_point,
                candidates.particle_line
            );
            report.candidates = Some(candidates);
            report.fine_search = Some(fine_search);
            self.detection_pending = false;
        }

        timer.time(Phase::ContactForces, || cluster.compute_forces(dt))?;
        timer.time(Phase::Integration, || cluster.integrate(dt));

        report.particles = cluster.particle_count();
        report.contacts = cluster.contact_counts();
        report.active_contacts = cluster.active_contacts();
        report.output = self.control.is_output_iteration();

        if self.control.is_log_iteration() {
            log::info!(
                "Step {} (t = {:.6} s): {} particles, {} active contacts",
                step,
                report.time,
                report.particles,
                report.active_contacts
            );
            if timer.mode() == TimerMode::Iteration {
                log::info!("{}", timer.report());
            }
        }
        Ok(Some(report))
    }

    /// Current run state as a summary
    pub fn summary(&self) -> RunSummary {
        let timing = (self.timer.mode() != TimerMode::None).then(|| self.timer.report());
        let positions = self.config.output.test_mode.then(|| {
            let mut listing = String::new();
            for particle in self.cluster.snapshot() {
                let p = particle.position;
                let _ = writeln!(listing, "{:.5} {:.5} {:.5}", p.x, p.y, p.z);
            }
            listing
        });
        RunSummary {
            steps: self.control.step(),
            time: self.control.time(),
            particles: self.cluster.particle_count(),
            inserted: self.inserter.as_ref().map_or(0, Inserter::inserted),
            unplaced: self.unplaced,
            repartitions: self.repartitions,
            active_contacts: self.cluster.active_contacts(),
            timing,
            positions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{InsertionMethod, InsertionParameters};

    fn config() -> DemConfig {
        let mut config = DemConfig::default();
        config.simulation_control.time_step = 1.0e-4;
        config.simulation_control.time_end = 2.0e-3;
        config.simulation_control.output_frequency = 5;
        config.model.contact_detection_frequency = 4;
        config.model.repartition_frequency = 8;
        config.domain.subdomains = 2;
        config.output.timer = TimerMode::None;
        config
    }

    struct Recorder {
        steps: Vec<StepReport>,
        outputs: Vec<(u64, usize)>,
    }

    impl StepObserver for Recorder {
        fn on_step(&mut self, report: &StepReport) {
            self.steps.push(report.clone());
        }

        fn on_output(&mut self, report: &StepReport, particles: &[Particle]) {
            assert!(particles.windows(2).all(|pair| pair[0].id < pair[1].id));
            self.outputs.push((report.step, particles.len()));
        }
    }

    #[test]
    fn test_cadences() {
        let mut config = config();
        config.insertion = Some(InsertionParameters {
            method: InsertionMethod::Uniform,
            insertion_frequency: 7,
            particles_per_insertion: 4,
            total_particles: 8,
            box_min: DVec3::new(-0.05, -0.05, 0.0),
            box_max: DVec3::new(0.05, 0.05, 0.05),
            initial_velocity: DVec3::new(0.0, 0.0, -10.0),
            ..Default::default()
        });
        let mut solver = DemSolver::new(config).unwrap();
        let mut recorder = Recorder {
            steps: Vec::new(),
            outputs: Vec::new(),
        };
        let summary = solver.solve_with(&mut recorder).unwrap();

        assert_eq!(summary.steps, 20);
        assert_eq!(summary.particles, 8);
        assert_eq!(summary.unplaced, 0);

        let detections: Vec<u64> = recorder.steps.iter().filter(|r| r.detection).map(|r| r.step).collect();
        assert_eq!(detections, vec![1, 4, 8, 12, 16, 20]);
        let insertions: Vec<u64> = recorder
            .steps
            .iter()
            .filter(|r| r.insertion.is_some())
            .map(|r| r.step)
            .collect();
        assert_eq!(insertions, vec![1, 8]);
        let repartitions: Vec<u64> = recorder
            .steps
            .iter()
            .filter(|r| r.repartition.is_some())
            .map(|r| r.step)
            .collect();
        assert_eq!(repartitions, vec![8, 16]);
        assert_eq!(recorder.outputs, vec![(5, 4), (10, 8), (15, 8), (20, 8)]);
    }

    #[test]
    fn test_test_mode_lists_positions_in_id_order() {
        let mut config = config();
        config.output.test_mode = true;
        config.simulation_control.time_end = 1.0e-4;
        let mut solver = DemSolver::new(config).unwrap();
        solver
            .place_particle(DVec3::new(0.05, 0.0, 0.0), DVec3::ZERO, DVec3::ZERO)
            .unwrap();
        solver
            .place_particle(DVec3::new(-0.05, 0.0, 0.0), DVec3::ZERO, DVec3::ZERO)
            .unwrap();
        let summary = solver.solve().unwrap();
        let listing = summary.positions.unwrap();
        let lines: Vec<&str> = listing.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("0.05000"));
        assert!(lines[1].starts_with("-0.05000"));
    }

    /// Ten steps of a millisecond regardless of the configured timestep
    struct CoarseControl {
        step: u64,
    }

    impl SimulationControl for CoarseControl {
        fn integrate(&mut self) -> bool {
            if self.step >= 10 {
                return false;
            }
            self.step += 1;
            true
        }

        fn step(&self) -> u64 {
            self.step
        }

        fn time(&self) -> f64 {
            self.step as f64 * self.time_step()
        }

        fn time_step(&self) -> f64 {
            1.0e-3
        }

        fn is_output_iteration(&self) -> bool {
            false
        }

        fn is_log_iteration(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_injected_control_sets_the_timestep() {
        let mut config = config();
        config.simulation_control.time_step = 1.0e-6;
        config.physical_properties.body_force = DVec3::ZERO;
        let mut solver = DemSolver::new(config)
            .unwrap()
            .with_control(Box::new(CoarseControl { step: 0 }));
        let id = solver
            .place_particle(DVec3::ZERO, DVec3::new(-1.0, 0.0, 0.0), DVec3::ZERO)
            .unwrap()
            .unwrap();
        let summary = solver.solve().unwrap();

        assert_eq!(summary.steps, 10);
        assert!((summary.time - 0.01).abs() < 1e-12);
        let x = solver.particle(id).unwrap().position.x;
        assert!((x + 0.01).abs() < 1e-12, "x = {}", x);
    }
}

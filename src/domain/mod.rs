//! One compute domain and the shared simulation context
//!
//! A [`Domain`] owns the particles of its cells and every cache derived from
//! the decomposition: neighbor lists, the ghost-send plan, boundary
//! associations, contact candidates and contact collections. It talks to the
//! other domains only through its mailbox.

mod cluster;

pub use cluster::{Cluster, RepartitionReport};

use glam::DVec3;

use crate::balance::DomainLoad;
use crate::boundary::{BoundaryCatalog, BoundaryCells};
use crate::comm::{Mailbox, Packet, PacketKind, ParticlePacket};
use crate::config::{DemConfig, ModelParameters, PhysicalProperties};
use crate::contact::{
    broad_search, CandidateCounts, ContactCandidates, ContactCounts, ContactRegistry, FineSearchSummary,
    GhostPlan, NeighborLists,
};
use crate::decomposition::{CartesianGrid, Decomposition, DomainId};
use crate::error::{invariant_violation, DemResult};
use crate::force::{
    compute_particle_boundary_forces, compute_particle_particle_forces, create_force_model, ContactForceModel,
};
use crate::integration::{create_integrator, Integrator};
use crate::particles::{Particle, ParticleStore};

/// Run-scoped state shared read-only by every domain during a phase
pub struct SimulationContext {
    pub decomposition: Decomposition,
    pub catalog: BoundaryCatalog,
    pub properties: PhysicalProperties,
    pub model: ModelParameters,
    pub pp_model: Box<dyn ContactForceModel>,
    pub pw_model: Box<dyn ContactForceModel>,
    pub integrator: Box<dyn Integrator>,
}

impl SimulationContext {
    /// Build the context from a validated configuration
    pub fn new(config: &DemConfig) -> DemResult<Self> {
        let grid = CartesianGrid::from_parameters(&config.domain)?;
        let decomposition = Decomposition::new(grid, config.domain.subdomains)?;
        let catalog = BoundaryCatalog::from_config(&config.boundary, &config.domain)?;
        Ok(Self {
            decomposition,
            catalog,
            properties: config.physical_properties.clone(),
            model: config.model.clone(),
            pp_model: create_force_model(config.model.pp_contact_force),
            pw_model: create_force_model(config.model.pw_contact_force),
            integrator: create_integrator(config.model.integration_method),
        })
    }

    pub fn interaction_distance(&self) -> f64 {
        self.properties.interaction_distance(&self.model)
    }

    /// Largest gap at which a candidate is still tracked between searches
    pub fn search_margin(&self) -> f64 {
        self.interaction_distance() - self.properties.diameter
    }
}

/// Particles and contact bookkeeping of one domain
#[derive(Debug)]
pub struct Domain {
    rank: DomainId,
    store: ParticleStore,
    neighbors: NeighborLists,
    ghost_plan: GhostPlan,
    boundary_cells: BoundaryCells,
    candidates: ContactCandidates,
    contacts: ContactRegistry,
    mailbox: Mailbox,
}

impl Domain {
    pub fn new(mailbox: Mailbox) -> Self {
        Self {
            rank: mailbox.rank(),
            store: ParticleStore::new(),
            neighbors: NeighborLists::default(),
            ghost_plan: GhostPlan::default(),
            boundary_cells: BoundaryCells::default(),
            candidates: ContactCandidates::default(),
            contacts: ContactRegistry::new(),
            mailbox,
        }
    }

    pub fn rank(&self) -> DomainId {
        self.rank
    }

    pub fn store(&self) -> &ParticleStore {
        &self.store
    }

    pub fn contacts(&self) -> &ContactRegistry {
        &self.contacts
    }

    pub fn candidates(&self) -> &ContactCandidates {
        &self.candidates
    }

    pub fn neighbors(&self) -> &NeighborLists {
        &self.neighbors
    }

    pub fn contact_counts(&self) -> ContactCounts {
        self.contacts.counts()
    }

    /// Recompute every cache derived from the decomposition
    pub fn rebuild_topology(&mut self, ctx: &SimulationContext) -> DemResult<()> {
        let reach = ctx.interaction_distance();
        self.neighbors = NeighborLists::build(&ctx.decomposition, self.rank, reach)?;
        self.ghost_plan = GhostPlan::build(&ctx.decomposition, self.rank, reach);
        self.boundary_cells = ctx
            .catalog
            .associate(ctx.decomposition.grid(), self.neighbors.owned_cells(), reach);
        log::debug!(
            "Domain {}: {} owned cells, {} near boundaries, ghosts sent to {:?}",
            self.rank,
            self.neighbors.owned_cells().len(),
            self.boundary_cells.boundary_cell_count(),
            self.ghost_plan.receivers().collect::<Vec<_>>()
        );
        Ok(())
    }

    /// Drop every decomposition-dependent cache. Contact history is kept
    /// only as seeds for the next fine search.
    pub fn invalidate(&mut self) {
        self.neighbors.clear();
        self.ghost_plan.clear();
        self.boundary_cells.clear();
        self.candidates.clear();
        self.contacts.invalidate();
    }

    pub fn reset_forces(&mut self) {
        self.store.reset_forces();
    }

    /// True if a particle at `position` would overlap no owned or ghost
    /// particle. Ghost copies are `ghost_lag` seconds old, so each one is
    /// widened by the distance it can have covered since.
    pub fn accepts(&self, position: DVec3, radius: f64, ghost_lag: f64) -> bool {
        self.store.locals().iter().all(|p| !p.overlaps(position, radius))
            && self
                .store
                .ghosts()
                .iter()
                .all(|p| !p.overlaps(position, radius + p.velocity.length() * ghost_lag))
    }

    /// Batch indices of the insertion proposals routed to this domain that
    /// clear every owned and ghost particle
    pub fn screen(&self, proposals: &[(usize, DVec3)], radius: f64, ghost_lag: f64) -> Vec<usize> {
        proposals
            .iter()
            .filter(|&&(_, position)| self.accepts(position, radius, ghost_lag))
            .map(|&(index, _)| index)
            .collect()
    }

    pub fn insert(&mut self, particle: Particle) -> DemResult<()> {
        self.store.insert_local(particle)
    }

    /// Re-sort owned particles into cells and post the ones owned elsewhere,
    /// with their contact history, to their new owners
    pub fn post_migrants(&mut self, ctx: &SimulationContext, round: u64) -> DemResult<usize> {
        let grid = ctx.decomposition.grid();
        for particle in self.store.locals_mut() {
            particle.cell = grid.locate(particle.position);
        }
        let rank = self.rank;
        let leaving = self
            .store
            .extract_locals(|p| ctx.decomposition.owner(p.cell) != rank);

        let mut outgoing: Vec<Vec<ParticlePacket>> = vec![Vec::new(); self.mailbox.domain_count()];
        let count = leaving.len();
        for particle in leaving {
            let owner = ctx.decomposition.owner(particle.cell);
            outgoing[owner].push(ParticlePacket {
                history: self.contacts.history_for(particle.id),
                particle,
            });
        }
        for peer in self.mailbox.peers() {
            let packets = std::mem::take(&mut outgoing[peer]);
            self.mailbox.post(peer, round, &Packet::Migration(packets))?;
        }
        Ok(count)
    }

    /// Adopt the particles posted to this domain and order locals by cell
    pub fn collect_migrants(&mut self, ctx: &SimulationContext, round: u64) -> DemResult<usize> {
        let mut received = 0;
        for (from, packet) in self.mailbox.collect(round, PacketKind::Migration)? {
            let Packet::Migration(packets) = packet else {
                continue;
            };
            for ParticlePacket { particle, history } in packets {
                if ctx.decomposition.owner(particle.cell) != self.rank {
                    return Err(invariant_violation(format!(
                        "domain {} received particle {} from domain {} for a cell it does not own",
                        self.rank, particle.id, from
                    )));
                }
                self.store.insert_local(particle)?;
                self.contacts.add_seeds(history);
                received += 1;
            }
        }
        self.store.sort_locals();
        Ok(received)
    }

    /// Post copies of the particles every neighbor domain needs
    pub fn post_ghosts(&self, round: u64) -> DemResult<()> {
        for peer in self.mailbox.peers() {
            let cells = self.ghost_plan.cells_for(peer);
            let copies: Vec<Particle> = if cells.is_empty() {
                Vec::new()
            } else {
                self.store
                    .locals()
                    .iter()
                    .filter(|p| cells.binary_search(&p.cell).is_ok())
                    .copied()
                    .collect()
            };
            self.mailbox.post(peer, round, &Packet::Ghosts(copies))?;
        }
        Ok(())
    }

    /// Replace the ghost copies with the ones just received
    pub fn collect_ghosts(&mut self, round: u64) -> DemResult<()> {
        let mut ghosts = Vec::new();
        for (_, packet) in self.mailbox.collect(round, PacketKind::Ghosts)? {
            if let Packet::Ghosts(copies) = packet {
                ghosts.extend(copies);
            }
        }
        self.store.replace_ghosts(ghosts);
        Ok(())
    }

    pub fn broad_search(&mut self) -> CandidateCounts {
        self.candidates = broad_search(&self.store, &self.neighbors, &self.boundary_cells);
        self.candidates.counts()
    }

    pub fn fine_search(&mut self, ctx: &SimulationContext) -> DemResult<FineSearchSummary> {
        self.contacts
            .fine_search(&self.candidates, &self.store, &ctx.catalog, ctx.search_margin())
    }

    /// Refresh tracked contacts at the current positions and accumulate
    /// particle-particle then particle-boundary forces
    pub fn compute_forces(&mut self, ctx: &SimulationContext, dt: f64) -> DemResult<()> {
        self.contacts.refresh(&self.store, &ctx.catalog)?;
        compute_particle_particle_forces(
            &mut self.contacts,
            &mut self.store,
            ctx.pp_model.as_ref(),
            &ctx.properties,
            dt,
        )?;
        compute_particle_boundary_forces(
            &mut self.contacts,
            &mut self.store,
            ctx.pw_model.as_ref(),
            &ctx.properties,
            dt,
        )
    }

    pub fn integrate(&mut self, ctx: &SimulationContext, dt: f64) {
        ctx.integrator
            .integrate(self.store.locals_mut(), ctx.properties.body_force, dt);
    }

    pub fn measure_load(&self, ctx: &SimulationContext) -> DomainLoad {
        DomainLoad::measure(self.rank, self.store.locals(), ctx.model.particle_weight)
    }
}

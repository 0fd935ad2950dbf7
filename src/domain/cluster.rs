use glam::DVec3;
use rayon::prelude::*;

use super::{Domain, SimulationContext};
use crate::balance::{DomainLoad, LoadBalancer};
use crate::comm::mailbox_network;
use crate::contact::{CandidateCounts, ContactCounts, FineSearchSummary};
use crate::decomposition::RepartitionSummary;
use crate::error::{invariant_violation, DemResult};
use crate::particles::{Particle, ParticleId};

/// Outcome of a repartition
#[derive(Debug, Clone, Default)]
pub struct RepartitionReport {
    pub summary: RepartitionSummary,
    /// Particles that changed owner
    pub migrated: usize,
}

/// Coordinator of the collective phases across every domain
///
/// Each phase runs the per-domain work in parallel. Exchanges are split in a
/// post pass and a collect pass so that every packet of a round is in flight
/// before any domain reads its mailbox.
pub struct Cluster {
    ctx: SimulationContext,
    domains: Vec<Domain>,
    next_id: u64,
    round: u64,
    /// Time integrated since the last ghost exchange
    ghost_lag: f64,
}

impl Cluster {
    pub fn new(ctx: SimulationContext) -> DemResult<Self> {
        let domains = mailbox_network(ctx.decomposition.n_domains())
            .into_iter()
            .map(Domain::new)
            .collect();
        let mut cluster = Self {
            ctx,
            domains,
            next_id: 0,
            round: 0,
            ghost_lag: 0.0,
        };
        cluster.rebuild_topology()?;
        Ok(cluster)
    }

    pub fn context(&self) -> &SimulationContext {
        &self.ctx
    }

    pub fn domains(&self) -> &[Domain] {
        &self.domains
    }

    pub fn particle_count(&self) -> usize {
        self.domains.iter().map(|d| d.store().local_count()).sum()
    }

    /// Every owned particle, ordered by id
    pub fn snapshot(&self) -> Vec<Particle> {
        let mut particles: Vec<Particle> = self
            .domains
            .iter()
            .flat_map(|d| d.store().locals().iter().copied())
            .collect();
        particles.sort_by_key(|p| p.id);
        particles
    }

    pub fn particle(&self, id: ParticleId) -> Option<&Particle> {
        self.domains.iter().find_map(|d| {
            if d.store().is_local(id) {
                d.store().get(id)
            } else {
                None
            }
        })
    }

    /// Contact collections summed over every domain
    pub fn contact_counts(&self) -> ContactCounts {
        self.domains.iter().fold(ContactCounts::default(), |acc, d| {
            let counts = d.contact_counts();
            ContactCounts {
                local: acc.local + counts.local,
                ghost: acc.ghost + counts.ghost,
                boundary: acc.boundary + counts.boundary,
            }
        })
    }

    /// Physical contacts in the whole system. A pair across two domains
    /// is held by both of them.
    pub fn active_contacts(&self) -> usize {
        let counts = self.contact_counts();
        counts.local + counts.ghost / 2 + counts.boundary
    }

    fn next_round(&mut self) -> u64 {
        self.round += 1;
        self.round
    }

    fn rebuild_topology(&mut self) -> DemResult<()> {
        let ctx = &self.ctx;
        self.domains
            .par_iter_mut()
            .try_for_each(|domain| domain.rebuild_topology(ctx))
    }

    pub fn reset_forces(&mut self) {
        self.domains.par_iter_mut().for_each(Domain::reset_forces);
    }

    /// Place one particle if it clears the particles known to its owner
    pub fn place_particle(
        &mut self,
        position: DVec3,
        velocity: DVec3,
        angular_velocity: DVec3,
    ) -> DemResult<Option<ParticleId>> {
        let grid = self.ctx.decomposition.grid();
        if !grid.contains(position) {
            return Ok(None);
        }
        let radius = self.ctx.properties.radius();
        let cell = grid.locate(position);
        let owner = self.ctx.decomposition.owner(cell);
        if !self.domains[owner].accepts(position, radius, self.ghost_lag) {
            return Ok(None);
        }

        let id = ParticleId(self.next_id);
        self.next_id += 1;
        let mut particle = Particle::new(id, position, radius, &self.ctx.properties)
            .with_velocity(velocity)
            .with_angular_velocity(angular_velocity);
        particle.cell = cell;
        self.domains[owner].insert(particle)?;
        Ok(Some(id))
    }

    /// Route an insertion batch to the owning domains and insert every
    /// position that overlaps nothing. Ids follow batch order.
    pub fn insert_batch(&mut self, positions: &[DVec3], velocity: DVec3) -> DemResult<usize> {
        let grid = self.ctx.decomposition.grid();
        let radius = self.ctx.properties.radius();
        let ghost_lag = self.ghost_lag;

        let mut routed: Vec<Vec<(usize, DVec3)>> = vec![Vec::new(); self.domains.len()];
        for (index, &position) in positions.iter().enumerate() {
            if grid.contains(position) {
                routed[self.ctx.decomposition.owner(grid.locate(position))].push((index, position));
            }
        }

        let screened: Vec<Vec<usize>> = self
            .domains
            .par_iter()
            .zip(routed.par_iter())
            .map(|(domain, proposals)| domain.screen(proposals, radius, ghost_lag))
            .collect();
        let mut accepted: Vec<usize> = screened.into_iter().flatten().collect();
        accepted.sort_unstable();

        let contact_distance_sq = (2.0 * radius) * (2.0 * radius);
        let mut placed: Vec<usize> = Vec::with_capacity(accepted.len());
        for index in accepted {
            let position = positions[index];
            if placed
                .iter()
                .all(|&other| positions[other].distance_squared(position) >= contact_distance_sq)
            {
                placed.push(index);
            }
        }

        for &index in &placed {
            let position = positions[index];
            let cell = self.ctx.decomposition.grid().locate(position);
            let owner = self.ctx.decomposition.owner(cell);
            let mut particle = Particle::new(ParticleId(self.next_id), position, radius, &self.ctx.properties)
                .with_velocity(velocity);
            particle.cell = cell;
            self.next_id += 1;
            self.domains[owner].insert(particle)?;
        }
        Ok(placed.len())
    }

    /// Sort particles into cells and hand each one to the domain owning its cell
    pub fn sort_and_migrate(&mut self) -> DemResult<usize> {
        let round = self.next_round();
        let ctx = &self.ctx;
        let sent: Vec<usize> = self
            .domains
            .par_iter_mut()
            .map(|domain| domain.post_migrants(ctx, round))
            .collect::<DemResult<_>>()?;
        let received: Vec<usize> = self
            .domains
            .par_iter_mut()
            .map(|domain| domain.collect_migrants(ctx, round))
            .collect::<DemResult<_>>()?;

        let sent: usize = sent.iter().sum();
        let received: usize = received.iter().sum();
        if sent != received {
            return Err(invariant_violation(format!(
                "{} particles left their domains but {} arrived",
                sent, received
            )));
        }
        Ok(sent)
    }

    /// Replace every domain's ghost copies with the owners' current state
    pub fn exchange_ghosts(&mut self) -> DemResult<()> {
        let round = self.next_round();
        self.domains
            .par_iter_mut()
            .try_for_each(|domain| domain.post_ghosts(round))?;
        self.domains
            .par_iter_mut()
            .try_for_each(|domain| domain.collect_ghosts(round))?;
        self.ghost_lag = 0.0;
        Ok(())
    }

    pub fn broad_search(&mut self) -> CandidateCounts {
        self.domains
            .par_iter_mut()
            .map(Domain::broad_search)
            .reduce(CandidateCounts::default, |a, b| CandidateCounts {
                particle_particle: a.particle_particle + b.particle_particle,
                particle_wall: a.particle_wall + b.particle_wall,
                particle_point: a.particle_point + b.particle_point,
                particle_line: a.particle_line + b.particle_line,
            })
    }

    pub fn fine_search(&mut self) -> DemResult<FineSearchSummary> {
        let ctx = &self.ctx;
        let summaries: Vec<FineSearchSummary> = self
            .domains
            .par_iter_mut()
            .map(|domain| domain.fine_search(ctx))
            .collect::<DemResult<_>>()?;
        Ok(summaries
            .into_iter()
            .fold(FineSearchSummary::default(), |acc, s| FineSearchSummary {
                created: acc.created + s.created,
                carried: acc.carried + s.carried,
                tracked: acc.tracked + s.tracked,
            }))
    }

    pub fn compute_forces(&mut self, dt: f64) -> DemResult<()> {
        let ctx = &self.ctx;
        self.domains
            .par_iter_mut()
            .try_for_each(|domain| domain.compute_forces(ctx, dt))
    }

    pub fn integrate(&mut self, dt: f64) {
        let ctx = &self.ctx;
        self.domains.par_iter_mut().for_each(|domain| domain.integrate(ctx, dt));
        self.ghost_lag += dt;
    }

    /// Rebalance cell ownership by particle load and move particles and
    /// contact history to their new owners
    pub fn repartition(&mut self) -> DemResult<RepartitionReport> {
        let before = self.particle_count();
        let ctx = &self.ctx;
        let loads: Vec<DomainLoad> = self
            .domains
            .par_iter()
            .map(|domain| domain.measure_load(ctx))
            .collect();
        let balancer = LoadBalancer::from_loads(&loads);
        let summary = self.ctx.decomposition.repartition(&balancer)?;

        self.domains.par_iter_mut().for_each(Domain::invalidate);
        self.rebuild_topology()?;
        let migrated = self.sort_and_migrate()?;
        self.check_conservation(before)?;

        log::info!(
            "Repartitioned: {} cells moved, {} particles migrated, imbalance {:.3} -> {:.3}",
            summary.moved_cells,
            migrated,
            summary.imbalance_before(),
            summary.imbalance_after()
        );
        log::debug!("Domain loads {:?} -> {:?}", summary.loads_before, summary.loads_after);
        Ok(RepartitionReport { summary, migrated })
    }

    /// Fail unless exactly `expected` particles exist with unique ids
    pub fn check_conservation(&self, expected: usize) -> DemResult<()> {
        let mut ids: Vec<ParticleId> = self
            .domains
            .iter()
            .flat_map(|d| d.store().locals().iter().map(|p| p.id))
            .collect();
        if ids.len() != expected {
            return Err(invariant_violation(format!(
                "expected {} particles, found {}",
                expected,
                ids.len()
            )));
        }
        ids.sort_unstable();
        if let Some(pair) = ids.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(invariant_violation(format!("particle {} is owned twice", pair[0])));
        }
        Ok(())
    }
}

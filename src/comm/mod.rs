//! Message exchange between domains
//!
//! Domains never share particle memory. Each one owns a [`Mailbox`] wired to
//! every other domain through unbounded channels; packets travel as bincode
//! bytes inside an [`Envelope`]. An exchange is collective: in every exchange
//! round each domain posts exactly one packet of a kind to every other domain
//! and collects one packet of that kind from each of them.

mod packet;

pub use packet::{Packet, PacketKind, ParticlePacket};

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::decomposition::DomainId;
use crate::error::{DemError, DemResult, ExchangeContext};

/// Encoded packet with its routing header
#[derive(Debug, Clone)]
pub struct Envelope {
    pub from: DomainId,
    pub round: u64,
    pub kind: PacketKind,
    pub payload: Vec<u8>,
}

/// Endpoint of one domain
#[derive(Debug)]
pub struct Mailbox {
    rank: DomainId,
    outboxes: Vec<Sender<Envelope>>,
    inbox: Receiver<Envelope>,
    stash: Vec<Envelope>,
}

/// Create fully connected mailboxes for `n_domains` domains
pub fn mailbox_network(n_domains: usize) -> Vec<Mailbox> {
    let (senders, receivers): (Vec<_>, Vec<_>) = (0..n_domains).map(|_| unbounded()).unzip();
    receivers
        .into_iter()
        .enumerate()
        .map(|(rank, inbox)| Mailbox {
            rank,
            outboxes: senders.clone(),
            inbox,
            stash: Vec::new(),
        })
        .collect()
}

impl Mailbox {
    pub fn rank(&self) -> DomainId {
        self.rank
    }

    pub fn domain_count(&self) -> usize {
        self.outboxes.len()
    }

    /// Every other domain, in rank order
    pub fn peers(&self) -> impl Iterator<Item = DomainId> + '_ {
        (0..self.outboxes.len()).filter(move |&rank| rank != self.rank)
    }

    pub fn post(&self, to: DomainId, round: u64, packet: &Packet) -> DemResult<()> {
        let outbox = self.outboxes.get(to).ok_or_else(|| DemError::Exchange {
            message: format!("domain {} posted to unknown domain {}", self.rank, to),
        })?;
        let payload = packet.to_bytes().exchange_context("encoding packet")?;
        outbox
            .send(Envelope {
                from: self.rank,
                round,
                kind: packet.kind(),
                payload,
            })
            .exchange_context("posting packet")
    }

    /// Collect one packet of `kind` for `round` from every peer, in rank order.
    /// Every peer must have posted before this is called.
    pub fn collect(&mut self, round: u64, kind: PacketKind) -> DemResult<Vec<(DomainId, Packet)>> {
        self.stash.extend(self.inbox.try_iter());

        let mut matching = Vec::new();
        let mut remaining = Vec::with_capacity(self.stash.len());
        for envelope in self.stash.drain(..) {
            if envelope.round == round && envelope.kind == kind {
                matching.push(envelope);
            } else {
                remaining.push(envelope);
            }
        }
        self.stash = remaining;
        matching.sort_by_key(|envelope| envelope.from);

        let expected: Vec<DomainId> = self.peers().collect();
        let received: Vec<DomainId> = matching.iter().map(|envelope| envelope.from).collect();
        if received != expected {
            return Err(DemError::Exchange {
                message: format!(
                    "domain {} expected {:?} packets from {:?} in round {}, got {:?}",
                    self.rank, kind, expected, round, received
                ),
            });
        }

        matching
            .into_iter()
            .map(|envelope| {
                let packet = Packet::from_bytes(&envelope.payload).exchange_context("decoding packet")?;
                if packet.kind() != kind {
                    return Err(DemError::Exchange {
                        message: format!("packet from domain {} does not match its header", envelope.from),
                    });
                }
                Ok((envelope.from, packet))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PhysicalProperties;
    use crate::particles::{Particle, ParticleId};
    use glam::DVec3;

    #[test]
    fn test_collect_from_every_peer() {
        let mut network = mailbox_network(3);
        let props = PhysicalProperties::default();
        for mailbox in &network {
            for peer in mailbox.peers() {
                let ghost = Particle::new(ParticleId(mailbox.rank() as u64), DVec3::ZERO, 0.01, &props);
                mailbox.post(peer, 4, &Packet::Ghosts(vec![ghost])).unwrap();
            }
        }

        let received = network[1].collect(4, PacketKind::Ghosts).unwrap();
        let senders: Vec<DomainId> = received.iter().map(|(from, _)| *from).collect();
        assert_eq!(senders, vec![0, 2]);
        match &received[1].1 {
            Packet::Ghosts(particles) => assert_eq!(particles[0].id, ParticleId(2)),
            other => panic!("unexpected packet {:?}", other.kind()),
        }
    }

    #[test]
    fn test_missing_packet_is_exchange_error() {
        let mut network = mailbox_network(2);
        network[0].post(1, 1, &Packet::Migration(Vec::new())).unwrap();
        let err = network[0].collect(1, PacketKind::Migration).unwrap_err();
        assert!(matches!(err, DemError::Exchange { .. }));
    }

    #[test]
    fn test_other_rounds_stay_queued() {
        let mut network = mailbox_network(2);
        network[1].post(0, 7, &Packet::Ghosts(Vec::new())).unwrap();
        network[1].post(0, 8, &Packet::Ghosts(Vec::new())).unwrap();
        assert_eq!(network[0].collect(7, PacketKind::Ghosts).unwrap().len(), 1);
        assert_eq!(network[0].collect(8, PacketKind::Ghosts).unwrap().len(), 1);
    }
}

use serde::{Deserialize, Serialize};

use crate::contact::ContactRecord;
use crate::particles::Particle;

/// Particle leaving its domain together with the history of its contacts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticlePacket {
    pub particle: Particle,
    pub history: Vec<ContactRecord>,
}

/// Payload exchanged between domains
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Packet {
    /// Particles changing owner
    Migration(Vec<ParticlePacket>),
    /// Read-only copies of particles near the receiver's cells
    Ghosts(Vec<Particle>),
}

/// Packet kind used to match sends with receives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PacketKind {
    Migration,
    Ghosts,
}

impl Packet {
    pub fn kind(&self) -> PacketKind {
        match self {
            Packet::Migration(_) => PacketKind::Migration,
            Packet::Ghosts(_) => PacketKind::Ghosts,
        }
    }

    /// Serialize packet to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize packet from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}

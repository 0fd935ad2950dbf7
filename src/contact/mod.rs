//! Contact detection and persistent contact state
//!
//! Detection runs in two phases. The broad phase walks the neighbor lists of
//! the owned cells and emits conservative candidates. The fine phase measures
//! the candidates, rebuilds the contact collections and keeps the tangential
//! history of contacts that are confirmed again.

mod broad;
mod fine;
mod neighbors;
mod pair;

pub use broad::{broad_search, CandidateCounts, ContactCandidates};
pub use fine::{
    boundary_geometry, pair_geometry, ContactCounts, ContactGeometry, ContactRegistry, FineSearchSummary,
};
pub use neighbors::{GhostPlan, NeighborLists};
pub use pair::{BoundaryKey, ContactKey, ContactObject, ContactRecord, PairKey};

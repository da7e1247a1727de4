//! Associative memory
//!
//! Workers store what they learn here so later planning requests can reuse
//! it. Records are chunked on sentence boundaries, routed to one of seven
//! partitions by kind and retrieved with token-overlap scoring.

pub mod chunker;
pub mod gateway;
pub mod record;
pub mod search;
pub mod stats;
pub mod store;

pub use chunker::Chunker;
pub use gateway::{
    AddOutcome, GatewayStatus, KindSelector, MemoryGateway, MemoryQuery, QueryOutcome,
    MEMORY_NAMESPACE,
};
pub use record::{Fragment, MemoryDraft, MemoryKind, MemoryRecord, Metadata};
pub use search::ScoredFragment;
pub use stats::GatewayStats;
pub use store::{PartitionDescriptor, PartitionSummary};

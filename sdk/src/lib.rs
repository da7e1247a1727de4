//! Tripsquad SDK
//!
//! Shared contracts for the tripsquad engine: the error taxonomy, the
//! injectable clock and the snapshot persistence interface.

/// Error types and handling
pub mod errors;

/// Injectable time source
pub mod clock;

/// Snapshot persistence interface
pub mod snapshot;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use errors::{SquadError, SquadErrorExt, ValidationError};
pub use snapshot::{InMemorySnapshotStore, SnapshotStore};

//! Domain layer: registry, election, and proposal resolution, pure and
//! synchronous.

pub mod election;
pub mod error;
pub mod proposals;
pub mod registry;

pub use election::{ElectionState, QueenState};
pub use error::{QueenError, QueenResult};
pub use proposals::resolve_outcome;
pub use registry::WorkerRegistry;

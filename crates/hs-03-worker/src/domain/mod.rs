//! Domain layer: worker state machine and directive queue, pure and
//! synchronous.

pub mod core;
pub mod error;

pub use core::{WorkerCore, WorkerState};
pub use error::{WorkerError, WorkerResult};

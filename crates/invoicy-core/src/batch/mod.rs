//! Bounded-concurrency batch processing.

mod coordinator;

pub use coordinator::BatchCoordinator;

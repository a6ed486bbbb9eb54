//! Orphan sweep: removes files under the media directory that no media row
//! references, and the scheduler that runs it periodically.

mod scheduler;
mod sweep;

pub use scheduler::SweepScheduler;
pub use sweep::{OrphanSweep, ReferencedFiles, SweepStats};

//! Fetch, send and convert pipeline.
//!
//! Three stages run concurrently and hand work to each other through the
//! filesystem:
//! 1. Fetch writes each region's artifacts into `fetched/<REGION>/`
//! 2. Send pushes fetched artifacts one at a time and moves them to `sent/<REGION>/`
//! 3. Convert turns sent artifacts into final outputs in the destination
//!
//! An artifact is done for a stage once `<artifact>.done` exists next to it.
//! Markers are created atomically and never removed, so an interrupted run
//! resumes where it stopped.

mod claim;
mod error;
mod item;
mod layout;
mod marker;
mod orchestrator;
mod progress;
mod properties;
mod signal;
mod stages;
mod version;

#[cfg(test)]
mod testing;

pub use layout::PipelineLayout;
pub use marker::MARKER_SUFFIX;
pub use orchestrator::Pipeline;
pub use progress::progress;

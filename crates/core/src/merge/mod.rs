//! Merge simulation and conflict-region extraction.
//!
//! The merge subsystem is responsible for:
//! 1. **Simulation** -- computing a three-way merge entirely in memory and
//!    reporting which paths it cannot auto-resolve.
//! 2. **Region extraction** -- turning each conflicted path into the ordered
//!    set of line ranges where the two sides truly diverge.

pub mod regions;
pub mod simulate;

pub use regions::{extract_regions, ConflictRegion};
pub use simulate::{simulate, SimulatedConflict, Simulation};

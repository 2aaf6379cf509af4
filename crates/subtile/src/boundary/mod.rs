//! Region boundary bookkeeping.
//!
//! Purpose
//! - `BreakdownTree`: the catalogue of ordered edge decompositions, shared
//!   read-only during a run and merged (witness marks) at aggregation time.
//! - `BoundaryTracker`: mutable per-state coverage of the three region sides,
//!   with the left-to-right frontier rule and reversible piece application.

mod tracker;
mod tree;

pub use tracker::{BoundaryTracker, CoverReject, CoverSlot, Incidence, SideTracker};
pub use tree::{BreakdownNode, BreakdownTree, WitnessedPath, NIL};

#[cfg(test)]
mod tests;

//! The backtracking search over partial tilings.
//!
//! Purpose
//! - `SearchState`: one node of the search tree, with exact-inverse place
//!   and remove so a state can be walked deep and restored bit for bit.
//! - `Cursor`: the enumeration order over (prototile, chirality, glue side)
//!   at a frontier edge.
//! - `CompletedPatch`: a fully covered region together with the edge and
//!   boundary data a substitution rule is read off from.
//!
//! `SearchState::run` drives the whole thing: depth first, iterative, and
//! interruptible. When the deadline flag is set the state clones itself into
//! spawned work units instead of descending, so an interrupted run plus its
//! spawns visits exactly the subtrees the uninterrupted run would have.

mod cursor;
mod patch;
mod state;

pub use cursor::Cursor;
pub use patch::CompletedPatch;
pub use state::{RunOutput, SearchState};

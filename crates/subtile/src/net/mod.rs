//! Multi-process runs over TCP.
//!
//! Purpose
//! - One coordinator ([`Server`]) owns the search: it seeds the tree, runs
//!   units on its own pool, and deals pending units to any number of workers
//!   ([`work`]) that dial in.
//! - Workers are stateless helpers. They rebuild the identical `Problem`
//!   from the shared params, so states and ids line up without ever sending
//!   the geometry over the wire; a worker can join, crash, or leave at any
//!   point and the coordinator reassigns whatever it held.
//!
//! Framing is newline-delimited JSON ([`proto`]); every socket runs with a
//! read timeout so both sides keep up their periodic duties between
//! messages.

mod client;
mod proto;
mod server;

pub use client::work;
pub use proto::{Message, MsgReader, NetError};
pub use server::{ServeOpts, Server};

/// Interval between progress lines on a long run, both sides.
pub(crate) const REPORT_EVERY: std::time::Duration = std::time::Duration::from_secs(15);

#[cfg(test)]
mod tests;

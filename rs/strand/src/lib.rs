//! # strand: a group-based pub/sub track model
//!
//! A track is a named, ordered sequence of groups published by one producer
//! and fanned out to any number of subscribers.
//! A group is an append-only sequence of frames, identified by a strictly
//! increasing sequence number.
//!
//! Producers and consumers are independent handles: every consumer gets its
//! own read cursor, and every wait resolves when the producer side finishes,
//! aborts, or is dropped.
//!
//! This crate models the transport in memory; wiring it to a network session
//! is a separate concern.

mod error;
mod model;

pub mod coding;

pub use error::*;
pub use model::*;

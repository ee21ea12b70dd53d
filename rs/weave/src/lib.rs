//! # weave: timestamped media over a group-based track
//!
//! `weave` is a media layer built on top of [`strand`], turning a raw track of
//! groups into an ordered, low-latency frame stream:
//!
//! - **Producer**: packages encoded frames into groups, starting a new group
//!   at every keyframe.
//! - **Consumer**: reassembles concurrently arriving groups into a single
//!   frame stream, skipping groups that fall behind a configurable latency
//!   budget and exposing which time ranges are currently buffered.
//!
//! Encoding and decoding of the media payload itself is out of scope; frames
//! carry opaque bytes plus a presentation timestamp.

mod error;
mod model;

// export the strand version in use
pub use strand;

pub use error::*;
pub use model::*;

//! Encoding and decoding helpers.
//!
//! Integers use the QUIC variable-length encoding: the two most significant
//! bits of the first byte select a 1, 2, 4, or 8 byte encoding, leaving 62
//! usable bits.

mod decode;
mod encode;

pub use decode::*;
pub use encode::*;

// Re-export the bytes crate
pub use bytes::*;

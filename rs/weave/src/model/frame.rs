use bytes::{Bytes, BytesMut};
use derive_more::Debug;

use strand::coding::{Decode, Encode};

use crate::Result;

/// A timestamp representing the presentation time of a media frame.
///
/// This is currently just a type alias for `std::time::Duration`.
pub type Timestamp = std::time::Duration;

/// A media frame with a timestamp and codec-specific payload.
///
/// Frames are the fundamental unit of media data in weave. Each frame contains:
/// - A timestamp when it should be rendered.
/// - A keyframe flag indicating whether this frame can be decoded independently.
/// - A codec-specific payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
	/// The presentation timestamp for this frame.
	///
	/// This indicates when the frame should be displayed relative to the
	/// start of the stream or some other reference point.
	/// This is NOT a wall clock time.
	pub timestamp: Timestamp,

	/// Whether this frame is a keyframe (can be decoded independently).
	///
	/// Keyframes are used as group boundaries and entry points for new subscribers.
	/// The flag is never written to the wire: the first frame of a group is
	/// the keyframe, by position.
	pub keyframe: bool,

	/// The encoded media data for this frame.
	///
	/// The format depends on the codec being used (H.264, AV1, Opus, etc.).
	/// The debug implementation shows only the payload length for brevity.
	#[debug("{} bytes", payload.len())]
	pub payload: Bytes,
}

impl Frame {
	/// Encode the frame: a varint timestamp (in microseconds) followed by the
	/// raw payload, which consumes the remainder of the message.
	pub fn encode(&self) -> Bytes {
		let mut buf = BytesMut::with_capacity(8 + self.payload.len());
		self.timestamp.encode(&mut buf);
		buf.extend_from_slice(&self.payload);
		buf.freeze()
	}

	/// Decode a frame from a transport message.
	///
	/// The keyframe flag is not on the wire; the caller supplies it based on
	/// the frame's position within its group.
	pub fn decode(mut payload: Bytes, keyframe: bool) -> Result<Self> {
		let timestamp = Timestamp::decode(&mut payload)?;
		Ok(Self {
			timestamp,
			keyframe,
			payload,
		})
	}
}

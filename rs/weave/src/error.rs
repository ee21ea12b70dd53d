/// Error types for the weave media library.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum Error {
	/// An error from the underlying transport layer.
	#[error("transport error: {0}")]
	Transport(#[from] strand::Error),

	/// A frame failed to decode, usually a truncated timestamp header.
	#[error("malformed frame: {0}")]
	MalformedFrame(#[from] strand::coding::DecodeError),

	/// The first frame written to a track must be a keyframe.
	#[error("missing keyframe")]
	MissingKeyframe,

	/// A second [crate::TrackConsumer::next] was issued before the first resolved.
	#[error("concurrent pull")]
	ConcurrentPull,
}

/// A Result type alias for weave operations.
pub type Result<T> = std::result::Result<T, Error>;

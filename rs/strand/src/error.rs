/// Errors surfaced by track and group consumers.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum Error {
	/// The producer was dropped without finishing.
	#[error("cancelled")]
	Cancel,

	/// The producer aborted instead of finishing cleanly.
	#[error("aborted")]
	Aborted,
}

/// A Result type alias for strand operations.
pub type Result<T> = std::result::Result<T, Error>;

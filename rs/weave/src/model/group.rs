use std::collections::VecDeque;

use tokio::sync::watch;

use crate::{Frame, Timestamp};

/// The buffered state of a single group on the consumer side.
///
/// Frames sit here between the frame-intake task and the puller. The group
/// keeps reporting its `latest` timestamp even after frames are dequeued, so
/// latency is measured against everything ever decoded from it.
pub(crate) struct GroupBuffer {
	// Decoded frames not yet consumed, in decode order.
	frames: VecDeque<Frame>,

	// The maximum timestamp ever decoded from this group.
	latest: Option<Timestamp>,

	// Set once the intake task is done with this group.
	ended: bool,

	// Cancels the intake task, releasing the transport handle.
	cancel: watch::Sender<bool>,
}

impl GroupBuffer {
	pub fn new() -> (Self, watch::Receiver<bool>) {
		let (cancel, cancelled) = watch::channel(false);
		let buffer = Self {
			frames: VecDeque::new(),
			latest: None,
			ended: false,
			cancel,
		};
		(buffer, cancelled)
	}

	pub fn push(&mut self, frame: Frame) {
		self.latest = Some(match self.latest {
			Some(latest) => latest.max(frame.timestamp),
			None => frame.timestamp,
		});
		self.frames.push_back(frame);
	}

	pub fn pop(&mut self) -> Option<Frame> {
		self.frames.pop_front()
	}

	/// The timestamp of the oldest frame still queued, falling back to the
	/// newest decoded timestamp once drained.
	pub fn oldest(&self) -> Option<Timestamp> {
		self.frames.front().map(|frame| frame.timestamp).or(self.latest)
	}

	/// The maximum timestamp ever decoded, or None if nothing decoded yet.
	pub fn latest(&self) -> Option<Timestamp> {
		self.latest
	}

	/// The span of presentation time still available for playout.
	///
	/// A drained group contributes nothing; its past span has been consumed.
	pub fn span(&self) -> Option<(Timestamp, Timestamp)> {
		let start = self.frames.front()?.timestamp;
		Some((start, self.latest?))
	}

	pub fn is_drained(&self) -> bool {
		self.frames.is_empty()
	}

	pub fn is_ended(&self) -> bool {
		self.ended
	}

	pub fn set_ended(&mut self) {
		self.ended = true;
	}

	/// Tell the intake task to stop and release its transport handle.
	pub fn cancel(&self) {
		self.cancel.send_replace(true);
	}
}

#[cfg(test)]
impl GroupBuffer {
	pub fn with_frames(timestamps: &[u64]) -> Self {
		let (mut buffer, _) = Self::new();
		for &ms in timestamps {
			buffer.push(Frame {
				timestamp: Timestamp::from_millis(ms),
				keyframe: buffer.latest.is_none(),
				payload: bytes::Bytes::new(),
			});
		}
		buffer
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn latest_survives_pop() {
		let mut buffer = GroupBuffer::with_frames(&[10, 20, 30]);
		assert_eq!(buffer.latest(), Some(Timestamp::from_millis(30)));
		assert_eq!(buffer.oldest(), Some(Timestamp::from_millis(10)));

		buffer.pop();
		buffer.pop();
		buffer.pop();

		// Drained, but latest still reflects everything decoded.
		assert!(buffer.is_drained());
		assert_eq!(buffer.latest(), Some(Timestamp::from_millis(30)));
		assert_eq!(buffer.oldest(), Some(Timestamp::from_millis(30)));
		assert_eq!(buffer.span(), None);
	}

	#[test]
	fn span() {
		let buffer = GroupBuffer::with_frames(&[10, 20, 30]);
		assert_eq!(
			buffer.span(),
			Some((Timestamp::from_millis(10), Timestamp::from_millis(30)))
		);

		let (empty, _) = GroupBuffer::new();
		assert_eq!(empty.span(), None);
	}
}

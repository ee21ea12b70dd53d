use bytes::Bytes;
use tokio::sync::watch;

use crate::Error;

/// An ordered, append-only sequence of frames within a track.
///
/// Groups are identified by a sequence number, assigned by the track in
/// strictly increasing order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Group {
	pub sequence: u64,
}

impl Group {
	pub fn new(sequence: u64) -> Self {
		Self { sequence }
	}

	pub fn produce(self) -> GroupProducer {
		GroupProducer::new(self)
	}
}

struct GroupState {
	frames: Vec<Bytes>,

	// None while open, then the result of the group.
	closed: Option<Result<(), Error>>,
}

/// Appends frames to a group.
///
/// Dropping the producer without calling [Self::finish] is treated as a
/// cancellation by any consumers.
#[derive(Clone)]
pub struct GroupProducer {
	pub info: Group,
	state: watch::Sender<GroupState>,
}

impl GroupProducer {
	pub fn new(info: Group) -> Self {
		let (state, _) = watch::channel(GroupState {
			frames: Vec::new(),
			closed: None,
		});
		Self { info, state }
	}

	/// Append a frame to the group.
	///
	/// Frames written after closing are ignored.
	pub fn write_frame(&mut self, frame: Bytes) {
		self.state.send_modify(|state| {
			if state.closed.is_none() {
				state.frames.push(frame);
			}
		});
	}

	/// Close the group cleanly; consumers will read the remaining frames and then end.
	pub fn finish(self) {
		self.close(Ok(()));
	}

	/// Close the group with an error.
	pub fn abort(self, err: Error) {
		tracing::debug!(group = self.info.sequence, %err, "aborting group");
		self.close(Err(err));
	}

	fn close(&self, res: Result<(), Error>) {
		self.state.send_modify(|state| {
			if state.closed.is_none() {
				state.closed = Some(res);
			}
		});
	}

	/// Create a new consumer with its own read cursor.
	pub fn consume(&self) -> GroupConsumer {
		GroupConsumer {
			info: self.info.clone(),
			state: self.state.subscribe(),
			index: 0,
		}
	}
}

/// Reads frames from a group in decode order.
///
/// Cloning creates an independent cursor starting at the clone's position.
#[derive(Clone)]
pub struct GroupConsumer {
	pub info: Group,
	state: watch::Receiver<GroupState>,
	index: usize,
}

impl GroupConsumer {
	/// Read the next frame, or None when the group is finished.
	pub async fn read_frame(&mut self) -> Result<Option<Bytes>, Error> {
		let index = self.index;

		// Copy out of the watch ref so the borrow ends here.
		let res = self
			.state
			.wait_for(|state| state.frames.len() > index || state.closed.is_some())
			.await
			.map(|state| (state.frames.get(index).cloned(), state.closed.clone()));

		match res {
			Ok((Some(frame), _)) => {
				self.index += 1;
				Ok(Some(frame))
			}
			Ok((None, Some(Err(err)))) => Err(err),
			Ok((None, _)) => Ok(None),
			// The producer was dropped; deliver any straggling frames first.
			Err(_) => {
				let frame = self.state.borrow().frames.get(index).cloned();
				match frame {
					Some(frame) => {
						self.index += 1;
						Ok(Some(frame))
					}
					None => Err(Error::Cancel),
				}
			}
		}
	}
}

#[cfg(test)]
use futures::FutureExt;

#[cfg(test)]
impl GroupConsumer {
	pub fn assert_frame(&mut self, expected: &[u8]) {
		let frame = self
			.read_frame()
			.now_or_never()
			.expect("should not have blocked")
			.expect("should not have errored")
			.expect("should be a frame");
		assert_eq!(frame.as_ref(), expected);
	}

	pub fn assert_no_frame(&mut self) {
		assert!(self.read_frame().now_or_never().is_none(), "should have blocked");
	}

	pub fn assert_finished(&mut self) {
		let frame = self
			.read_frame()
			.now_or_never()
			.expect("should not have blocked")
			.expect("should not have errored");
		assert!(frame.is_none(), "should be finished");
	}

	pub fn assert_error(&mut self) {
		self.read_frame()
			.now_or_never()
			.expect("should not have blocked")
			.expect_err("should be an error");
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[tokio::test]
	async fn frames() {
		let mut producer = Group::new(0).produce();
		let mut consumer = producer.consume();

		consumer.assert_no_frame();

		producer.write_frame(Bytes::from_static(b"one"));
		producer.write_frame(Bytes::from_static(b"two"));

		consumer.assert_frame(b"one");
		consumer.assert_frame(b"two");
		consumer.assert_no_frame();

		producer.write_frame(Bytes::from_static(b"three"));
		consumer.assert_frame(b"three");

		producer.finish();
		consumer.assert_finished();
	}

	#[tokio::test]
	async fn cursors() {
		let mut producer = Group::new(7).produce();
		let mut consumer = producer.consume();

		producer.write_frame(Bytes::from_static(b"one"));
		consumer.assert_frame(b"one");

		// A clone continues from the same position; a fresh consumer starts over.
		let mut cloned = consumer.clone();
		let mut fresh = producer.consume();

		producer.write_frame(Bytes::from_static(b"two"));

		consumer.assert_frame(b"two");
		cloned.assert_frame(b"two");
		fresh.assert_frame(b"one");
		fresh.assert_frame(b"two");
	}

	#[tokio::test]
	async fn abort() {
		let mut producer = Group::new(0).produce();
		let mut consumer = producer.consume();

		producer.write_frame(Bytes::from_static(b"one"));
		producer.abort(Error::Aborted);

		// An abort still delivers buffered frames before the error.
		consumer.assert_frame(b"one");
		consumer.assert_error();
	}

	#[tokio::test]
	async fn cancel() {
		let mut producer = Group::new(0).produce();
		let mut consumer = producer.consume();

		producer.write_frame(Bytes::from_static(b"one"));
		drop(producer);

		consumer.assert_frame(b"one");
		consumer.assert_error();
	}
}

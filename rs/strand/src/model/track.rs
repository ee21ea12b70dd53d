use tokio::sync::watch;

use crate::{Error, Group, GroupConsumer, GroupProducer};

/// A named, ordered sequence of groups.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Track {
	pub name: String,
}

impl Track {
	pub fn new<T: Into<String>>(name: T) -> Self {
		Self { name: name.into() }
	}

	pub fn produce(self) -> TrackProducer {
		TrackProducer::new(self)
	}
}

struct TrackState {
	// Groups in creation order, which is the delivery order.
	// This is NOT necessarily ascending by sequence; see [TrackProducer::create_group].
	groups: Vec<GroupConsumer>,

	// The sequence number assigned to the next appended group.
	next: u64,

	// None while open, then the result of the track.
	closed: Option<Result<(), Error>>,
}

/// Publishes groups to a track.
///
/// Dropping the producer without calling [Self::finish] is treated as a
/// cancellation by any consumers.
#[derive(Clone)]
pub struct TrackProducer {
	pub info: Track,
	state: watch::Sender<TrackState>,
}

impl TrackProducer {
	pub fn new(info: Track) -> Self {
		let (state, _) = watch::channel(TrackState {
			groups: Vec::new(),
			next: 0,
			closed: None,
		});
		Self { info, state }
	}

	/// Open a new group with the next sequence number.
	pub fn append_group(&mut self) -> GroupProducer {
		let mut sequence = 0;
		self.state.send_modify(|state| {
			sequence = state.next;
			state.next += 1;
		});

		self.create_group(sequence)
	}

	/// Open a new group with an explicit sequence number.
	///
	/// Consumers receive groups in creation order, so this is how a relay
	/// delivers groups out of sequence order.
	pub fn create_group(&mut self, sequence: u64) -> GroupProducer {
		let producer = Group::new(sequence).produce();
		let consumer = producer.consume();

		self.state.send_modify(|state| {
			if state.closed.is_none() {
				state.next = state.next.max(sequence + 1);
				state.groups.push(consumer);
			}
		});

		producer
	}

	/// Close the track cleanly; consumers will read the remaining groups and then end.
	pub fn finish(self) {
		self.close(Ok(()));
	}

	/// Close the track with an error.
	pub fn abort(self, err: Error) {
		tracing::debug!(track = %self.info.name, %err, "aborting track");
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
	pub fn consume(&self) -> TrackConsumer {
		TrackConsumer {
			info: self.info.clone(),
			state: self.state.subscribe(),
			index: 0,
		}
	}
}

/// Receives groups from a track as they become available.
///
/// Cloning creates an independent cursor starting at the clone's position.
#[derive(Clone)]
pub struct TrackConsumer {
	pub info: Track,
	state: watch::Receiver<TrackState>,
	index: usize,
}

impl TrackConsumer {
	/// Receive the next group, or None when the track is finished.
	///
	/// Groups are delivered in the order the producer created them, which is
	/// not necessarily ascending by sequence number.
	pub async fn next_group(&mut self) -> Result<Option<GroupConsumer>, Error> {
		let index = self.index;

		// Copy out of the watch ref so the borrow ends here.
		let res = self
			.state
			.wait_for(|state| state.groups.len() > index || state.closed.is_some())
			.await
			.map(|state| (state.groups.get(index).cloned(), state.closed.clone()));

		match res {
			Ok((Some(group), _)) => {
				self.index += 1;
				Ok(Some(group))
			}
			Ok((None, Some(Err(err)))) => Err(err),
			Ok((None, _)) => Ok(None),
			// The producer was dropped; deliver any straggling groups first.
			Err(_) => {
				let group = self.state.borrow().groups.get(index).cloned();
				match group {
					Some(group) => {
						self.index += 1;
						Ok(Some(group))
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
impl TrackConsumer {
	pub fn assert_group(&mut self) -> GroupConsumer {
		self.next_group()
			.now_or_never()
			.expect("should not have blocked")
			.expect("should not have errored")
			.expect("should be a group")
	}

	pub fn assert_no_group(&mut self) {
		assert!(self.next_group().now_or_never().is_none(), "should have blocked");
	}

	pub fn assert_finished(&mut self) {
		let group = self
			.next_group()
			.now_or_never()
			.expect("should not have blocked")
			.expect("should not have errored");
		assert!(group.is_none(), "should be finished");
	}

	pub fn assert_error(&mut self) {
		self.next_group()
			.now_or_never()
			.expect("should not have blocked")
			.map(|_| ())
			.expect_err("should be an error");
	}
}

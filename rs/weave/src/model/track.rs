use std::collections::BTreeMap;
use std::time::Duration;

use tokio::sync::watch;
use web_async::Lock;

use crate::model::buffered::ranges;
use crate::model::group::GroupBuffer;
use crate::{BufferedRange, Error, Frame, Result};

/// A producer for media tracks.
///
/// This wraps a `strand::TrackProducer` and adds automatic timestamp encoding
/// and keyframe-based group management:
/// - When a keyframe is written, the current group is finished and a new one begins.
/// - Non-keyframes are appended to the current group.
/// - Each frame includes a timestamp header for proper playback timing.
///
/// Every group starts with exactly one keyframe, so the flag never needs to be
/// written to the wire; position is the flag.
pub struct TrackProducer {
	pub inner: strand::TrackProducer,
	group: Option<strand::GroupProducer>,
}

impl TrackProducer {
	/// Create a new TrackProducer wrapping the given strand producer.
	pub fn new(inner: strand::TrackProducer) -> Self {
		Self { inner, group: None }
	}

	/// Write a frame to the track.
	///
	/// All frames should be in *decode order*. The timestamp is usually
	/// monotonically increasing within a group, but it depends on the encoding.
	///
	/// The very first frame must be a keyframe; anything else returns
	/// [Error::MissingKeyframe].
	pub fn write(&mut self, frame: Frame) -> Result<()> {
		if frame.keyframe {
			if let Some(group) = self.group.take() {
				group.finish();
			}
		} else if self.group.is_none() {
			return Err(Error::MissingKeyframe);
		}

		let mut group = match self.group.take() {
			Some(group) => group,
			None => self.inner.append_group(),
		};

		group.write_frame(frame.encode());
		self.group.replace(group);

		Ok(())
	}

	/// Close the track cleanly, finishing any open group.
	pub fn finish(mut self) {
		if let Some(group) = self.group.take() {
			group.finish();
		}
		self.inner.finish();
	}

	/// Close the track with an error, propagated to subscribers.
	pub fn abort(mut self, err: strand::Error) {
		if let Some(group) = self.group.take() {
			group.abort(err.clone());
		}
		self.inner.abort(err);
	}

	/// Create a consumer for this track.
	///
	/// Multiple consumers can be created from the same producer, each receiving
	/// a copy of all data written to the track.
	pub fn consume(&self) -> TrackConsumer {
		TrackConsumer::new(self.inner.consume())
	}
}

impl From<strand::TrackProducer> for TrackProducer {
	fn from(inner: strand::TrackProducer) -> Self {
		Self::new(inner)
	}
}

/// The result of [TrackConsumer::next].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Next {
	/// The group the frame belongs to.
	pub group: u64,

	/// The next frame, or None when the group ended.
	pub frame: Option<Frame>,
}

struct State {
	// Buffered groups, ascending by sequence.
	groups: BTreeMap<u64, GroupBuffer>,

	// The sequence currently being drained for playout; only ever increases.
	active: Option<u64>,

	// The maximum spread between buffered timestamps before skipping a group.
	latency: Duration,

	// At most one next() call may be outstanding.
	pulling: bool,

	// No more groups will arrive.
	ended: bool,
}

#[derive(Clone)]
struct Shared {
	state: Lock<State>,

	// Wakes the puller; a generation counter so signals sent between a state
	// check and the next wait are never lost, and redundant wakes coalesce.
	wake: watch::Sender<u64>,

	// The time ranges currently available for playout.
	buffered: watch::Sender<Vec<BufferedRange>>,

	// Set once, on session close; races every suspension.
	closed: watch::Sender<bool>,
}

impl Shared {
	fn wake(&self) {
		self.wake.send_modify(|generation| *generation = generation.wrapping_add(1));
	}

	fn publish(&self, state: &State) {
		self.buffered.send_replace(ranges(state.groups.values()));
	}

	// Receive groups from the transport, in delivery order.
	async fn run_track(self, mut inner: strand::TrackConsumer) {
		let mut closed = self.closed.subscribe();

		loop {
			let res = tokio::select! {
				biased;
				_ = closed.wait_for(|closed| *closed) => return,
				res = inner.next_group() => res,
			};

			match res {
				Ok(Some(group)) => self.insert_group(group),
				Ok(None) => break,
				// A track-level failure is just the end of the session.
				Err(err) => {
					tracing::debug!(%err, "track closed");
					break;
				}
			}
		}

		let mut state = self.state.lock();
		state.ended = true;
		drop(state);
		self.wake();
	}

	fn insert_group(&self, group: strand::GroupConsumer) {
		let sequence = group.info.sequence;
		let mut state = self.state.lock();

		if *self.closed.borrow() {
			return;
		}

		match state.active {
			// This group finished arriving too late; drop it without buffering.
			Some(active) if sequence < active => {
				tracing::debug!(old = sequence, active, "skipping old group");
				return;
			}
			// The first group becomes active unconditionally, favoring
			// time-to-first-frame over strict ordering.
			None => state.active = Some(sequence),
			_ => {}
		}

		let (buffer, cancelled) = GroupBuffer::new();
		if let Some(previous) = state.groups.insert(sequence, buffer) {
			// A duplicate sequence replaces the earlier delivery wholesale.
			tracing::debug!(group = sequence, "replacing duplicate group");
			previous.cancel();
		}

		web_async::spawn(self.clone().run_group(group, cancelled));
	}

	// Read frames from one group; the handle is owned here until exit.
	async fn run_group(self, mut group: strand::GroupConsumer, mut cancelled: watch::Receiver<bool>) {
		let sequence = group.info.sequence;
		let mut keyframe = true;

		loop {
			let res = tokio::select! {
				biased;
				_ = cancelled.wait_for(|cancelled| *cancelled) => return,
				res = group.read_frame() => res,
			};

			let frame = match res {
				Ok(Some(payload)) => match Frame::decode(payload, keyframe) {
					Ok(frame) => frame,
					// Fatal to this group only; the session continues.
					Err(err) => {
						tracing::debug!(group = sequence, %err, "malformed frame");
						break;
					}
				},
				Ok(None) => break,
				// Groups are speculative; a read error just tears this one down.
				Err(err) => {
					tracing::debug!(group = sequence, %err, "group closed");
					break;
				}
			};
			keyframe = false;

			let mut state = self.state.lock();
			if *cancelled.borrow() {
				// Replaced while we were reading; our slot now belongs to a
				// newer delivery of the same sequence.
				return;
			}
			let Some(buffer) = state.groups.get_mut(&sequence) else {
				// Evicted while we were reading.
				return;
			};
			buffer.push(frame);
			self.publish(&state);

			if state.active == Some(sequence) {
				self.wake();
			} else {
				// A newer frame elsewhere is what reveals that playout fell behind.
				self.check_latency(&mut state);
			}
		}

		// End of group: let the puller drain the queue, then move on.
		let mut state = self.state.lock();
		if *cancelled.borrow() {
			return;
		}
		if let Some(buffer) = state.groups.get_mut(&sequence) {
			buffer.set_ended();
		}
		if state.active == Some(sequence) {
			state.active = Some(sequence + 1);
			drop(state);
			self.wake();
		}
	}

	// Skip the oldest group once the buffered spread exceeds the latency budget.
	fn check_latency(&self, state: &mut State) {
		let Some(active) = state.active else { return };

		// Only groups with at least one decoded frame count, and a single
		// group can never be behind anything.
		let (earliest, min) = {
			let mut timed = state.groups.iter().filter(|(_, buffer)| buffer.latest().is_some());
			let Some((&earliest, buffer)) = timed.next() else { return };
			if timed.next().is_none() {
				return;
			}
			let Some(min) = buffer.oldest() else { return };
			(earliest, min)
		};

		// Never skip a group that playout hasn't reached yet.
		if earliest > active {
			return;
		}

		// NOTE: max spans ALL buffered groups, including those ahead of the
		// active one, while min only comes from the earliest. A single
		// far-future group can therefore force out a healthy active group;
		// that's the policy: latency wins over completeness.
		let Some(max) = state.groups.values().filter_map(GroupBuffer::latest).max() else {
			return;
		};

		if max.saturating_sub(min) <= state.latency {
			return;
		}

		tracing::debug!(group = earliest, ?min, ?max, latency = ?state.latency, "skipping slow group");

		if let Some(buffer) = state.groups.remove(&earliest) {
			buffer.cancel();
		}
		if let Some(&next) = state.groups.keys().next() {
			state.active = state.active.max(Some(next));
		}

		self.publish(state);
		self.wake();
	}

	fn close(&self) {
		let mut state = self.state.lock();

		// Set the flag while holding the lock so no group can slip in between
		// the clear and the flag.
		self.closed.send_replace(true);

		for buffer in state.groups.values() {
			buffer.cancel();
		}
		state.groups.clear();
		drop(state);

		self.buffered.send_replace(Vec::new());
		self.wake();
	}
}

// Clears the pulling flag even when the next() future is dropped mid-wait.
struct PullGuard {
	state: Lock<State>,
}

impl Drop for PullGuard {
	fn drop(&mut self) {
		self.state.lock().pulling = false;
	}
}

/// A consumer for media tracks.
///
/// This wraps a `strand::TrackConsumer` and reassembles its concurrently
/// arriving groups into a single ordered frame stream:
///
/// - Frames are yielded in non-decreasing group order, and within a group in
///   decode order.
/// - Groups whose buffered spread exceeds the latency budget are skipped
///   wholesale; use [`set_latency`](Self::set_latency) to configure the
///   maximum acceptable delay. The default of zero keeps only one group.
/// - [`buffered`](Self::buffered) reports which presentation time ranges are
///   currently available, updated on every change.
///
/// Dropping the consumer closes the session and releases all group handles.
pub struct TrackConsumer {
	pub info: strand::Track,
	shared: Shared,
}

impl TrackConsumer {
	/// Create a new TrackConsumer wrapping the given strand consumer.
	pub fn new(inner: strand::TrackConsumer) -> Self {
		let state = State {
			groups: BTreeMap::new(),
			active: None,
			latency: Duration::ZERO,
			pulling: false,
			ended: false,
		};

		let shared = Shared {
			state: Lock::new(state),
			wake: watch::channel(0).0,
			buffered: watch::channel(Vec::new()).0,
			closed: watch::channel(false).0,
		};

		let info = inner.info.clone();
		web_async::spawn(shared.clone().run_track(inner));

		Self { info, shared }
	}

	/// Read the next frame, blocking until one is available.
	///
	/// Frames are yielded in non-decreasing group order; a group's end is
	/// reported as a [Next] with no frame. Skipped groups are not reported at
	/// all; the gap is only visible via [`buffered`](Self::buffered).
	///
	/// Returns `None` once the session is closed or the track has ended and
	/// everything buffered was drained; every subsequent call returns `None`
	/// again.
	///
	/// At most one call may be outstanding; a second concurrent call fails
	/// with [Error::ConcurrentPull].
	pub async fn next(&self) -> Result<Option<Next>> {
		{
			let mut state = self.shared.state.lock();
			if state.pulling {
				return Err(Error::ConcurrentPull);
			}
			state.pulling = true;
		}
		let _guard = PullGuard {
			state: self.shared.state.clone(),
		};

		let mut wake = self.shared.wake.subscribe();

		loop {
			{
				let mut state = self.shared.state.lock();

				// Snapshot the wake generation before inspecting state, so a
				// signal sent after we unlock is never lost.
				let _ = wake.borrow_and_update();

				if *self.shared.closed.borrow() {
					return Ok(None);
				}

				let earliest = state.groups.keys().next().copied();

				if let (Some(mut active), Some(sequence)) = (state.active, earliest) {
					// Once the track has ended, nothing can fill a sequence
					// gap anymore; jump ahead so the tail still drains.
					if state.ended && sequence > active {
						active = sequence;
						state.active = Some(active);
					}

					if sequence <= active {
						if let Some(buffer) = state.groups.get_mut(&sequence) {
							if buffer.is_drained() && buffer.is_ended() {
								state.groups.remove(&sequence);
								if active == sequence {
									state.active = Some(sequence + 1);
								}
								self.shared.publish(&state);
								return Ok(Some(Next {
									group: sequence,
									frame: None,
								}));
							}

							if let Some(frame) = buffer.pop() {
								self.shared.publish(&state);
								return Ok(Some(Next {
									group: sequence,
									frame: Some(frame),
								}));
							}
						}
					}
				}

				if state.ended && state.groups.is_empty() {
					return Ok(None);
				}
			}

			if wake.changed().await.is_err() {
				return Ok(None);
			}
		}
	}

	/// Set the maximum latency tolerance for this consumer.
	///
	/// Once the spread between the oldest frame still needed and the newest
	/// buffered timestamp exceeds this, the oldest group is skipped. Takes
	/// effect immediately.
	pub fn set_latency(&self, latency: Duration) {
		let mut state = self.shared.state.lock();
		state.latency = latency;
		self.shared.check_latency(&mut state);
	}

	/// The presentation time ranges currently available for playout:
	/// ascending, non-overlapping, updated on every change.
	pub fn buffered(&self) -> watch::Receiver<Vec<BufferedRange>> {
		self.shared.buffered.subscribe()
	}

	/// Close the session, releasing all buffered groups. Idempotent.
	pub fn close(&self) {
		self.shared.close();
	}
}

impl From<strand::TrackConsumer> for TrackConsumer {
	fn from(inner: strand::TrackConsumer) -> Self {
		Self::new(inner)
	}
}

impl Drop for TrackConsumer {
	fn drop(&mut self) {
		self.close();
	}
}

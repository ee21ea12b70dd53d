use crate::model::group::GroupBuffer;
use crate::Timestamp;

/// A contiguous span of presentation time available for playout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BufferedRange {
	pub start: Timestamp,
	pub end: Timestamp,
}

/// Merge per-group spans into a minimal ascending, non-overlapping list.
///
/// Groups must be visited in ascending sequence order. A span that starts at
/// or before the previous span's end extends it; anything else starts a new
/// range.
pub(crate) fn ranges<'a, I: Iterator<Item = &'a GroupBuffer>>(groups: I) -> Vec<BufferedRange> {
	let mut output: Vec<BufferedRange> = Vec::new();

	for (start, end) in groups.filter_map(GroupBuffer::span) {
		match output.last_mut() {
			Some(prev) if start <= prev.end => prev.end = prev.end.max(end),
			_ => output.push(BufferedRange { start, end }),
		}
	}

	output
}

use thiserror::Error;

/// Read from the buffer, advancing it past the decoded value.
///
/// If [DecodeError::Short] is returned, the caller should try again with more data.
pub trait Decode: Sized {
	fn decode<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError>;
}

/// A decode error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
	#[error("short buffer")]
	Short,

	#[error("invalid value")]
	InvalidValue,
}

impl Decode for u8 {
	fn decode<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		match buf.has_remaining() {
			true => Ok(buf.get_u8()),
			false => Err(DecodeError::Short),
		}
	}
}

impl Decode for u64 {
	/// Decode a variable-length integer.
	fn decode<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		if !buf.has_remaining() {
			return Err(DecodeError::Short);
		}

		// The two high bits of the first byte are the length.
		let size = 1usize << (buf.chunk()[0] >> 6);
		if buf.remaining() < size {
			return Err(DecodeError::Short);
		}

		Ok(match size {
			1 => buf.get_u8() as u64,
			2 => buf.get_u16() as u64 & 0x3fff,
			4 => buf.get_u32() as u64 & 0x3fff_ffff,
			8 => buf.get_u64() & 0x3fff_ffff_ffff_ffff,
			_ => unreachable!(),
		})
	}
}

impl Decode for usize {
	fn decode<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		u64::decode(buf)?.try_into().map_err(|_| DecodeError::InvalidValue)
	}
}

impl Decode for std::time::Duration {
	fn decode<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		Ok(std::time::Duration::from_micros(u64::decode(buf)?))
	}
}

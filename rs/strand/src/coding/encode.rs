pub trait Encode: Sized {
	// Encode the value to the given writer.
	// This will panic if the Buf is not large enough; use a Vec or BytesMut to be safe.
	fn encode<W: bytes::BufMut>(&self, w: &mut W);
}

impl Encode for u8 {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		w.put_u8(*self);
	}
}

impl Encode for u64 {
	/// Encode as a variable-length integer.
	///
	/// Panics if the value needs more than 62 bits.
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		let v = *self;
		if v < (1 << 6) {
			w.put_u8(v as u8);
		} else if v < (1 << 14) {
			w.put_u16(v as u16 | (0b01 << 14));
		} else if v < (1 << 30) {
			w.put_u32(v as u32 | (0b10 << 30));
		} else if v < (1 << 62) {
			w.put_u64(v | (0b11 << 62));
		} else {
			panic!("varint too large");
		}
	}
}

impl Encode for usize {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		(*self as u64).encode(w)
	}
}

impl Encode for std::time::Duration {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		let v: u64 = self.as_micros().try_into().expect("duration too large");
		v.encode(w);
	}
}

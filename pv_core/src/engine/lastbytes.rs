/*!
# PV Core: Engine — Last-Bytes Window

Rolling window of the most recently written bytes, for the
`last-written:N` format directive (§4.4.9, §3 `lastwritten_buffer`).
*/

/// # Hard Cap On The Window Size (§3).
pub const MAX_LEN: usize = 256;

#[derive(Debug, Default)]
/// # Last-Bytes Window.
pub struct LastBytes {
	buf: Vec<u8>,
	cap: usize,
}

impl LastBytes {
	#[must_use]
	/// # New, With A Window Capacity (Clamped To [`MAX_LEN`]).
	pub fn new(cap: usize) -> Self {
		Self { buf: Vec::with_capacity(cap.min(MAX_LEN)), cap: cap.min(MAX_LEN) }
	}

	/// # Record Newly Written Bytes.
	///
	/// Shifts out `min(written.len(), N)` old bytes and appends the tail
	/// of `written`, keeping at most `cap` bytes total.
	pub fn push(&mut self, written: &[u8]) {
		if self.cap == 0 { return; }
		let take = written.len().min(self.cap);
		let tail = &written[written.len() - take..];

		let keep = self.cap.saturating_sub(take);
		if self.buf.len() > keep { self.buf.drain(..self.buf.len() - keep); }
		self.buf.extend_from_slice(tail);
	}

	#[must_use]
	/// # Current Window Contents, Non-Printable Bytes As `.` (§4.4.9).
	pub fn display(&self) -> Vec<u8> {
		self.buf.iter().map(|&b| if b.is_ascii_graphic() || b == b' ' { b } else { b'.' }).collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn t_basic_window() {
		let mut w = LastBytes::new(4);
		w.push(b"hello");
		assert_eq!(w.display(), b"ello");
	}

	#[test]
	fn t_incremental_shift() {
		let mut w = LastBytes::new(4);
		w.push(b"ab");
		w.push(b"cd");
		assert_eq!(w.display(), b"abcd");
		w.push(b"ef");
		assert_eq!(w.display(), b"cdef");
	}

	#[test]
	fn t_non_printable_dotted() {
		let mut w = LastBytes::new(4);
		w.push(&[0x01, b'x', 0x00, b'y']);
		assert_eq!(w.display(), b".x.y");
	}

	#[test]
	fn t_zero_cap_noop() {
		let mut w = LastBytes::new(0);
		w.push(b"hello");
		assert_eq!(w.display(), Vec::<u8>::new());
	}
}

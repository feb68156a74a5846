/*!
# PV Core: Format — Display Width

A width-of-string function that understands multi-byte character widths and
skips CSI/ANSI sequences (§4.6.2), adapted directly from
`fyi_msg::fitted::{width, length_width}`, generalized only in name.
*/

use unicode_width::UnicodeWidthChar;

#[must_use]
/// # Display Width.
///
/// Every byte that is not a control character or part of an ANSI/CSI
/// escape counts as width 1 in the ASCII fast path; once a non-ASCII byte
/// is seen the rest of the slice is measured with [`unicode_width`]
/// instead. A CSI sequence is anything starting `\x1b` and ending at the
/// first `m`, `A`, or `K` byte/char — matching the handful of sequences
/// this crate's `sgr:`/bar directives ever emit.
///
/// ## Safety Note
///
/// The input must be valid UTF-8 (the assembly buffer only ever contains
/// UTF-8 the formatter itself produced).
pub fn width(bytes: &[u8]) -> usize {
	if bytes.is_empty() { return 0; }

	let mut in_ansi = false;
	let (len, w) = bytes.iter()
		.take_while(|b| b.is_ascii())
		.fold((0, 0), |(l, w), &b|
			if in_ansi {
				if matches!(b, b'm' | b'A' | b'K') { in_ansi = false; }
				(l + 1, w)
			}
			else if b == b'\x1b' { in_ansi = true; (l + 1, w) }
			else if b == 0 || b.is_ascii_control() { (l + 1, w) }
			else { (l + 1, w + 1) }
		);

	if len == bytes.len() { w }
	else { width_unicode(&bytes[len..], w) }
}

#[must_use]
/// # Length For A Given Display-Width Budget (§4.6.2).
///
/// The maximum byte length of a prefix of `bytes` whose display width does
/// not exceed `stop`. Used when a directive must truncate (e.g.
/// `previous-line:N`, task/name padding).
pub fn length_for_width(bytes: &[u8], stop: usize) -> usize {
	let b_len = bytes.len();
	if b_len == 0 { return 0; }

	let mut in_ansi = false;
	match bytes.iter()
		.take_while(|b| b.is_ascii())
		.try_fold((0usize, 0usize), |(l, w), &b|
			if in_ansi {
				if matches!(b, b'm' | b'A' | b'K') { in_ansi = false; }
				Ok((l + 1, w))
			}
			else if b == b'\x1b' { in_ansi = true; Ok((l + 1, w)) }
			else if b == 0 || b.is_ascii_control() { Ok((l + 1, w)) }
			else if w + 1 > stop { Err(l) }
			else { Ok((l + 1, w + 1)) }
		)
	{
		Ok((len, _)) => if len == b_len { len } else { length_unicode(&bytes[len..], len, 0, stop) },
		Err(len) => len,
	}
}

fn width_unicode(bytes: &[u8], width: usize) -> usize {
	let Ok(s) = std::str::from_utf8(bytes) else { return width + bytes.len(); };

	let mut in_ansi = false;
	s.chars().fold(width, |w, c|
		if in_ansi {
			if matches!(c, 'm' | 'A' | 'K') { in_ansi = false; }
			w
		}
		else if c == '\x1b' { in_ansi = true; w }
		else { UnicodeWidthChar::width(c).map_or(w, |cw| cw + w) }
	)
}

fn length_unicode(bytes: &[u8], len: usize, width: usize, stop: usize) -> usize {
	let Ok(s) = std::str::from_utf8(bytes) else { return len; };

	let mut in_ansi = false;
	match s.chars().try_fold((len, width), |(l, w), c| {
		let ch_len = c.len_utf8();
		if in_ansi {
			if matches!(c, 'm' | 'A' | 'K') { in_ansi = false; }
			Ok((l + ch_len, w))
		}
		else if c == '\x1b' { in_ansi = true; Ok((l + ch_len, w)) }
		else {
			let w = UnicodeWidthChar::width(c).map_or(w, |cw| cw + w);
			if w > stop { Err(l) } else { Ok((l + ch_len, w)) }
		}
	}) {
		Ok((len, _)) | Err(len) => len,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn t_width_plain_and_csi() {
		for (slice, expected) in [
			("Hello World", 11),
			("\x1b[2mHello\x1b[0m World", 11),
			("Björk Guðmundsdóttir", 20),
			("\x1b[2mBjörk\x1b[0m Guðmundsdóttir", 20),
		] {
			assert_eq!(width(slice.as_bytes()), expected, "{slice:?}");
		}
	}

	#[test]
	fn t_length_for_width() {
		for (slice, stop, expected) in [
			("Hello", 5, 5),
			("Hello", 6, 5),
			("Hello", 4, 4),
			("Björk Guðmundsdóttir", 5, 6),
			("Björk Guðmundsdóttir", 2, 2),
			("\x1b[2mHello\x1b[0m World", 5, 13),
		] {
			assert_eq!(length_for_width(slice.as_bytes(), stop), expected, "{slice:?}@{stop}");
		}
	}
}

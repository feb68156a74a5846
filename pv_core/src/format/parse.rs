/*!
# PV Core: Format — Template Parser

Parses a `format:` template into an ordered sequence of [`Segment`]s
(§4.6.1). A directive begins with `%`, optionally a decimal "chosen size",
then either a single recognised letter or a braced `{name}`/`{name:arg}`
form; `%%` collapses to a literal `%`; anything else unrecognised passes
through as a literal `%`.
*/

use super::bar::BarStyleName;
use super::width;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
/// # Recognised Directive Kinds (§4.6.1).
pub enum DirectiveKind {
	Progress,
	ProgressBarOnly,
	ProgressAmountOnly,
	Bar(BarStyleName),
	Timer,
	Eta,
	FinEta,
	Rate,
	AverageRate,
	Bytes,
	BufferPercent,
	LastWritten,
	PreviousLine,
	Name,
	Sgr,
}

impl DirectiveKind {
	#[must_use]
	/// # Map A Single-Letter Shorthand To Its Directive (§6 grammar `letter`).
	///
	/// Only the eleven names with single-letter shorthands are reachable
	/// this way; the rest (bar styles, the `-only` progress variants, and
	/// `sgr`) require the braced form.
	pub fn from_letter(c: u8) -> Option<Self> {
		match c {
			b'p' => Some(Self::Progress),
			b't' => Some(Self::Timer),
			b'e' => Some(Self::Eta),
			b'I' => Some(Self::FinEta),
			b'r' => Some(Self::Rate),
			b'a' => Some(Self::AverageRate),
			b'b' => Some(Self::Bytes),
			b'T' => Some(Self::BufferPercent),
			b'A' => Some(Self::LastWritten),
			b'L' => Some(Self::PreviousLine),
			b'N' => Some(Self::Name),
			_ => None,
		}
	}

	#[must_use]
	/// # Map A Braced Name To Its Directive (§6 grammar `name`).
	pub fn from_name(name: &[u8]) -> Option<Self> {
		match name {
			b"progress" => Some(Self::Progress),
			b"progress-bar-only" => Some(Self::ProgressBarOnly),
			b"progress-amount-only" => Some(Self::ProgressAmountOnly),
			b"bar-plain" => Some(Self::Bar(BarStyleName::Plain)),
			b"bar-block" => Some(Self::Bar(BarStyleName::Block)),
			b"bar-granular" => Some(Self::Bar(BarStyleName::Granular)),
			b"bar-shaded" => Some(Self::Bar(BarStyleName::Shaded)),
			b"timer" => Some(Self::Timer),
			b"eta" => Some(Self::Eta),
			b"fineta" => Some(Self::FinEta),
			b"rate" => Some(Self::Rate),
			b"average-rate" => Some(Self::AverageRate),
			b"bytes" | b"transferred" => Some(Self::Bytes),
			b"buffer-percent" => Some(Self::BufferPercent),
			b"last-written" => Some(Self::LastWritten),
			b"previous-line" => Some(Self::PreviousLine),
			b"name" => Some(Self::Name),
			b"sgr" => Some(Self::Sgr),
			_ => None,
		}
	}

	#[must_use]
	/// # Is This Directive Dynamic When Given No Chosen Size? (§4.6.2)
	pub const fn dynamic_capable(self) -> bool {
		matches!(
			self,
			Self::Progress | Self::ProgressBarOnly | Self::Bar(_) | Self::LastWritten | Self::PreviousLine
		)
	}
}

#[derive(Debug, Clone)]
/// # A Parsed Template Segment.
pub enum Segment {
	/// # A Literal Run, With Its Pre-Computed Display Width.
	Literal { bytes: Vec<u8>, width: usize },
	/// # A Directive, With Its Chosen Size (0 = Dynamic) And Optional Argument.
	Directive { kind: DirectiveKind, size: u32, arg: Option<Vec<u8>>, dynamic: bool },
}

#[must_use]
/// # Parse A Format Template Into Segments (§4.6.1).
pub fn parse_template(template: &[u8]) -> Vec<Segment> {
	let mut segments = Vec::new();
	let mut literal: Vec<u8> = Vec::new();
	let mut i = 0;
	let len = template.len();

	while i < len {
		let b = template[i];
		if b != b'%' {
			literal.push(b);
			i += 1;
			continue;
		}

		// Lone trailing '%'.
		if i + 1 >= len {
			literal.push(b'%');
			i += 1;
			continue;
		}

		let next = template[i + 1];
		if next == b'%' {
			literal.push(b'%');
			i += 2;
			continue;
		}

		// Optional leading digits (the "chosen size"), only meaningful
		// ahead of the braced form.
		let digit_start = i + 1;
		let mut j = digit_start;
		while j < len && template[j].is_ascii_digit() { j += 1; }
		let has_digits = j > digit_start;

		if j < len && template[j] == b'{' {
			let name_start = j + 1;
			if let Some(rel) = template[name_start..].iter().position(|&c| c == b'}') {
				let close = name_start + rel;
				let inner = &template[name_start..close];
				let (name_bytes, arg) = split_arg(inner);
				if let Some(kind) = DirectiveKind::from_name(name_bytes) {
					flush_literal(&mut segments, &mut literal);
					let size = parse_chosen_size(&template[digit_start..digit_start + (j - digit_start)]);
					let dynamic = size == 0 && kind.dynamic_capable();
					segments.push(Segment::Directive {
						kind,
						size,
						arg: arg.map(<[u8]>::to_vec),
						dynamic,
					});
					i = close + 1;
					continue;
				}
			}
			// Unrecognised braced form: the leading '%' passes through literally.
			literal.push(b'%');
			i += 1;
			continue;
		}

		if !has_digits {
			if let Some(kind) = DirectiveKind::from_letter(next) {
				flush_literal(&mut segments, &mut literal);
				let dynamic = kind.dynamic_capable();
				segments.push(Segment::Directive { kind, size: 0, arg: None, dynamic });
				i += 2;
				continue;
			}
		}

		// Unrecognised sequence: pass the '%' through verbatim and retry
		// from the following byte.
		literal.push(b'%');
		i += 1;
	}

	flush_literal(&mut segments, &mut literal);
	segments
}

fn split_arg(inner: &[u8]) -> (&[u8], Option<&[u8]>) {
	match inner.iter().position(|&c| c == b':') {
		Some(pos) => (&inner[..pos], Some(&inner[pos + 1..])),
		None => (inner, None),
	}
}

fn parse_chosen_size(digits: &[u8]) -> u32 {
	if digits.is_empty() { return 0; }
	std::str::from_utf8(digits).ok().and_then(|s| s.parse().ok()).unwrap_or(0)
}

fn flush_literal(segments: &mut Vec<Segment>, literal: &mut Vec<u8>) {
	if literal.is_empty() { return; }
	let width = width::width(literal);
	segments.push(Segment::Literal { bytes: std::mem::take(literal), width });
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn t_literal_only() {
		let segs = parse_template(b"hello world");
		assert_eq!(segs.len(), 1);
		assert!(matches!(&segs[0], Segment::Literal { bytes, .. } if bytes == b"hello world"));
	}

	#[test]
	fn t_percent_escape() {
		let segs = parse_template(b"100%% done");
		assert_eq!(segs.len(), 1);
		assert!(matches!(&segs[0], Segment::Literal { bytes, .. } if bytes == b"100% done"));
	}

	#[test]
	fn t_letter_directive() {
		let segs = parse_template(b"%p %t");
		assert_eq!(segs.len(), 3);
		assert!(matches!(segs[0], Segment::Directive { kind: DirectiveKind::Progress, .. }));
		assert!(matches!(&segs[1], Segment::Literal { bytes, .. } if bytes == b" "));
		assert!(matches!(segs[2], Segment::Directive { kind: DirectiveKind::Timer, .. }));
	}

	#[test]
	fn t_braced_name_with_size_and_arg() {
		let segs = parse_template(b"%20{last-written:16}");
		assert_eq!(segs.len(), 1);
		match &segs[0] {
			Segment::Directive { kind, size, arg, dynamic } => {
				assert_eq!(*kind, DirectiveKind::LastWritten);
				assert_eq!(*size, 20);
				assert_eq!(arg.as_deref(), Some(&b"16"[..]));
				assert!(!dynamic); // chosen size pins it fixed-width.
			}
			_ => panic!("expected directive"),
		}
	}

	#[test]
	fn t_bar_style_braced() {
		let segs = parse_template(b"%{bar-block}");
		assert!(matches!(segs[0], Segment::Directive { kind: DirectiveKind::Bar(BarStyleName::Block), dynamic: true, .. }));
	}

	#[test]
	fn t_unrecognised_braced_passes_through() {
		let segs = parse_template(b"%{nope}");
		assert!(matches!(&segs[0], Segment::Literal { bytes, .. } if bytes == b"%{nope}"));
	}

	#[test]
	fn t_unrecognised_letter_passes_through() {
		let segs = parse_template(b"%z");
		assert!(matches!(&segs[0], Segment::Literal { bytes, .. } if bytes == b"%z"));
	}

	#[test]
	fn t_dynamic_defaults() {
		let segs = parse_template(b"%p");
		assert!(matches!(segs[0], Segment::Directive { dynamic: true, .. }));
		let segs = parse_template(b"%t");
		assert!(matches!(segs[0], Segment::Directive { dynamic: false, .. }));
	}

	#[test]
	fn t_sgr_directive() {
		let segs = parse_template(b"%{sgr:1,31}");
		match &segs[0] {
			Segment::Directive { kind, arg, .. } => {
				assert_eq!(*kind, DirectiveKind::Sgr);
				assert_eq!(arg.as_deref(), Some(&b"1,31"[..]));
			}
			_ => panic!("expected directive"),
		}
	}
}

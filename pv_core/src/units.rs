/*!
# PV Core: Units

Parses sizes with binary or decimal suffixes and formats byte/line
magnitudes with SI/IEC prefixes (§2 "Number/units", §6 "All numeric
inputs..."). The suffix grammar and two-decimal mantissa mirror the
original tool's own unit display; `dactyl` is used elsewhere in this
crate (see `format::format_hms`) for the HH:MM:SS timer segment, not
here — a `u64` byte count with a four-letter binary/decimal prefix
table has no matching `dactyl` type to hand off to.
*/

/// # Binary (1024-based) Unit Prefixes.
const BINARY_PREFIXES: [&str; 7] = ["", "Ki", "Mi", "Gi", "Ti", "Pi", "Ei"];

/// # Decimal (1000-based) Unit Prefixes.
const DECIMAL_PREFIXES: [&str; 7] = ["", "K", "M", "G", "T", "P", "E"];



#[must_use]
/// # Parse A Size With An Optional Suffix.
///
/// Accepts an optional decimal fraction followed by an optional suffix
/// `K|M|G|T` (case-insensitive), interpreted as `1024^n` unless
/// `decimal_units` is set, in which case it is `1000^n` (§6). Returns
/// `None` on malformed input.
pub fn parse_size(src: &str, decimal_units: bool) -> Option<u64> {
	let src = src.trim();
	if src.is_empty() { return None; }

	let bytes = src.as_bytes();
	let (num_part, suffix) = match bytes[bytes.len() - 1] {
		b'K' | b'k' => (&src[..src.len() - 1], 1),
		b'M' | b'm' => (&src[..src.len() - 1], 2),
		b'G' | b'g' => (&src[..src.len() - 1], 3),
		b'T' | b't' => (&src[..src.len() - 1], 4),
		_ => (src, 0),
	};

	let value: f64 = num_part.trim().parse().ok()?;
	if value < 0.0 || !value.is_finite() { return None; }

	let base: f64 = if decimal_units { 1000.0 } else { 1024.0 };
	let multiplier = base.powi(suffix);
	let total = value * multiplier;
	if total > u64::MAX as f64 { return None; }
	Some(total.round() as u64)
}

#[must_use]
/// # Format A Byte (or Line) Count With A Unit Prefix.
///
/// Picks the largest prefix that keeps the mantissa below the base, with
/// two decimal places (matching the original's human-readable display),
/// e.g. `"12.34 MiB"` or, with `decimal_units`, `"12.34 MB"`. `bits` adds
/// a trailing `"b"` rather than `"B"` and multiplies the value by 8 first.
pub fn format_size(value: u64, decimal_units: bool, bits: bool) -> String {
	let value = if bits { value.saturating_mul(8) } else { value };
	let base: f64 = if decimal_units { 1000.0 } else { 1024.0 };
	let prefixes = if decimal_units { &DECIMAL_PREFIXES } else { &BINARY_PREFIXES };
	let unit = if bits { "b" } else { "B" };

	let mut mantissa = value as f64;
	let mut idx = 0usize;
	while mantissa >= base && idx + 1 < prefixes.len() {
		mantissa /= base;
		idx += 1;
	}

	if idx == 0 {
		format!("{value} {unit}")
	}
	else {
		format!("{mantissa:.2} {}{unit}", prefixes[idx])
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn t_parse_binary() {
		assert_eq!(parse_size("1K", false), Some(1024));
		assert_eq!(parse_size("1.5M", false), Some((1.5 * 1024.0 * 1024.0) as u64));
		assert_eq!(parse_size("10", false), Some(10));
	}

	#[test]
	fn t_parse_decimal() {
		assert_eq!(parse_size("1K", true), Some(1000));
		assert_eq!(parse_size("1M", true), Some(1_000_000));
	}

	#[test]
	fn t_parse_invalid() {
		assert_eq!(parse_size("", false), None);
		assert_eq!(parse_size("abc", false), None);
		assert_eq!(parse_size("-5", false), None);
	}

	#[test]
	fn t_format_small() {
		assert_eq!(format_size(512, false, false), "512 B");
	}

	#[test]
	fn t_format_binary() {
		assert_eq!(format_size(1024 * 1500, false, false), "1.46 MiB");
	}

	#[test]
	fn t_format_decimal() {
		assert_eq!(format_size(1_500_000, true, false), "1.50 MB");
	}

	#[test]
	fn t_round_trip_whole_units() {
		for (s, expect) in [("1K", 1024u64), ("2M", 2 * 1024 * 1024), ("3G", 3 * 1024 * 1024 * 1024)] {
			assert_eq!(parse_size(s, false), Some(expect));
		}
	}
}

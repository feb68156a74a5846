/*!
# PV Core: Control

The immutable run configuration (§3, "Control"). Built once by the `pv`
binary's (deliberately minimal — see `SPEC_FULL.md` §6) argument intake,
then shared read-only for the life of the transfer.
*/

use std::num::NonZeroU64;



/// # Maximum Transfer Buffer Size.
pub const BUFFER_SIZE_MAX: u64 = 512 * 1024 * 1024;

/// # Default Refresh Interval, Seconds.
pub const DEFAULT_INTERVAL: f64 = 1.0;

/// # Minimum Refresh Interval, Seconds.
pub const MIN_INTERVAL: f64 = 0.1;

/// # Maximum Refresh Interval, Seconds.
pub const MAX_INTERVAL: f64 = 600.0;

/// # Default Average-Rate Window, Seconds.
pub const DEFAULT_RATE_WINDOW: u32 = 30;



#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
/// # Boolean Control Flags.
pub struct Flags(u32);

impl Flags {
	pub const NONE: Self = Self(0);
	/// # Split input on line separators rather than counting raw bytes.
	pub const LINE_MODE: Self = Self(1 << 0);
	/// # Lines are separated by `\0` rather than `\n`.
	pub const NULL_TERMINATED_LINES: Self = Self(1 << 1);
	/// # Report/limit in bits rather than bytes.
	pub const BITS_NOT_BYTES: Self = Self(1 << 2);
	/// # Use 1000-based rather than 1024-based unit prefixes.
	pub const DECIMAL_UNITS: Self = Self(1 << 3);
	/// # Proceed even if the output looks like a terminal, etc.
	pub const FORCE: Self = Self(1 << 4);
	/// # Cooperate with sibling instances to stack displays.
	pub const CURSOR_STACKING: Self = Self(1 << 5);
	/// # Numeric-only output (one percentage/number per line).
	pub const NUMERIC_ONLY: Self = Self(1 << 6);
	/// # Don't start the clock until the first byte arrives.
	pub const WAIT_FOR_FIRST_BYTE: Self = Self(1 << 7);
	/// # Suppress the status display entirely.
	pub const NO_DISPLAY: Self = Self(1 << 8);
	/// # Never attempt the splice(2) fast path.
	pub const NO_SPLICE: Self = Self(1 << 9);
	/// # Stop once `declared_size` bytes have been moved.
	pub const STOP_AT_SIZE: Self = Self(1 << 10);
	/// # fsync/fdatasync after every write.
	pub const SYNC_AFTER_WRITE: Self = Self(1 << 11);
	/// # Request O_DIRECT on input/output descriptors where possible.
	pub const DIRECT_IO: Self = Self(1 << 12);
	/// # Skip all-zero regions with seek+truncate instead of writing zeros.
	pub const SPARSE_OUTPUT: Self = Self(1 << 13);
	/// # Read input but never write it anywhere.
	pub const DISCARD_INPUT: Self = Self(1 << 14);
	/// # Render an indeterminate sweep gauge instead of a numeric rate.
	pub const RATE_GAUGE: Self = Self(1 << 15);
	/// # Print a final min/avg/max/mdev summary line.
	pub const SHOW_STATS: Self = Self(1 << 16);

	#[must_use]
	pub const fn contains(self, other: Self) -> bool { self.0 & other.0 == other.0 }

	#[must_use]
	pub const fn with(self, other: Self) -> Self { Self(self.0 | other.0) }

	pub fn set(&mut self, other: Self) { self.0 |= other.0; }
}



#[derive(Debug, Clone, Copy, Eq, PartialEq)]
/// # Error-Skip Mode (§3, "error-skip counter").
pub enum ErrorSkip {
	/// # Read errors are fatal (end of input).
	Off,
	/// # Skip silently.
	Quiet,
	/// # Skip and print a one-shot warning per input.
	Verbose,
}

impl ErrorSkip {
	#[must_use]
	pub const fn is_enabled(self) -> bool { !matches!(self, Self::Off) }
}



#[derive(Debug, Clone, Copy, Eq, PartialEq)]
/// # User-Pinned Vs. Auto-Sized Dimension.
pub enum Dimension {
	/// # Probed from the terminal (or a platform default) each resize.
	Auto(u16),
	/// # Fixed by the user; never re-probed.
	Pinned(u16),
}

impl Dimension {
	#[must_use]
	pub const fn get(self) -> u16 {
		match self { Self::Auto(v) | Self::Pinned(v) => v }
	}

	#[must_use]
	pub const fn is_pinned(self) -> bool { matches!(self, Self::Pinned(_)) }
}



#[derive(Debug, Clone)]
/// # Immutable Run Configuration.
pub struct Control {
	/// # Refresh interval, seconds, clamped to `[MIN_INTERVAL, MAX_INTERVAL]`.
	pub interval: f64,
	/// # Target transfer-buffer size; `None` ⇒ derive from output block size.
	pub buffer_size: Option<NonZeroU64>,
	/// # Rate limit, bytes/sec; `None` ⇒ unlimited.
	pub rate_limit: Option<NonZeroU64>,
	/// # Average-rate window, seconds (≥1).
	pub rate_window: u32,
	/// # Declared total size; `None` ⇒ unknown.
	pub declared_size: Option<u64>,
	/// # Display width.
	pub width: Dimension,
	/// # Display height.
	pub height: Dimension,
	/// # Boolean flags.
	pub flags: Flags,
	/// # Error-skip mode.
	pub error_skip: ErrorSkip,
	/// # Caller-fixed error-skip block size; 0 ⇒ adaptive.
	pub error_skip_block: u64,
	/// # Delay before the first display refresh, seconds.
	pub delay_start: f64,
	/// # Display name (defaults to the input filename or "stdin").
	pub name: Box<str>,
	/// # Format template; `None` ⇒ synthesize the default.
	pub format: Option<Box<str>>,
	/// # Bar style name ("plain", "block", "granular", "shaded").
	pub bar_style: Box<str>,
}

impl Default for Control {
	fn default() -> Self {
		Self {
			interval: DEFAULT_INTERVAL,
			buffer_size: None,
			rate_limit: None,
			rate_window: DEFAULT_RATE_WINDOW,
			declared_size: None,
			width: Dimension::Auto(80),
			height: Dimension::Auto(24),
			flags: Flags::NONE,
			error_skip: ErrorSkip::Off,
			error_skip_block: 0,
			delay_start: 0.0,
			name: Box::from("stdin"),
			format: None,
			bar_style: Box::from("block"),
		}
	}
}

impl Control {
	#[must_use]
	/// # Clamp The Interval Into Its Legal Range.
	pub fn clamped_interval(&self) -> f64 {
		self.interval.clamp(MIN_INTERVAL, MAX_INTERVAL)
	}

	#[must_use]
	/// # Resolve The Effective Buffer Size Given An Output Block Size.
	///
	/// 0 (i.e. `None`) means "derive from output block size × 32, capped at
	/// `BUFFER_SIZE_MAX`" (§3) — a cap, not a floor, so a small block size
	/// yields a small buffer.
	pub fn effective_buffer_size(&self, output_block_size: u64) -> u64 {
		match self.buffer_size {
			Some(sz) => sz.get().min(BUFFER_SIZE_MAX),
			None => (output_block_size.max(1) * 32).min(BUFFER_SIZE_MAX),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn t_flags() {
		let mut f = Flags::NONE;
		assert!(! f.contains(Flags::LINE_MODE));
		f.set(Flags::LINE_MODE);
		f.set(Flags::BITS_NOT_BYTES);
		assert!(f.contains(Flags::LINE_MODE));
		assert!(f.contains(Flags::BITS_NOT_BYTES));
		assert!(! f.contains(Flags::NO_SPLICE));
	}

	#[test]
	fn t_interval_clamp() {
		let mut c = Control::default();
		c.interval = 0.0;
		assert_eq!(c.clamped_interval(), MIN_INTERVAL);
		c.interval = 9999.0;
		assert_eq!(c.clamped_interval(), MAX_INTERVAL);
	}

	#[test]
	fn t_buffer_size_default_derivation() {
		let c = Control::default();
		assert_eq!(c.effective_buffer_size(4096), 4096 * 32);
		assert_eq!(c.effective_buffer_size(1024 * 1024), 1024 * 1024 * 32);
		assert_eq!(c.effective_buffer_size(u64::MAX), BUFFER_SIZE_MAX);
	}

	#[test]
	fn t_buffer_size_explicit() {
		let mut c = Control::default();
		c.buffer_size = NonZeroU64::new(1024);
		assert_eq!(c.effective_buffer_size(999_999_999), 1024);
	}
}

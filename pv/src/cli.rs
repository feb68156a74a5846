/*!
# PV: Argument Intake

Just enough hand-rolled parsing to populate every field of
[`pv_core::Control`] and collect the input paths / optional output path.
No help text, no completions, no man page — the flag surface itself is
out of scope (`SPEC_FULL.md` §6); this only has to get a `Control` built.
*/

use pv_core::control::{Control, Dimension, ErrorSkip, Flags};
use std::num::NonZeroU64;
use std::path::PathBuf;

#[derive(Debug)]
/// # Parsed Command Line.
pub struct Cli {
	/// # Input Paths, In Order; Empty Means Read `Stdin`.
	pub inputs: Vec<PathBuf>,
	/// # Output Path; `None` Means Write `Stdout`.
	pub output: Option<PathBuf>,
	/// # The Run Configuration Built From Every Recognized Flag.
	pub control: Control,
}

/// # Parse `argv` (Excluding `argv[0]`) Into A [`Cli`].
///
/// Unrecognized flags are ignored rather than rejected; a value that
/// fails to parse falls back to the field's existing default rather than
/// aborting the run, since this front-end is intentionally minimal.
pub fn parse<I: Iterator<Item = String>>(mut args: I) -> Cli {
	let mut control = Control::default();
	let mut inputs = Vec::new();
	let mut output = None;
	let mut name_given = false;

	while let Some(arg) = args.next() {
		match arg.as_str() {
			"-o" | "--output" => output = args.next().map(PathBuf::from),
			"-n" | "--name" => if let Some(v) = args.next() {
				control.name = v.into_boxed_str();
				name_given = true;
			},
			"--format" => if let Some(v) = args.next() { control.format = Some(v.into_boxed_str()); },
			"--bar-style" => if let Some(v) = args.next() { control.bar_style = v.into_boxed_str(); },
			"-s" | "--size" => if let Some(v) = args.next() {
				control.declared_size = pv_core::units::parse_size(&v, control.flags.contains(Flags::DECIMAL_UNITS));
			},
			"-i" | "--interval" => if let Some(v) = args.next() {
				if let Ok(n) = v.parse() { control.interval = n; }
			},
			"-L" | "--rate-limit" => if let Some(v) = args.next() {
				control.rate_limit = pv_core::units::parse_size(&v, control.flags.contains(Flags::DECIMAL_UNITS))
					.and_then(NonZeroU64::new);
			},
			"--rate-window" => if let Some(v) = args.next() {
				if let Ok(n) = v.parse::<u32>() { control.rate_window = n; }
			},
			"--buffer-size" => if let Some(v) = args.next() {
				control.buffer_size = pv_core::units::parse_size(&v, false).and_then(NonZeroU64::new);
			},
			"--delay-start" => if let Some(v) = args.next() {
				if let Ok(n) = v.parse() { control.delay_start = n; }
			},
			"-w" | "--width" => if let Some(v) = args.next() {
				if let Ok(n) = v.parse() { control.width = Dimension::Pinned(n); }
			},
			"-H" | "--height" => if let Some(v) = args.next() {
				if let Ok(n) = v.parse() { control.height = Dimension::Pinned(n); }
			},
			"--error-skip" => control.error_skip = ErrorSkip::Verbose,
			"--error-skip-quiet" => control.error_skip = ErrorSkip::Quiet,
			"--error-skip-block" => if let Some(v) = args.next() {
				if let Ok(n) = v.parse() { control.error_skip_block = n; }
			},
			"-l" | "--line-mode" => control.flags.set(Flags::LINE_MODE),
			"-0" | "--null" => control.flags.set(Flags::NULL_TERMINATED_LINES),
			"--bits" => control.flags.set(Flags::BITS_NOT_BYTES),
			"-k" | "--decimal" => control.flags.set(Flags::DECIMAL_UNITS),
			"-f" | "--force" => control.flags.set(Flags::FORCE),
			"--cursor" => control.flags.set(Flags::CURSOR_STACKING),
			"--numeric" => control.flags.set(Flags::NUMERIC_ONLY),
			"-W" | "--wait" => control.flags.set(Flags::WAIT_FOR_FIRST_BYTE),
			"-q" | "--no-display" => control.flags.set(Flags::NO_DISPLAY),
			"--no-splice" => control.flags.set(Flags::NO_SPLICE),
			"--stop-at-size" => control.flags.set(Flags::STOP_AT_SIZE),
			"--sync" => control.flags.set(Flags::SYNC_AFTER_WRITE),
			"--direct-io" => control.flags.set(Flags::DIRECT_IO),
			"-S" | "--sparse" => control.flags.set(Flags::SPARSE_OUTPUT),
			"-d" | "--discard" => control.flags.set(Flags::DISCARD_INPUT),
			"--gauge" => control.flags.set(Flags::RATE_GAUGE),
			"--stats" => control.flags.set(Flags::SHOW_STATS),
			"--" => { inputs.extend(args.by_ref().map(PathBuf::from)); },
			other if !other.starts_with('-') => inputs.push(PathBuf::from(other)),
			_ => {},
		}
	}

	// An explicit window of zero makes no sense; fall back rather than
	// handing the core a value it would just have to clamp anyway.
	if control.rate_window == 0 { control.rate_window = pv_core::control::DEFAULT_RATE_WINDOW; }

	// Default the display name to the first input's filename, the way the
	// original tool does, unless the caller named it explicitly.
	if !name_given {
		if let Some(first) = inputs.first().and_then(|p| p.file_name()).and_then(|n| n.to_str()) {
			control.name = Box::from(first);
		}
	}

	Cli { inputs, output, control }
}

/*!
# PV Core: Formatter & Display Assembly

Turns a parsed template (§4.6.1) into one rendered status line per refresh,
splitting available terminal width between fixed and dynamic segments
(§4.6.2), tracking "feature in use" flags from a zero-pass (§4.6.3), and
padding over a shorter previous render (§4.6.2, last paragraph). Grounded
on `fyi_msg::progress`'s buffer-offset assembly style, generalized from a
single fixed layout to an arbitrary parsed template.
*/

pub mod bar;
pub mod parse;
pub mod width;

use crate::rate::Calculator;
use crate::time::civil_from_unix;
use crate::units::format_size;
use bar::BarStyle;
use dactyl::{NiceElapsed, write_time};
use parse::{parse_template, DirectiveKind, Segment};

/// # Hard Cap On Trailing Pad Spaces (§4.6.2).
pub const MAX_TRAILING_PAD: usize = 15;

#[derive(Debug, Clone, Copy, Default)]
/// # Feature Flags Set By The Zero-Pass (§4.6.3).
pub struct UsageFlags {
	pub last_written: bool,
	pub previous_line: bool,
	pub colour: bool,
}

#[derive(Debug, Clone, Copy)]
/// # Everything A Render Needs From The Rest Of The Core.
pub struct RenderInputs<'a> {
	pub elapsed_secs: f64,
	pub numeric: bool,
	pub eta_secs: f64,
	/// # Unix Epoch Seconds Of The Estimated Completion Time.
	pub fineta_epoch_secs: i64,
	pub rate: f64,
	pub average_rate: f64,
	pub transferred: u64,
	pub size: Option<u64>,
	/// # `None` On A Splice Pass (§4.6.1, `buffer-percent`).
	pub buffer_percent: Option<f64>,
	/// # Unknown-Size Sweep Position, 0..=200 (§4.5 "Percentage").
	pub sweep_pos: u32,
	pub last_bytes: &'a [u8],
	pub previous_line: &'a [u8],
	pub name: &'a str,
	pub bits: bool,
	pub decimal_units: bool,
	pub colour: bool,
	pub bar_style: BarStyle,
}

/// # Template Assembler.
pub struct Assembler {
	segments: Vec<Segment>,
	prev_width: usize,
	pub usage: UsageFlags,
}

impl Assembler {
	#[must_use]
	/// # Parse A Template And Collect Its Zero-Pass Usage Flags.
	pub fn new(template: &[u8]) -> Self {
		let segments = parse_template(template);
		let mut usage = UsageFlags::default();
		for seg in &segments {
			if let Segment::Directive { kind, .. } = seg {
				match kind {
					DirectiveKind::LastWritten => usage.last_written = true,
					DirectiveKind::PreviousLine => usage.previous_line = true,
					DirectiveKind::Sgr => usage.colour = true,
					_ => {},
				}
			}
		}
		Self { segments, prev_width: 0, usage }
	}

	#[must_use]
	/// # Render One Status Line At The Given Terminal Width (§4.6.2).
	///
	/// Fixed-width segments (literals and non-dynamic directives) are
	/// rendered first and their widths summed; the remainder is split
	/// evenly (integer division) among the dynamic segments.
	pub fn render(&mut self, inputs: &RenderInputs<'_>, terminal_width: usize) -> Vec<u8> {
		let mut rendered: Vec<Option<Vec<u8>>> = vec![None; self.segments.len()];
		let mut fixed_total = 0usize;
		let mut dynamic_idx = Vec::new();

		for (i, seg) in self.segments.iter().enumerate() {
			match seg {
				Segment::Literal { width, .. } => fixed_total += width,
				Segment::Directive { dynamic: true, .. } => dynamic_idx.push(i),
				Segment::Directive { kind, size, arg, dynamic: false } => {
					let out = render_directive(*kind, *size, arg.as_deref(), inputs, None);
					fixed_total += width::width(&out);
					rendered[i] = Some(out);
				},
			}
		}

		let remaining = terminal_width.saturating_sub(fixed_total);
		let share = if dynamic_idx.is_empty() { 0 } else { remaining / dynamic_idx.len() };
		for i in dynamic_idx {
			if let Segment::Directive { kind, size, arg, .. } = &self.segments[i] {
				let out = render_directive(*kind, *size, arg.as_deref(), inputs, Some(share));
				rendered[i] = Some(out);
			}
		}

		let mut sgr_active = false;
		let mut out = Vec::with_capacity(terminal_width + 16);
		for (i, seg) in self.segments.iter().enumerate() {
			match seg {
				Segment::Literal { bytes, .. } => out.extend_from_slice(bytes),
				Segment::Directive { kind, .. } => {
					if matches!(kind, DirectiveKind::Sgr) && inputs.colour { sgr_active = true; }
					if let Some(bytes) = &rendered[i] { out.extend_from_slice(bytes); }
				},
			}
		}
		if sgr_active { out.extend_from_slice(b"\x1b[0m"); }

		let new_width = width::width(&out);
		if new_width < self.prev_width {
			let pad = (self.prev_width - new_width).min(MAX_TRAILING_PAD);
			out.extend(std::iter::repeat_n(b' ', pad));
		}
		self.prev_width = new_width;
		out
	}
}

fn render_directive(
	kind: DirectiveKind,
	size: u32,
	arg: Option<&[u8]>,
	inputs: &RenderInputs<'_>,
	dynamic_width: Option<usize>,
) -> Vec<u8> {
	match kind {
		DirectiveKind::Progress => render_progress(size, inputs, dynamic_width, true, inputs.bar_style),
		DirectiveKind::ProgressBarOnly => render_bar_only(size, inputs, dynamic_width, inputs.bar_style),
		DirectiveKind::ProgressAmountOnly => render_amount(inputs).into_bytes(),
		DirectiveKind::Bar(style_name) => {
			render_bar_only(size, inputs, dynamic_width, BarStyle::resolve(style_name, true))
		},
		DirectiveKind::Timer => render_timer(inputs).into_bytes(),
		DirectiveKind::Eta => format!("ETA {}", format_hms(inputs.eta_secs)).into_bytes(),
		DirectiveKind::FinEta => render_fineta(inputs).into_bytes(),
		DirectiveKind::Rate => format!("[{}/s]", format_size(inputs.rate as u64, inputs.decimal_units, inputs.bits)).into_bytes(),
		DirectiveKind::AverageRate => {
			format!("({}/s)", format_size(inputs.average_rate as u64, inputs.decimal_units, inputs.bits)).into_bytes()
		},
		DirectiveKind::Bytes => format_size(inputs.transferred, inputs.decimal_units, inputs.bits).into_bytes(),
		DirectiveKind::BufferPercent => match inputs.buffer_percent {
			Some(p) => format!("{:>3.0}%", p.clamp(0.0, 100.0)).into_bytes(),
			None => b"----".to_vec(),
		},
		DirectiveKind::LastWritten => inputs.last_bytes.to_vec(),
		DirectiveKind::PreviousLine => {
			let budget = arg_as_usize(arg).unwrap_or_else(|| dynamic_width.unwrap_or(size as usize));
			let len = width::length_for_width(inputs.previous_line, budget);
			inputs.previous_line[..len].to_vec()
		},
		DirectiveKind::Name => {
			let budget = if size > 0 { size as usize } else { dynamic_width.unwrap_or(inputs.name.len()) };
			format!("{:<width$}:", inputs.name, width = budget).into_bytes()
		},
		DirectiveKind::Sgr => render_sgr(arg, inputs.colour),
	}
}

fn arg_as_usize(arg: Option<&[u8]>) -> Option<usize> {
	arg.and_then(|a| std::str::from_utf8(a).ok()).and_then(|s| s.parse().ok())
}

fn render_sgr(arg: Option<&[u8]>, colour: bool) -> Vec<u8> {
	if !colour { return Vec::new(); }
	let codes = arg.and_then(|a| std::str::from_utf8(a).ok()).unwrap_or("0");
	format!("\x1b[{codes}m").into_bytes()
}

fn render_amount(inputs: &RenderInputs<'_>) -> String {
	match inputs.size.filter(|&s| s > 0) {
		Some(size) => {
			let pct = (100.0 * inputs.transferred as f64 / size as f64).clamp(0.0, 100_000.0);
			format!("{pct:>3.0}%")
		},
		None => format_size(inputs.transferred, inputs.decimal_units, inputs.bits),
	}
}

fn render_bar_only(size: u32, inputs: &RenderInputs<'_>, dynamic_width: Option<usize>, style: BarStyle) -> Vec<u8> {
	let width = dynamic_width.unwrap_or(size.max(1) as usize).max(1);
	let body = match inputs.size.filter(|&s| s > 0) {
		Some(size) => style.render(width, inputs.transferred as f64 / size as f64),
		None => style.render_sweep(width, Calculator::fold_sweep(inputs.sweep_pos)),
	};
	format!("[{body}]").into_bytes()
}

fn render_progress(size: u32, inputs: &RenderInputs<'_>, dynamic_width: Option<usize>, _sides: bool, style: BarStyle) -> Vec<u8> {
	let total = dynamic_width.unwrap_or(size.max(12) as usize).max(12);
	let amount = render_amount(inputs);
	let bar_width = total.saturating_sub(amount.len() + 3);
	let body = match inputs.size.filter(|&s| s > 0) {
		Some(size) => style.render(bar_width, inputs.transferred as f64 / size as f64),
		None => style.render_sweep(bar_width, Calculator::fold_sweep(inputs.sweep_pos)),
	};
	format!("[{body}] {amount}").into_bytes()
}

fn render_timer(inputs: &RenderInputs<'_>) -> String {
	if inputs.numeric { format!("{:.1}", inputs.elapsed_secs) }
	else { format_hms(inputs.elapsed_secs) }
}

fn render_fineta(inputs: &RenderInputs<'_>) -> String {
	let secs = inputs.fineta_epoch_secs.max(0) as u64;
	let (y, mo, d, hh, mm, ss) = civil_from_unix(secs);
	if inputs.eta_secs > 6.0 * 3600.0 {
		format!("FIN {y:04}-{mo:02}-{d:02} {hh:02}:{mm:02}:{ss:02}")
	}
	else {
		format!("FIN {hh:02}:{mm:02}:{ss:02}")
	}
}

#[must_use]
/// # Format Elapsed/ETA Seconds As `HH:MM:SS`, Or `D:HH:MM:SS` Past A Day.
///
/// The intra-day `HH:MM:SS` segment is assembled the same way the teacher's
/// progress bar fills its own elapsed-time slot: split into hours/minutes/
/// seconds via [`NiceElapsed::hms`], then written zero-padded with
/// [`write_time`]. Days (which `NiceElapsed` has no concept of) are
/// prepended separately when the total runs past 24 hours.
pub fn format_hms(total_secs: f64) -> String {
	let total_secs = total_secs.max(0.0).round() as u64;
	let days = total_secs / 86_400;
	let rem = u32::try_from(total_secs % 86_400).unwrap_or(u32::MAX);

	let [h, m, s] = NiceElapsed::hms(rem);
	let mut buf = [0_u8; 8];
	// Safety: `buf` is exactly the 8 bytes `write_time` fills (`HH:MM:SS`).
	unsafe { write_time(buf.as_mut_ptr(), h, m, s); }
	let hms = std::str::from_utf8(&buf).unwrap_or("00:00:00");

	if days > 0 { format!("{days}:{hms}") } else { hms.to_owned() }
}

#[cfg(test)]
mod tests {
	use super::*;
	use bar::BarStyleName;

	fn base_inputs() -> RenderInputs<'static> {
		RenderInputs {
			elapsed_secs: 65.0,
			numeric: false,
			eta_secs: 125.0,
			fineta_epoch_secs: 1_785_110_400,
			rate: 1024.0,
			average_rate: 2048.0,
			transferred: 512,
			size: Some(1024),
			buffer_percent: Some(50.0),
			sweep_pos: 0,
			last_bytes: b"abc",
			previous_line: b"previous line text",
			name: "widget",
			bits: false,
			decimal_units: false,
			colour: false,
			bar_style: BarStyle::resolve(BarStyleName::Plain, true),
		}
	}

	#[test]
	fn t_hms_formatting() {
		assert_eq!(format_hms(65.0), "00:01:05");
		assert_eq!(format_hms(90_065.0), "1:01:01:05");
	}

	#[test]
	fn t_literal_roundtrip() {
		let mut asm = Assembler::new(b"static text");
		let out = asm.render(&base_inputs(), 80);
		assert_eq!(out, b"static text");
	}

	#[test]
	fn t_timer_directive() {
		let mut asm = Assembler::new(b"%t");
		let out = asm.render(&base_inputs(), 80);
		assert_eq!(out, b"00:01:05");
	}

	#[test]
	fn t_eta_directive() {
		let mut asm = Assembler::new(b"%e");
		let out = asm.render(&base_inputs(), 80);
		assert_eq!(out, b"ETA 00:02:05");
	}

	#[test]
	fn t_bytes_directive() {
		let mut asm = Assembler::new(b"%b");
		let out = asm.render(&base_inputs(), 80);
		assert_eq!(out, b"512 B");
	}

	#[test]
	fn t_buffer_percent_splice_pass() {
		let mut inputs = base_inputs();
		inputs.buffer_percent = None;
		let mut asm = Assembler::new(b"%{buffer-percent}");
		let out = asm.render(&inputs, 80);
		assert_eq!(out, b"----");
	}

	#[test]
	fn t_name_directive_padded() {
		let mut asm = Assembler::new(b"%10{name}");
		let out = asm.render(&base_inputs(), 80);
		assert_eq!(out, b"widget    :");
	}

	#[test]
	fn t_usage_flags_set() {
		let asm = Assembler::new(b"%{last-written:10}%{previous-line:10}%{sgr:1}");
		assert!(asm.usage.last_written);
		assert!(asm.usage.previous_line);
		assert!(asm.usage.colour);
	}

	#[test]
	fn t_sgr_quiet_without_colour() {
		let mut asm = Assembler::new(b"%{sgr:31}text");
		let out = asm.render(&base_inputs(), 80);
		assert_eq!(out, b"text");
	}

	#[test]
	fn t_sgr_emits_reset_tail_with_colour() {
		let mut inputs = base_inputs();
		inputs.colour = true;
		let mut asm = Assembler::new(b"%{sgr:31}text");
		let out = asm.render(&inputs, 80);
		assert!(out.starts_with(b"\x1b[31m"));
		assert!(out.ends_with(b"\x1b[0m"));
	}

	#[test]
	fn t_trailing_pad_on_shrink() {
		let mut asm = Assembler::new(b"%t");
		let long = RenderInputs { elapsed_secs: 90_065.0, ..base_inputs() };
		let first = asm.render(&long, 80);
		assert_eq!(first, b"1:01:01:05");
		let second = asm.render(&base_inputs(), 80);
		assert!(second.len() > b"00:01:05".len());
		assert!(second.starts_with(b"00:01:05"));
	}

	#[test]
	fn t_unknown_size_bar_uses_sweep_indicator() {
		let mut inputs = base_inputs();
		inputs.size = None;

		inputs.sweep_pos = 0;
		let start = render_bar_only(10, &inputs, None, inputs.bar_style);
		assert!(start.starts_with(b"[*"));

		inputs.sweep_pos = 100;
		let end = render_bar_only(10, &inputs, None, inputs.bar_style);
		assert!(end.ends_with(b"*]"));
	}
}

/*!
# PV Core: Display Driver

Decides *whether* a refresh is emitted (force-output or foreground-only,
§4.6.5), probes the terminal size, and writes the assembled line to the
error stream with the right line ending. Grounded on
`fyi_msg::progress::mod`'s `tick_set_width`/terminal-probing shape,
generalized from that crate's own fixed three-part layout to an arbitrary
[`crate::format::Assembler`] template.
*/

use crate::control::Dimension;
use crate::format::{Assembler, RenderInputs};
use std::io::{
	self,
	Write,
};
use std::os::unix::io::RawFd;

/// # Minimum Usable Display Width Before A Render Is Skipped Entirely.
pub const MIN_DRAW_WIDTH: usize = 8;

/// # Status-Line Display Driver.
pub struct Display {
	assembler: Assembler,
	force: bool,
	numeric: bool,
	no_display: bool,
	produced_any: bool,
	last_was_numeric: bool,
}

impl Display {
	#[must_use]
	/// # New, From A Parsed Template And The Display-Affecting Flags.
	pub fn new(template: &[u8], force: bool, numeric: bool, no_display: bool) -> Self {
		Self {
			assembler: Assembler::new(template),
			force,
			numeric,
			no_display,
			produced_any: false,
			last_was_numeric: false,
		}
	}

	#[must_use]
	/// # Does This Template Use The Last-Written Preview?
	pub const fn wants_last_written(&self) -> bool { self.assembler.usage.last_written }

	#[must_use]
	/// # Does This Template Use The Previous-Completed-Line Preview?
	pub const fn wants_previous_line(&self) -> bool { self.assembler.usage.previous_line }

	#[must_use]
	/// # Does This Template Ever Emit Colour?
	pub const fn wants_colour(&self) -> bool { self.assembler.usage.colour }

	#[must_use]
	/// # Is Any Display Output Configured At All?
	pub const fn enabled(&self) -> bool { !self.no_display }

	/// # Render And Possibly Emit One Status Line (§4.6.5).
	///
	/// A refresh only reaches the terminal when `force` was set at
	/// construction or the process is currently the foreground member of
	/// the controlling terminal's process group. Numeric mode appends a
	/// newline (each update is its own line); otherwise a carriage return
	/// lets the next refresh overwrite this one in place.
	pub fn refresh<W: Write>(
		&mut self,
		out: &mut W,
		inputs: &RenderInputs<'_>,
		width: usize,
		foreground: bool,
	) -> io::Result<()> {
		if self.no_display || !(self.force || foreground) { return Ok(()); }
		if width < MIN_DRAW_WIDTH { return Ok(()); }

		let line = self.assembler.render(inputs, width);
		out.write_all(&line)?;
		out.write_all(if self.numeric { b"\n" } else { b"\r" })?;
		out.flush()?;

		self.produced_any = true;
		self.last_was_numeric = self.numeric;
		Ok(())
	}

	/// # Final Newline On Shutdown (§4.6.5, "On shutdown...").
	///
	/// A single trailing newline unless the last render was already
	/// numeric (which always ends in its own newline already) or nothing
	/// was ever produced.
	pub fn finish<W: Write>(&self, out: &mut W) -> io::Result<()> {
		if self.produced_any && !self.last_was_numeric {
			out.write_all(b"\n")?;
			out.flush()?;
		}
		Ok(())
	}
}

#[must_use]
/// # Resolve The Live Display Width/Height, Respecting User Pins (§4.6).
///
/// A pinned dimension is never re-probed; an auto dimension is refreshed
/// from the terminal (falling back to its prior value when the probe
/// fails, e.g. output is not a TTY).
pub fn probe_size(width: Dimension, height: Dimension) -> (u16, u16) {
	let probed = terminal_size::terminal_size();
	let w = match width {
		Dimension::Pinned(v) => v,
		Dimension::Auto(prev) => probed.map_or(prev, |(w, _)| w.0),
	};
	let h = match height {
		Dimension::Pinned(v) => v,
		Dimension::Auto(prev) => probed.map_or(prev, |(_, h)| h.0),
	};
	(w, h)
}

#[must_use]
/// # Is This Process Currently The Foreground Group Of `fd`'s Controlling Terminal?
///
/// Used to suppress writes while the whole pipeline has been background-
/// stopped via job control (§4.2, §5 "Shared resources"). If `fd` isn't a
/// terminal at all, this reports `true` (nothing to suppress for).
pub fn is_foreground(fd: RawFd) -> bool {
	// Safety: both calls are pure queries that take no pointers.
	let pgrp = unsafe { libc::tcgetpgrp(fd) };
	if pgrp < 0 { return true; }
	let mine = unsafe { libc::getpgrp() };
	pgrp == mine
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::format::bar::{BarStyle, BarStyleName};

	fn inputs() -> RenderInputs<'static> {
		RenderInputs {
			elapsed_secs: 1.0,
			numeric: false,
			eta_secs: 0.0,
			fineta_epoch_secs: 0,
			rate: 0.0,
			average_rate: 0.0,
			transferred: 0,
			size: None,
			buffer_percent: None,
			sweep_pos: 0,
			last_bytes: b"",
			previous_line: b"",
			name: "x",
			bits: false,
			decimal_units: false,
			colour: false,
			bar_style: BarStyle::resolve(BarStyleName::Plain, true),
		}
	}

	#[test]
	fn t_suppressed_when_not_forced_and_not_foreground() {
		let mut disp = Display::new(b"static", false, false, false);
		let mut buf = Vec::new();
		disp.refresh(&mut buf, &inputs(), 80, false).unwrap();
		assert!(buf.is_empty());
	}

	#[test]
	fn t_forced_emits_with_carriage_return() {
		let mut disp = Display::new(b"static", true, false, false);
		let mut buf = Vec::new();
		disp.refresh(&mut buf, &inputs(), 80, false).unwrap();
		assert_eq!(buf, b"static\r");
	}

	#[test]
	fn t_numeric_emits_with_newline() {
		let mut disp = Display::new(b"static", true, true, false);
		let mut buf = Vec::new();
		disp.refresh(&mut buf, &inputs(), 80, false).unwrap();
		assert_eq!(buf, b"static\n");
	}

	#[test]
	fn t_no_display_suppresses_even_when_forced() {
		let mut disp = Display::new(b"static", true, false, true);
		let mut buf = Vec::new();
		disp.refresh(&mut buf, &inputs(), 80, true).unwrap();
		assert!(buf.is_empty());
	}

	#[test]
	fn t_finish_appends_newline_after_non_numeric() {
		let mut disp = Display::new(b"static", true, false, false);
		let mut buf = Vec::new();
		disp.refresh(&mut buf, &inputs(), 80, false).unwrap();
		disp.finish(&mut buf).unwrap();
		assert_eq!(buf, b"static\r\n");
	}

	#[test]
	fn t_finish_noop_when_nothing_produced() {
		let disp = Display::new(b"static", false, false, false);
		let mut buf = Vec::new();
		disp.finish(&mut buf).unwrap();
		assert!(buf.is_empty());
	}
}

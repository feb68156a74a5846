/*!
# PV Core: Diagnostic Messages

This is the crate's entire "logging" layer. There is no `tracing`/`log`
subscriber: the handful of lines this tool ever prints outside the status
display (a fatal config error, a one-shot read-error warning, the final
stats summary) go through here so they can coordinate with the display
driver's "errors never overwrite the progress line in place" rule (see
[`crate::display`]).
*/

use std::io::{
	self,
	Write,
};



#[derive(Debug, Clone, Copy)]
/// # Message Kind.
///
/// Only affects the colour of the prefix; the prefix text itself is the
/// program name, matching the original's `cat(1)`-style error reporting.
pub enum MsgKind {
	/// # A fatal or recoverable error.
	Error,
	/// # A one-shot warning (e.g. skipped a bad region).
	Warning,
}

impl MsgKind {
	/// # SGR Code For This Kind.
	const fn sgr(self) -> &'static str {
		match self {
			Self::Error => "1;38;5;197",
			Self::Warning => "1;38;5;208",
		}
	}
}



/// # Print A Diagnostic Line.
///
/// Writes `name: text\n` to stderr, colourized by `kind` when `color` is
/// true. `leading_newline` should be set whenever any progress output has
/// already been produced this run, so the error does not get glued onto
/// the end of an in-progress status line (§7).
pub fn eprint(name: &str, kind: MsgKind, text: &str, color: bool, leading_newline: bool) {
	let mut out = io::stderr().lock();
	let _res = write_msg(&mut out, name, kind, text, color, leading_newline);
}

fn write_msg<W: Write>(
	out: &mut W,
	name: &str,
	kind: MsgKind,
	text: &str,
	color: bool,
	leading_newline: bool,
) -> io::Result<()> {
	if leading_newline { out.write_all(b"\n")?; }
	if color {
		write!(out, "\x1b[{}m{name}\x1b[0m: {text}\n", kind.sgr())?;
	}
	else {
		write!(out, "{name}: {text}\n")?;
	}
	out.flush()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn t_plain() {
		let mut buf = Vec::new();
		write_msg(&mut buf, "pv", MsgKind::Error, "boom", false, false).unwrap();
		assert_eq!(buf, b"pv: boom\n");
	}

	#[test]
	fn t_leading_newline() {
		let mut buf = Vec::new();
		write_msg(&mut buf, "pv", MsgKind::Warning, "skipped", false, true).unwrap();
		assert_eq!(buf, b"\npv: skipped\n");
	}

	#[test]
	fn t_color() {
		let mut buf = Vec::new();
		write_msg(&mut buf, "pv", MsgKind::Error, "boom", true, false).unwrap();
		assert!(buf.starts_with(b"\x1b[1;38;5;197mpv\x1b[0m"));
	}
}

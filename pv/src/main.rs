/*!
# PV

Pipe a stream through and watch it move: reads one or more files (or
`Stdin`), writes to a file (or `Stdout`), and prints a live status line to
`Stderr` while it does.
*/

#![warn(missing_docs)]
#![warn(trivial_casts)]
#![warn(trivial_numeric_casts)]
#![warn(unused_import_braces)]

#![deny(missing_copy_implementations)]
#![deny(missing_debug_implementations)]

#![warn(clippy::filetype_is_file)]
#![warn(clippy::integer_division)]
#![warn(clippy::needless_borrow)]

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::missing_errors_doc)]

mod cli;

use pv_core::control::Control;
use pv_core::engine::{InputSide, OutputSide};
use pv_core::error::PvError;
use pv_core::mainloop::Source;
use pv_core::msg::{eprint, MsgKind};
use std::io;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::Path;
use std::process::ExitCode;

fn main() -> ExitCode {
	let cli::Cli { inputs, output, control } = cli::parse(std::env::args().skip(1));

	match run(&inputs, output.as_deref(), &control) {
		Ok(flags) => ExitCode::from(flags),
		Err(e) => {
			eprint(&control.name, MsgKind::Error, &e.to_string(), stderr_is_tty(), false);
			ExitCode::from(e.exit_flag())
		},
	}
}

fn run(inputs: &[std::path::PathBuf], output: Option<&Path>, control: &Control) -> Result<pv_core::ExitFlags, PvError> {
	let mut open_inputs = Vec::new();
	if inputs.is_empty() {
		open_inputs.push(open_stdin()?);
	}
	else {
		for path in inputs { open_inputs.push(open_input(path)?); }
	}

	let mut output_side = match output {
		Some(path) => open_output(path)?,
		None => classify_output(io::stdout().as_raw_fd()),
	};

	let stderr_fd = io::stderr().as_raw_fd();
	let mut sources: Vec<Source> = open_inputs.into_iter()
		.map(|(side, block_size)| Source { side, block_size })
		.collect();

	let mut err = io::stderr();
	pv_core::mainloop::run(control, &mut sources, &mut output_side, stderr_fd, &mut err)
}

/// # Use `Stdin`'s Raw Descriptor Directly.
///
/// `Stdin` is a lock handle onto the process's already-open fd 0, not an
/// owner of it — dropping it does not close anything, so no leak-guarding
/// is needed the way it is for a freshly opened [`std::fs::File`] below.
fn open_stdin() -> Result<(InputSide, u64), PvError> {
	let fd = io::stdin().as_raw_fd();
	let (seekable, block_size) = classify_fd(fd);
	Ok((InputSide::new(fd, seekable), block_size))
}

/// # Open An Input Path, Leaking The `File` So Its Descriptor Outlives This Call.
///
/// The engine only ever touches the raw descriptor from here on; the run
/// is short-lived and every descriptor closes naturally at process exit.
fn open_input(path: &Path) -> Result<(InputSide, u64), PvError> {
	let file = std::fs::File::open(path)
		.map_err(|e| PvError::AccessDenied(path.to_path_buf(), e))?;
	let fd = file.as_raw_fd();
	let (seekable, block_size) = classify_fd(fd);
	std::mem::forget(file);
	Ok((InputSide::new(fd, seekable), block_size))
}

/// # Open An Output Path, Leaking The `File` For The Same Reason As `open_input`.
fn open_output(path: &Path) -> Result<OutputSide, PvError> {
	let file = std::fs::OpenOptions::new().write(true).create(true).truncate(true).open(path)
		.map_err(|e| PvError::AccessDenied(path.to_path_buf(), e))?;
	let fd = file.as_raw_fd();
	let side = classify_output(fd);
	std::mem::forget(file);
	Ok(side)
}

/// # Classify A Raw Descriptor Via `fstat` (Pipe/FIFO Vs. Regular File).
///
/// Returns `(seekable, block_size)`; anything that isn't a regular file
/// reports a block size of `65_536` (a reasonable pipe-buffer guess) so
/// [`Control::effective_buffer_size`] still has something sane to scale
/// from.
fn classify_fd(fd: RawFd) -> (bool, u64) {
	// Safety: `stat` is zero-initialized POD; `fstat` only ever writes to it.
	let mut stat: libc::stat = unsafe { std::mem::zeroed() };
	if unsafe { libc::fstat(fd, &mut stat) } != 0 { return (false, 65_536); }

	let is_reg = stat.st_mode & libc::S_IFMT == libc::S_IFREG;
	let block_size = if stat.st_blksize > 0 { stat.st_blksize as u64 } else { 65_536 };
	(is_reg, block_size)
}

fn classify_output(fd: RawFd) -> OutputSide {
	// Safety: same as `classify_fd`.
	let mut stat: libc::stat = unsafe { std::mem::zeroed() };
	let ok = unsafe { libc::fstat(fd, &mut stat) } == 0;
	let is_fifo = ok && stat.st_mode & libc::S_IFMT == libc::S_IFIFO;
	let is_reg = ok && stat.st_mode & libc::S_IFMT == libc::S_IFREG;
	OutputSide::new(fd, is_fifo, is_reg)
}

/// # Cheap "Is `Stderr` A Terminal?" Hint.
///
/// Used only to decide whether the one-shot fatal-error line gets an SGR
/// wrapper; the display driver has its own, more careful, foreground/TTY
/// handling for the status line itself.
fn stderr_is_tty() -> bool {
	// Safety: `isatty` takes no pointers.
	unsafe { libc::isatty(io::stderr().as_raw_fd()) == 1 }
}

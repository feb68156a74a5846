/*!
# PV Core: Transfer Engine

The byte-accurate data mover: bounded read/write retry, the splice(2)
fast path, error-skipping, sparse writes, line-mode bookkeeping, and
output-pipe backpressure accounting (§4.4). Grounded in idiom on
`fyi_msg::progress::mod::ProglessInner`'s counter fields (`done`/`total`
as plain atomics updated once per tick) generalized to the much larger
state this engine owns; the raw-fd work itself (`splice`, `poll`,
`ioctl(FIONREAD)`) has no counterpart in the teacher's stack and is
grounded directly on spec §4.4's contract instead.
*/

pub mod lastbytes;
pub mod line_ring;
pub mod pure;

use crate::control::{
	ErrorSkip,
	Flags,
};
use crate::error::PvError;
use lastbytes::LastBytes;
use line_ring::LineRing;
use std::io;
use std::os::unix::io::RawFd;
use std::time::{
	Duration,
	Instant,
};

/// # Single-Read Cap (§4.4.2).
pub const MAX_READ_AT_ONCE: usize = 512 * 1024;

/// # Single-Write Cap (§4.4.5).
pub const MAX_WRITE_AT_ONCE: usize = 512 * 1024;

/// # Read-Retry Wall-Clock Budget (§4.4.2).
pub const TRANSFER_READ_TIMEOUT: Duration = Duration::from_millis(90);

/// # Write-Retry Wall-Clock Budget (§4.4.5).
pub const TRANSFER_WRITE_TIMEOUT: Duration = Duration::from_millis(900);



#[derive(Debug)]
/// # Input-Side State, Per Open File Descriptor.
pub struct InputSide {
	pub fd: RawFd,
	/// # Whether `lseek` works on this fd (regular files, not pipes).
	pub seekable: bool,
	pub offset: u64,
	pub eof: bool,
	pub read_errors_in_a_row: u32,
	pub warning_shown: bool,
	pub splice_failed: bool,
}

impl InputSide {
	#[must_use]
	pub const fn new(fd: RawFd, seekable: bool) -> Self {
		Self {
			fd,
			seekable,
			offset: 0,
			eof: false,
			read_errors_in_a_row: 0,
			warning_shown: false,
			splice_failed: false,
		}
	}
}



#[derive(Debug)]
/// # Output-Side State.
pub struct OutputSide {
	pub fd: RawFd,
	pub is_pipe: bool,
	pub seekable: bool,
	pub pos: u64,
	pub pipe_closed: bool,
}

impl OutputSide {
	#[must_use]
	pub const fn new(fd: RawFd, is_pipe: bool, seekable: bool) -> Self {
		Self { fd, is_pipe, seekable, pos: 0, pipe_closed: false }
	}
}



#[derive(Debug, Clone, Copy)]
/// # Per-Call Engine Configuration (the parts of `Control` the engine needs).
pub struct EngineConfig {
	pub line_mode: bool,
	pub null_terminated: bool,
	pub no_splice: bool,
	pub sparse_output: bool,
	pub discard_input: bool,
	pub sync_after_write: bool,
	pub error_skip: ErrorSkip,
	pub error_skip_block: u64,
	pub last_bytes_window: usize,
}

impl EngineConfig {
	#[must_use]
	pub fn from_flags(flags: Flags, error_skip: ErrorSkip, error_skip_block: u64, last_bytes_window: usize) -> Self {
		Self {
			line_mode: flags.contains(Flags::LINE_MODE),
			null_terminated: flags.contains(Flags::NULL_TERMINATED_LINES),
			no_splice: flags.contains(Flags::NO_SPLICE),
			sparse_output: flags.contains(Flags::SPARSE_OUTPUT),
			discard_input: flags.contains(Flags::DISCARD_INPUT),
			sync_after_write: flags.contains(Flags::SYNC_AFTER_WRITE),
			error_skip,
			error_skip_block,
			last_bytes_window,
		}
	}

	const fn separator(&self) -> u8 { if self.null_terminated { 0 } else { b'\n' } }
}



#[derive(Debug)]
/// # Transfer Engine.
pub struct Engine {
	buffer: Vec<u8>,
	buffer_size: usize,
	read_pos: usize,
	write_pos: usize,

	pub total_bytes_read: u64,
	/// # Always In Bytes, Regardless Of Line Mode (used for backpressure math).
	pub total_written_bytes: u64,
	/// # In The Unit The Display Shows (bytes, or lines in line-mode).
	pub total_written_units: u64,
	pub transferred: u64,
	pub written_but_not_consumed: u64,

	pub line_positions: LineRing,
	pub last_bytes: LastBytes,
	pub previous_line: Vec<u8>,
	next_line_accum: Vec<u8>,

	pub splice_used_this_pass: bool,
}

impl Engine {
	#[must_use]
	/// # New, With A Fixed Buffer Size.
	pub fn new(buffer_size: usize, last_bytes_window: usize) -> Self {
		Self {
			buffer: vec![0; buffer_size],
			buffer_size,
			read_pos: 0,
			write_pos: 0,

			total_bytes_read: 0,
			total_written_bytes: 0,
			total_written_units: 0,
			transferred: 0,
			written_but_not_consumed: 0,

			line_positions: LineRing::new(),
			last_bytes: LastBytes::new(last_bytes_window),
			previous_line: Vec::new(),
			next_line_accum: Vec::new(),

			splice_used_this_pass: false,
		}
	}

	#[must_use]
	/// # Is There Still Unwritten Data Sitting In The Buffer?
	pub const fn has_pending(&self) -> bool { self.write_pos < self.read_pos }

	#[must_use]
	/// # Fraction Of The Buffer Currently Occupied, 0.0..=100.0.
	///
	/// `None` on a pass where the splice fast path was used, matching the
	/// `buffer-percent` directive's `----` fallback (§4.6.1).
	pub fn buffer_percent(&self) -> Option<f64> {
		if self.splice_used_this_pass { return None; }
		if self.buffer_size == 0 { return Some(0.0); }
		Some(100.0 * (self.read_pos - self.write_pos) as f64 / self.buffer_size as f64)
	}

	/// # One Transfer Pass (§4.4.1).
	///
	/// Returns bytes (or lines, in line-mode) written this pass, or an
	/// `Err` on a fatal write error. `allowed` already reflects any rate
	/// limit / stop-at-size reduction the main loop applied (§4.7 steps
	/// 3-4).
	pub fn transfer(
		&mut self,
		input: &mut InputSide,
		output: &mut OutputSide,
		cfg: &EngineConfig,
		allowed: u64,
	) -> Result<i64, PvError> {
		self.splice_used_this_pass = false;

		// Zero-copy fast path (§4.4.3).
		if self.can_splice(input, output, cfg) {
			match self.try_splice(input, output, allowed, cfg) {
				Ok(Some(n)) => return Ok(n as i64),
				Ok(None) => {}, // demoted; fall through to the ordinary path.
				Err(e) => return Err(e),
			}
		}

		self.bounded_read(input, cfg, allowed)?;

		let written = self.bounded_write(output, cfg, false)?;
		self.drain_on_pipe_closed(output, Some(input));
		Ok(written)
	}

	/// # Drain The Buffer And Mark The Input Exhausted After A Broken Pipe (§4.4.5).
	///
	/// Mirrors the splice path's own `EPIPE` branch: once
	/// [`bounded_write`](Self::bounded_write) has set `output.pipe_closed`,
	/// there is nothing left to usefully do with whatever remains pending —
	/// the region is treated as delivered so `has_pending` goes false, and
	/// the input (if any is still open) is marked at EOF so the main loop
	/// can wind down instead of spinning forever waiting for both to clear.
	fn drain_on_pipe_closed(&mut self, output: &OutputSide, input: Option<&mut InputSide>) {
		if !output.pipe_closed { return; }
		self.write_pos = 0;
		self.read_pos = 0;
		if let Some(input) = input { input.eof = true; }
	}

	fn can_splice(&self, input: &InputSide, output: &OutputSide, cfg: &EngineConfig) -> bool {
		!cfg.line_mode
			&& !cfg.no_splice
			&& !cfg.discard_input
			&& !input.splice_failed
			&& self.read_pos == self.write_pos
			&& output.fd >= 0
	}

	/// # Attempt `splice(2)`.
	///
	/// `Ok(None)` means splice is unavailable for this fd pair and the
	/// caller should fall back to the read/write path; the fd is demoted
	/// permanently for the remainder of the transfer (§4.4.3).
	fn try_splice(
		&mut self,
		input: &mut InputSide,
		output: &mut OutputSide,
		allowed: u64,
		cfg: &EngineConfig,
	) -> Result<Option<u64>, PvError> {
		let request = if allowed > 0 { allowed } else { self.buffer_size as u64 };
		let request = request.min(MAX_READ_AT_ONCE as u64);

		// Safety: both fds are valid and owned for the duration of the
		// call; null offsets mean "use/advance the fd's own position".
		let n = unsafe {
			libc::splice(
				input.fd, std::ptr::null_mut(),
				output.fd, std::ptr::null_mut(),
				request as usize,
				libc::SPLICE_F_MOVE | libc::SPLICE_F_NONBLOCK,
			)
		};

		if n < 0 {
			let err = io::Error::last_os_error();
			match err.raw_os_error() {
				Some(libc::EINVAL) | Some(libc::ENOSYS) => {
					input.splice_failed = true;
					return Ok(None);
				},
				Some(libc::EAGAIN) | Some(libc::EINTR) => return Ok(Some(0)),
				Some(libc::EPIPE) => {
					output.pipe_closed = true;
					input.eof = true;
					return Ok(Some(0));
				},
				_ => return Err(PvError::TransferWrite(err)),
			}
		}

		let n = n as u64;
		self.splice_used_this_pass = true;
		if n == 0 {
			input.eof = true;
		}
		else {
			self.total_bytes_read += n;
			self.total_written_bytes += n;
			self.total_written_units += n;
			// Splice bytes never pass through `self.buffer`, so there is
			// nothing for the last-written preview to show for this pass.
			if cfg.sync_after_write {
				if unsafe { libc::fsync(output.fd) } != 0 {
					return Err(PvError::TransferWrite(io::Error::last_os_error()));
				}
			}
		}
		Ok(Some(n))
	}

	/// # Bounded Read, With Retry (§4.4.2).
	fn bounded_read(&mut self, input: &mut InputSide, cfg: &EngineConfig, allowed: u64) -> Result<(), PvError> {
		if input.eof { return Ok(()); }

		let start = Instant::now();
		let mut made_progress = false;

		loop {
			let free = self.buffer_size - self.read_pos;
			if free == 0 { break; }

			let mut cap = free.min(MAX_READ_AT_ONCE);
			if allowed > 0 { cap = cap.min(allowed as usize); }
			if cap == 0 { break; }

			// Safety: writing into the unused tail of `self.buffer`, which
			// has at least `cap` bytes free past `read_pos`.
			let n = unsafe {
				libc::read(
					input.fd,
					self.buffer.as_mut_ptr().add(self.read_pos).cast(),
					cap,
				)
			};

			if n < 0 {
				let err = io::Error::last_os_error();
				match err.raw_os_error() {
					Some(libc::EINTR) | Some(libc::EAGAIN) => {
						if made_progress { break; }
						return Ok(()); // transient; try again next pass.
					},
					_ => {
						if cfg.error_skip.is_enabled() {
							self.apply_error_skip(input, cfg)?;
							made_progress = true;
							continue;
						}
						input.eof = true;
						return Err(PvError::TransferRead(err));
					},
				}
			}

			let n = n as usize;
			if n == 0 {
				input.eof = true;
				if self.read_pos == self.write_pos {
					// Nothing left buffered either; the output side can
					// also be marked done once the caller observes this.
				}
				break;
			}

			input.offset += n as u64;
			self.read_pos += n;
			self.total_bytes_read += n as u64;
			made_progress = true;

			if start.elapsed() >= TRANSFER_READ_TIMEOUT { break; }
		}

		Ok(())
	}

	/// # Error-Skip (§4.4.4).
	fn apply_error_skip(&mut self, input: &mut InputSide, cfg: &EngineConfig) -> Result<(), PvError> {
		let skip = pure::adaptive_skip_amount(input.read_errors_in_a_row, cfg.error_skip_block);
		let remaining_in_buffer = (self.buffer_size - self.read_pos) as u64;
		let skip = skip.min(remaining_in_buffer.max(1));

		let target = pure::align_skip_target(input.offset, skip);

		// Safety: `lseek` takes no pointers; a negative return is the
		// documented error signal.
		let rc = unsafe { libc::lseek(input.fd, target as i64, libc::SEEK_SET) };
		if rc < 0 {
			input.eof = true;
			return Ok(());
		}
		input.offset = target;

		let n = skip as usize;
		let n = n.min(self.buffer_size - self.read_pos);
		for b in &mut self.buffer[self.read_pos..self.read_pos + n] { *b = 0; }
		self.read_pos += n;
		self.total_bytes_read += n as u64;

		input.read_errors_in_a_row += 1;
		if !input.warning_shown {
			input.warning_shown = true;
		}

		Ok(())
	}

	/// # Bounded Write, With Retry (§4.4.5).
	///
	/// `flush_final` disables line alignment so a trailing partial line is
	/// written as a final block at EOF (§4.4.7, boundary scenario 4).
	fn bounded_write(&mut self, output: &mut OutputSide, cfg: &EngineConfig, flush_final: bool) -> Result<i64, PvError> {
		let pending_end = self.line_aligned_end(cfg, flush_final);
		if pending_end <= self.write_pos { return Ok(0); }

		let mut total_written = 0i64;
		let start = Instant::now();

		while self.write_pos < pending_end {
			let chunk_end = pending_end.min(self.write_pos + MAX_WRITE_AT_ONCE);
			let chunk: Vec<u8> = self.buffer[self.write_pos..chunk_end].to_vec();

			if cfg.sparse_output && output.seekable && pure::is_all_zero(&chunk) {
				let advanced = self.sparse_advance(output, chunk.len() as u64);
				let len = chunk.len();
				self.after_write(output, cfg, len, advanced, &chunk);
				total_written += len as i64;
				continue;
			}

			if cfg.discard_input {
				// Never actually write; just account for it as delivered.
				let len = chunk.len();
				self.after_write(output, cfg, len, false, &chunk);
				total_written += len as i64;
				continue;
			}

			// Safety: `chunk` is a valid slice with `chunk.len()` initialized bytes.
			let n = unsafe { libc::write(output.fd, chunk.as_ptr().cast(), chunk.len()) };

			if n < 0 {
				let err = io::Error::last_os_error();
				match err.raw_os_error() {
					Some(libc::EINTR) | Some(libc::EAGAIN) => {
						if start.elapsed() >= TRANSFER_WRITE_TIMEOUT { break; }
						continue;
					},
					Some(libc::EPIPE) => {
						output.pipe_closed = true;
						return Ok(total_written);
					},
					_ => return Err(PvError::TransferWrite(err)),
				}
			}

			let n = n as usize;
			if n == 0 {
				if start.elapsed() >= TRANSFER_WRITE_TIMEOUT { break; }
				std::thread::sleep(Duration::from_millis(5));
				continue;
			}

			if cfg.sync_after_write {
				let rc = unsafe { libc::fsync(output.fd) };
				if rc != 0 { return Err(PvError::TransferWrite(io::Error::last_os_error())); }
			}

			self.after_write(output, cfg, n, true, &chunk[..n]);
			total_written += n as i64;

			if start.elapsed() >= TRANSFER_WRITE_TIMEOUT { break; }
		}

		if self.write_pos == self.read_pos {
			self.write_pos = 0;
			self.read_pos = 0;
		}

		Ok(total_written)
	}

	/// # Account For A Completed (Or Sparse-Skipped) Write Chunk.
	fn after_write(&mut self, output: &mut OutputSide, cfg: &EngineConfig, len: usize, materialized: bool, chunk: &[u8]) {
		self.write_pos += len;
		output.pos += len as u64;
		self.total_written_bytes += len as u64;

		let sep = cfg.separator();
		if cfg.line_mode {
			let mut lines_here = 0u64;
			for (i, &b) in chunk.iter().enumerate() {
				if b == sep {
					let abs_offset = output.pos - chunk.len() as u64 + i as u64 + 1;
					self.line_positions.push(abs_offset);
					lines_here += 1;
					self.previous_line.clear();
					self.previous_line.extend_from_slice(&self.next_line_accum);
					self.next_line_accum.clear();
				}
				else {
					self.next_line_accum.push(b);
				}
			}
			self.total_written_units += lines_here;
		}
		else {
			self.total_written_units += len as u64;
		}

		if materialized { self.last_bytes.push(chunk); }
	}

	/// # Which Pending-Region End Respects Line Alignment (§4.4.7).
	///
	/// In byte mode this is simply `read_pos` (no alignment needed). In
	/// line mode it is the offset just past the last separator in the
	/// pending region, unless `flush_final` (EOF reached) is set, in which
	/// case the entire pending region is eligible.
	fn line_aligned_end(&self, cfg: &EngineConfig, flush_final: bool) -> usize {
		if !cfg.line_mode || flush_final { return self.read_pos; }
		let pending = &self.buffer[self.write_pos..self.read_pos];
		match pure::line_aligned_write_len(pending, cfg.separator()) {
			Some(n) => self.write_pos + n,
			None => self.write_pos,
		}
	}

	/// # Flush Whatever Remains At EOF, Ignoring Line Alignment (§4.4.7).
	pub fn flush_final(&mut self, output: &mut OutputSide, cfg: &EngineConfig) -> Result<i64, PvError> {
		let written = self.bounded_write(output, cfg, true)?;
		self.drain_on_pipe_closed(output, None);
		Ok(written)
	}

	fn sparse_advance(&mut self, output: &mut OutputSide, len: u64) -> bool {
		// Safety: `lseek` takes no pointers.
		let rc = unsafe { libc::lseek(output.fd, len as i64, libc::SEEK_CUR) };
		if rc < 0 {
			output.seekable = false;
			return false;
		}
		true
	}

	/// # Truncate The Output So Trailing Sparse Writes Become A Hole.
	pub fn finalize_sparse(&self, output: &OutputSide) -> io::Result<()> {
		if unsafe { libc::ftruncate(output.fd, output.pos as i64) } != 0 {
			return Err(io::Error::last_os_error());
		}
		Ok(())
	}

	/// # Pipe-Backpressure Refresh (§4.4.8).
	///
	/// Queries the kernel for unread bytes via `ioctl(FIONREAD)`; on a
	/// platform/fd where that capability is absent, falls back to the
	/// documented pessimistic `transferred = total_written` (§9, Design
	/// Notes: "Pipe-buffer introspection as a capability").
	pub fn refresh_backpressure(&mut self, output: &OutputSide, cfg: &EngineConfig) {
		if !output.is_pipe {
			self.transferred = self.total_written_units;
			return;
		}

		let mut unread: libc::c_int = 0;
		let rc = unsafe { libc::ioctl(output.fd, libc::FIONREAD, &mut unread) };
		if rc != 0 {
			self.transferred = self.total_written_units;
			return;
		}
		let unread = unread.max(0) as u64;
		self.written_but_not_consumed = unread;

		if cfg.line_mode {
			let consumed_bytes = self.total_written_bytes.saturating_sub(unread);
			let lines_not_consumed = self.line_positions.count_after(consumed_bytes);
			self.transferred = pure::line_backpressure_transferred(self.total_written_units, lines_not_consumed);
		}
		else {
			self.transferred = pure::backpressure_transferred(self.total_written_units, unread);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::os::unix::io::FromRawFd;

	fn make_pipe() -> (std::fs::File, std::fs::File) {
		let mut fds = [0i32; 2];
		unsafe { assert_eq!(libc::pipe(fds.as_mut_ptr()), 0); }
		unsafe { (std::fs::File::from_raw_fd(fds[0]), std::fs::File::from_raw_fd(fds[1])) }
	}

	fn byte_cfg() -> EngineConfig {
		EngineConfig {
			line_mode: false,
			null_terminated: false,
			no_splice: true,
			sparse_output: false,
			discard_input: false,
			sync_after_write: false,
			error_skip: ErrorSkip::Off,
			error_skip_block: 0,
			last_bytes_window: 16,
		}
	}

	#[test]
	fn t_basic_round_trip() {
		use std::io::Write;
		use std::os::unix::io::AsRawFd;

		let (r_in, mut w_in) = make_pipe();
		let (r_out, w_out) = make_pipe();

		w_in.write_all(b"hello\n").unwrap();
		drop(w_in);

		let mut engine = Engine::new(4096, 16);
		let mut input = InputSide::new(r_in.as_raw_fd(), false);
		let mut output = OutputSide::new(w_out.as_raw_fd(), true, false);
		let cfg = byte_cfg();

		let written = engine.transfer(&mut input, &mut output, &cfg, 0).unwrap();
		assert!(written > 0);
		assert_eq!(engine.total_written_units, 6);

		drop(output);
		let mut buf = Vec::new();
		use std::io::Read;
		let mut r_out = r_out;
		r_out.read_to_end(&mut buf).unwrap();
		assert_eq!(buf, b"hello\n");
	}

	#[test]
	fn t_line_mode_holds_back_partial() {
		use std::io::Write;
		use std::os::unix::io::AsRawFd;

		let (r_in, mut w_in) = make_pipe();
		let (r_out, w_out) = make_pipe();

		w_in.write_all(b"A\nB\nC\nD").unwrap();
		drop(w_in);

		let mut engine = Engine::new(4096, 16);
		let mut input = InputSide::new(r_in.as_raw_fd(), false);
		let mut output = OutputSide::new(w_out.as_raw_fd(), true, false);
		let mut cfg = byte_cfg();
		cfg.line_mode = true;

		engine.transfer(&mut input, &mut output, &cfg, 0).unwrap();
		assert_eq!(engine.total_written_units, 3); // "A\n", "B\n", "C\n"

		drop(output);
		let mut buf = Vec::new();
		use std::io::Read;
		let mut r_out = r_out;
		r_out.read_to_end(&mut buf).unwrap();
		assert_eq!(buf, b"A\nB\nC\n");
	}

	#[test]
	fn t_broken_pipe_drains_buffer_and_marks_input_eof() {
		use std::io::Write;
		use std::os::unix::io::AsRawFd;

		// A write to a pipe with no reader raises `SIGPIPE` by default;
		// the real process ignores it (`pv_core::signals`) so `write(2)`
		// reports `EPIPE` instead, and this test needs the same behavior.
		unsafe { libc::signal(libc::SIGPIPE, libc::SIG_IGN); }

		let (r_in, mut w_in) = make_pipe();
		let (r_out, w_out) = make_pipe();
		drop(r_out); // no one will ever read the output again.

		w_in.write_all(b"hello\n").unwrap();
		drop(w_in);

		let mut engine = Engine::new(4096, 16);
		let mut input = InputSide::new(r_in.as_raw_fd(), false);
		let mut output = OutputSide::new(w_out.as_raw_fd(), true, false);
		let cfg = byte_cfg();

		let _ = engine.transfer(&mut input, &mut output, &cfg, 0);

		assert!(output.pipe_closed);
		assert!(input.eof);
		assert!(!engine.has_pending());
	}
}

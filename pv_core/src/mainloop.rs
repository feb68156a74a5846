/*!
# PV Core: Main Loop

The twelve-step transfer loop (§4.7), tying the engine, rate calculator,
clock, signal adapter, and display together into one run. Grounded in
shape on `ProglessInner::tick`'s "gather state, decide whether to redraw,
write once" rhythm, though every step's content here follows the transfer
semantics this tool actually needs rather than the teacher's task-list
domain.
*/

use crate::control::Control;
use crate::display::{is_foreground, probe_size, Display};
use crate::engine::{Engine, EngineConfig, InputSide, OutputSide};
use crate::error::{ExitFlags, PvError};
use crate::format::bar::BarStyle;
use crate::format::RenderInputs;
use crate::msg::{eprint, MsgKind};
use crate::rate::Calculator;
use crate::readiness::wait_ready;
use crate::signals::{wake_process_group, Signals};
use crate::time::Clock;
use std::io::Write;
use std::os::unix::io::RawFd;
use std::time::{
	Duration,
	Instant,
	SystemTime,
	UNIX_EPOCH,
};

/// # How Often The Rate-Limit Budget Receives A New Grant (§4.7 step 3).
const RATE_GRANULARITY_SECS: f64 = 0.05;

/// # Burst Window, As A Multiple Of The Configured Rate (§4.7 step 3, GLOSSARY).
const BURST_WINDOW_SECS: f64 = 2.0;

/// # Sleep Applied When Both EOFs Are Reached But The Pipe Still Holds Data.
///
/// The fix for bug #164 (§4.7 step 8): without this, the loop would spin
/// hot waiting for a slow consumer to drain the last bytes.
const EOF_PENDING_SLEEP: Duration = Duration::from_millis(50);

/// # Window Size For The `last-written` Preview When The Template Uses It.
const LAST_WRITTEN_WINDOW: usize = 32;

/// # One Input Source, Already Opened By The Caller.
pub struct Source {
	/// # Engine-Owned Read State.
	pub side: InputSide,
	/// # Output Block Size Reported For This Source (feeds buffer sizing).
	pub block_size: u64,
}

/// # Run The Transfer To Completion, Returning Accumulated Exit Flags.
///
/// `stderr_fd` is the raw fd backing `err` (used for the foreground-group
/// check, §4.6.5); `err` is the writer the status line and diagnostics
/// actually go to.
pub fn run<W: Write>(
	control: &Control,
	sources: &mut [Source],
	output: &mut OutputSide,
	stderr_fd: RawFd,
	err: &mut W,
) -> Result<ExitFlags, PvError> {
	use crate::control::Flags;

	let mut exit_flags = ExitFlags::NONE;
	let signals = Signals::install()?;

	let template = control.format.clone().unwrap_or_else(|| default_template(control));
	let mut display = Display::new(
		template.as_bytes(),
		control.flags.contains(Flags::FORCE),
		control.flags.contains(Flags::NUMERIC_ONLY),
		control.flags.contains(Flags::NO_DISPLAY),
	);

	let last_bytes_window = if display.wants_last_written() { LAST_WRITTEN_WINDOW } else { 0 };
	let engine_cfg = EngineConfig::from_flags(
		control.flags,
		control.error_skip,
		control.error_skip_block,
		last_bytes_window,
	);

	let buffer_size = control.effective_buffer_size(
		sources.first().map_or(65_536, |s| s.block_size),
	) as usize;
	let mut engine = Engine::new(buffer_size.max(1), last_bytes_window);

	let clock = Clock::new(control.flags.contains(Flags::WAIT_FOR_FIRST_BYTE));
	let mut calc = Calculator::new(control.rate_window.max(1));

	let bar_style = BarStyle::resolve(
		crate::format::bar::BarStyleName::parse(&control.bar_style)
			.unwrap_or(crate::format::bar::BarStyleName::Plain),
		true,
	);

	let bits = control.flags.contains(Flags::BITS_NOT_BYTES);
	let decimal_units = control.flags.contains(Flags::DECIMAL_UNITS);
	let colour = display.wants_colour();

	let mut rate_target: f64 = 0.0;
	let mut next_grant = Instant::now();
	let burst_cap = control.rate_limit.map(|r| r.get() as f64 * BURST_WINDOW_SECS);

	let mut cur = 0usize;
	let mut input_eof_all = sources.is_empty();
	let mut output_eof = false;
	let mut final_update = false;
	let mut any_warning_printed = false;

	let mut next_refresh = Instant::now() + Duration::from_secs_f64(control.delay_start.max(0.0));
	let interval = control.clamped_interval();

	loop {
		// Step 1: remote-control polling is out of scope for this core; no-op.

		// Step 2: cooperative cancellation.
		if signals.exit_requested() {
			exit_flags.set(ExitFlags::SIGNAL);
			break;
		}

		// Stop/resume edges (§4.2): freeze/unfreeze the clock, re-raise
		// SIGCONT to the process group on the background edge.
		let (went_bg, came_fg) = signals.take_stop_resume();
		if went_bg {
			clock.record_stop();
			wake_process_group();
		}
		if came_fg { clock.record_resume(); }

		// Step 3: rate-limit budget.
		let mut allowed: u64 = 0;
		if let Some(rate) = control.rate_limit {
			if Instant::now() >= next_grant {
				rate_target += rate.get() as f64 * RATE_GRANULARITY_SECS;
				if let Some(cap) = burst_cap { rate_target = rate_target.min(cap); }
				next_grant = Instant::now() + Duration::from_secs_f64(RATE_GRANULARITY_SECS);
			}
			allowed = rate_target as u64;
		}

		// Step 4: stop-at-size.
		if control.flags.contains(Flags::STOP_AT_SIZE) {
			if let Some(size) = control.declared_size {
				let budget_if_unbounded = if allowed == 0 { u64::MAX } else { allowed };
				let remaining = size.saturating_sub(engine.total_written_bytes);
				allowed = budget_if_unbounded.min(remaining.max(1));
				if remaining == 0 {
					input_eof_all = true;
					output_eof = true;
				}
			}
		}

		// Step 5: transfer.
		if !input_eof_all && cur < sources.len() {
			let written = {
				let source = &mut sources[cur];
				engine.transfer(&mut source.side, output, &engine_cfg, allowed)
			};
			match written {
				Ok(n) => {
					if n > 0 && control.rate_limit.is_some() {
						rate_target = (rate_target - n as f64).max(0.0);
					}
					clock.first_byte_arrived();
				},
				Err(e) => {
					match &e {
						PvError::TransferRead(_) => {
							if !sources[cur].side.warning_shown {
								eprint(&control.name, MsgKind::Warning, &e.to_string(), colour, any_warning_printed);
								any_warning_printed = true;
							}
							sources[cur].side.eof = true;
						},
						PvError::TransferWrite(_) => {
							exit_flags.set(ExitFlags::TRANSFER);
							eprint(&control.name, MsgKind::Error, &e.to_string(), colour, any_warning_printed);
							break;
						},
						_ => return Err(e),
					}
				},
			}
		}

		// Step 6: pipe-backpressure accounting.
		if output.is_pipe {
			engine.refresh_backpressure(output, &engine_cfg);
		}
		else {
			engine.transferred = engine.total_written_units;
		}

		// Step 7: advance to the next input source once the current one is exhausted.
		if cur < sources.len() && sources[cur].side.eof && engine_exhausted(&engine) {
			advise_sequential(sources[cur].side.fd);
			cur += 1;
			if cur >= sources.len() { input_eof_all = true; }
		}

		// Once every input is exhausted, drop line-alignment's holdback on
		// the trailing partial line so it still reaches the output (§4.4.7,
		// boundary scenario 4).
		if input_eof_all {
			match engine.flush_final(output, &engine_cfg) {
				Ok(_) => {},
				Err(e) => {
					exit_flags.set(ExitFlags::TRANSFER);
					eprint(&control.name, MsgKind::Error, &e.to_string(), colour, any_warning_printed);
					break;
				},
			}
		}

		// Step 8: elapsed time / final-update detection.
		let (_secs, _changed) = clock.tick_seconds_cache();
		if input_eof_all && engine_exhausted(&engine) {
			if output.is_pipe && engine.written_but_not_consumed > 0 {
				std::thread::sleep(EOF_PENDING_SLEEP);
			}
			else {
				output_eof = true;
				final_update = true;
				next_refresh = Instant::now();
			}
		}

		// Step 9: wait-for-first-byte gating.
		if clock.is_waiting_for_first_byte() {
			if input_eof_all { /* never saw a byte; fall through and finish. */ }
			else { continue; }
		}

		// Step 10: nothing to show at all.
		let show_stats = control.flags.contains(Flags::SHOW_STATS);
		if !display.enabled() && !show_stats && !final_update {
			if output_eof { break; }
			poll_for_readiness(sources, cur, output);
			continue;
		}

		// Step 11: refresh-interval gating.
		let now = Instant::now();
		if now < next_refresh && !final_update {
			poll_for_readiness(sources, cur, output);
			continue;
		}
		if !final_update {
			next_refresh += Duration::from_secs_f64(interval);
			if next_refresh < now { next_refresh = now; }
		}

		// Step 12: resize + render.
		let resized = signals.take_resized();
		let (width, height) = probe_size(control.width, control.height);
		let _ = (resized, height); // height has no renderer use in this template grammar.

		let elapsed = clock.elapsed_secs_f64();
		if final_update {
			calc.finalize(engine.transferred, 0, elapsed, bits);
		}
		else {
			calc.refresh(engine.transferred, elapsed, bits);
		}
		let sweep_pos = calc.advance_sweep();

		let eta = control.declared_size.map_or(0.0, |sz| calc.eta_secs(engine.transferred, sz));
		let now_epoch = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO).as_secs() as i64;
		let last_bytes_display = engine.last_bytes.display();

		let inputs = RenderInputs {
			elapsed_secs: elapsed,
			numeric: control.flags.contains(Flags::NUMERIC_ONLY),
			eta_secs: eta,
			fineta_epoch_secs: now_epoch + eta as i64,
			rate: calc.instantaneous_rate(),
			average_rate: calc.average_rate(),
			transferred: engine.transferred,
			size: control.declared_size,
			buffer_percent: engine.buffer_percent(),
			sweep_pos,
			last_bytes: &last_bytes_display,
			previous_line: &engine.previous_line,
			name: &control.name,
			bits,
			decimal_units,
			colour,
			bar_style,
		};

		let foreground = is_foreground(stderr_fd);
		display.refresh(err, &inputs, width as usize, foreground).map_err(PvError::TransferWrite)?;

		if final_update || output_eof { break; }
	}

	display.finish(err).map_err(PvError::TransferWrite)?;

	if output.seekable && control.flags.contains(Flags::SPARSE_OUTPUT) {
		let _ = engine.finalize_sparse(output);
	}

	if control.flags.contains(Flags::SHOW_STATS) {
		if let Some((min, avg, max, mdev)) = calc.stats_summary() {
			let line = format!(
				"{}/s min, {}/s avg, {}/s max, {}/s mdev",
				crate::units::format_size(min as u64, decimal_units, bits),
				crate::units::format_size(avg as u64, decimal_units, bits),
				crate::units::format_size(max as u64, decimal_units, bits),
				crate::units::format_size(mdev as u64, decimal_units, bits),
			);
			let _ = writeln!(err, "{line}");
		}
	}

	Ok(exit_flags)
}

fn engine_exhausted(engine: &Engine) -> bool { !engine.has_pending() }

fn poll_for_readiness(sources: &[Source], cur: usize, output: &OutputSide) {
	let fd_in = sources.get(cur).filter(|s| !s.side.eof).map(|s| s.side.fd);
	let fd_out = if output.is_pipe { Some(output.fd) } else { None };
	let deadline = Duration::from_millis(crate::readiness::MAX_POLL_MILLIS as u64);
	let _ = wait_ready(fd_in, fd_out, deadline);
}

fn advise_sequential(fd: RawFd) {
	// Safety: `posix_fadvise` takes no pointers; failure is ignored per
	// §4.4/§4.7 ("best-effort", not every filesystem supports it).
	unsafe {
		libc::posix_fadvise(fd, 0, 0, libc::POSIX_FADV_SEQUENTIAL);
	}
}

fn default_template(control: &Control) -> Box<str> {
	use crate::control::Flags;
	let mut t = String::from("%N ");
	if !control.flags.contains(Flags::NO_DISPLAY) {
		t.push_str("%p %b %r %t %e");
	}
	t.into_boxed_str()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::control::{Control, Flags};
	use std::io::{Read, Write};
	use std::os::unix::io::{AsRawFd, FromRawFd};

	fn make_pipe() -> (std::fs::File, std::fs::File) {
		let mut fds = [0i32; 2];
		unsafe { assert_eq!(libc::pipe(fds.as_mut_ptr()), 0); }
		unsafe { (std::fs::File::from_raw_fd(fds[0]), std::fs::File::from_raw_fd(fds[1])) }
	}

	fn temp_path(tag: &str) -> std::path::PathBuf {
		std::env::temp_dir().join(format!("pv_core_mainloop_{tag}_{}", std::process::id()))
	}

	#[test]
	fn t_runs_to_completion_over_a_pipe() {
		let (r_in, mut w_in) = make_pipe();
		w_in.write_all(b"hello world\n").unwrap();
		drop(w_in);

		let out_path = temp_path("complete");
		let out_file = std::fs::File::create(&out_path).unwrap();

		let mut control = Control::default();
		control.flags.set(Flags::NO_DISPLAY);
		control.name = Box::from("test");

		let mut sources = [Source {
			side: InputSide::new(r_in.as_raw_fd(), false),
			block_size: 4096,
		}];
		let mut output = OutputSide::new(out_file.as_raw_fd(), false, true);
		let mut err = Vec::new();

		let flags = run(&control, &mut sources, &mut output, out_file.as_raw_fd(), &mut err).unwrap();
		assert!(flags.is_empty());

		drop(out_file);
		let mut produced = Vec::new();
		std::fs::File::open(&out_path).unwrap().read_to_end(&mut produced).unwrap();
		let _ = std::fs::remove_file(&out_path);
		assert_eq!(produced, b"hello world\n");
	}

	#[test]
	fn t_stop_at_size_halts_early() {
		let (r_in, mut w_in) = make_pipe();
		w_in.write_all(&[b'x'; 100]).unwrap();
		drop(w_in);

		let out_path = temp_path("stopatsize");
		let out_file = std::fs::File::create(&out_path).unwrap();

		let mut control = Control::default();
		control.flags.set(Flags::NO_DISPLAY);
		control.flags.set(Flags::STOP_AT_SIZE);
		control.declared_size = Some(10);
		control.name = Box::from("test");

		let mut sources = [Source {
			side: InputSide::new(r_in.as_raw_fd(), false),
			block_size: 4096,
		}];
		let mut output = OutputSide::new(out_file.as_raw_fd(), false, true);
		let mut err = Vec::new();

		run(&control, &mut sources, &mut output, out_file.as_raw_fd(), &mut err).unwrap();

		drop(out_file);
		let mut produced = Vec::new();
		std::fs::File::open(&out_path).unwrap().read_to_end(&mut produced).unwrap();
		let _ = std::fs::remove_file(&out_path);
		assert_eq!(produced.len(), 10);
	}
}

/*!
# PV Core: Signal Adapter

Translates OS signals into the edge-triggered flags the main loop polls
(§4.2). Grounded directly on `fyi_msg::progress::signals`
(`ProglessSignals`/`ResizeHandler`): each signal of interest gets its own
`Arc<AtomicBool>` switch flipped by a real handler that touches nothing but
that one atomic; all actual behaviour happens later, at a loop-polled edge.
*/

use std::sync::{
	Arc,
	atomic::{
		AtomicBool,
		Ordering::SeqCst,
	},
};
use signal_hook::consts::{
	SIGALRM,
	SIGCONT,
	SIGHUP,
	SIGINT,
	SIGTERM,
	SIGTSTP,
	SIGWINCH,
};
use signal_hook::SigId;
use crate::error::{
	ExitFlags,
	PvError,
};



/// # A Single Registered Flag, Unregistered On Drop.
struct FlagHandler {
	switch: Arc<AtomicBool>,
	id: SigId,
}

impl Drop for FlagHandler {
	fn drop(&mut self) { signal_hook::low_level::unregister(self.id); }
}

impl FlagHandler {
	fn register(sig: i32, initial: bool) -> Result<Self, PvError> {
		let switch = Arc::new(AtomicBool::new(initial));
		let id = signal_hook::flag::register(sig, Arc::clone(&switch))
			.map_err(|_| PvError::SignalSetup(sig))?;
		Ok(Self { switch, id })
	}

	fn take(&self) -> bool { self.switch.swap(false, SeqCst) }
}



/// # Signal Adapter.
///
/// Owns every registered handler for the run; all unregister on `Drop`.
pub struct Signals {
	resized: FlagHandler,
	exiting: FlagHandler,
	suspend: FlagHandler,
	resumed: FlagHandler,
	_alarm: AlarmHandler,
}

impl Signals {
	/// # Install All Handlers.
	///
	/// Fails with [`PvError::SignalSetup`] if the OS refuses to install any
	/// of them (§4.2); `SIGPIPE` is handled separately (ignored outright, not
	/// through a flag) since a broken output pipe is reported through the
	/// write path's own `EPIPE` return, not a signal edge.
	pub fn install() -> Result<Self, PvError> {
		ignore_sigpipe();

		let resized = FlagHandler::register(SIGWINCH, true)?;

		// INT/HUP/TERM all set the same "please stop" edge.
		let exiting = FlagHandler::register(SIGINT, false)?;
		{
			let switch = Arc::clone(&exiting.switch);
			signal_hook::flag::register(SIGHUP, switch)
				.map_err(|_| PvError::SignalSetup(SIGHUP))?;
		}
		{
			let switch = Arc::clone(&exiting.switch);
			signal_hook::flag::register(SIGTERM, switch)
				.map_err(|_| PvError::SignalSetup(SIGTERM))?;
		}

		let suspend = FlagHandler::register(SIGTSTP, false)?;
		let resumed = FlagHandler::register(SIGCONT, false)?;
		let alarm = AlarmHandler::install()?;

		Ok(Self { resized, exiting, suspend, resumed, _alarm: alarm })
	}

	#[must_use]
	/// # Did The Window Resize Since The Last Poll?
	pub fn take_resized(&self) -> bool { self.resized.take() }

	#[must_use]
	/// # Has Termination Been Requested?
	pub fn exit_requested(&self) -> bool { self.exiting.switch.load(SeqCst) }

	/// # Poll Stop/Resume Edges.
	///
	/// Returns `(went_to_background, came_to_foreground)`. On the
	/// background edge the caller should also re-raise `SIGCONT` to the
	/// process group so sibling pipeline stages are not left stopped
	/// (§4.2).
	pub fn take_stop_resume(&self) -> (bool, bool) {
		(self.suspend.take(), self.resumed.take())
	}
}



/// # No-Op `SIGALRM` Handler.
///
/// Exists solely so a blocking `write(2)` returns `EINTR` instead of
/// hanging past `TRANSFER_WRITE_TIMEOUT` (§4.4.5).
struct AlarmHandler(SigId);

impl Drop for AlarmHandler {
	fn drop(&mut self) { signal_hook::low_level::unregister(self.0); }
}

impl AlarmHandler {
	fn install() -> Result<Self, PvError> {
		// Safety: the handler touches no state at all.
		let id = unsafe {
			signal_hook::low_level::register(SIGALRM, || {})
		}.map_err(|_| PvError::SignalSetup(SIGALRM))?;
		Ok(Self(id))
	}
}

fn ignore_sigpipe() {
	// Safety: SIG_IGN is a sentinel value, not a function pointer; this is
	// the standard way to disable default-terminate behavior for a signal.
	unsafe {
		libc::signal(libc::SIGPIPE, libc::SIG_IGN);
	}
}

/// # Re-Raise `SIGCONT` To The Whole Process Group.
///
/// Called after observing the background-write-to-terminal edge, so
/// sibling stages of the same shell pipeline are woken back up (§4.2).
pub fn wake_process_group() {
	// Safety: pid 0 means "this process's group"; kill() with SIGCONT is
	// always safe to call.
	unsafe {
		libc::kill(0, libc::SIGCONT);
	}
}

#[must_use]
/// # Exit Flag For A Failed Signal Installation.
pub const fn signal_exit_flag() -> ExitFlags { ExitFlags::SIGNAL }

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn t_flag_handler_roundtrip() {
		// Not asserting real signal delivery (that's an OS-level fact, not
		// something a unit test should rely on) — just the flag mechanics.
		let h = FlagHandler::register(SIGUSR_TEST, false).unwrap();
		assert!(! h.take());
		h.switch.store(true, SeqCst);
		assert!(h.take());
		assert!(! h.take());
	}

	// A signal number unlikely to be raised by the test harness itself.
	const SIGUSR_TEST: i32 = libc::SIGUSR2;
}

/*!
# PV Core: Readiness Poll

`wait_ready` waits up to a short deadline for the input to become readable
and/or the output to become writable (§4.3), using `poll(2)` directly since
the teacher's stack never touches raw file descriptors. The deadline is
capped low (≤90 ms) so the main loop can still service signals, the display
interval, and the rate check promptly even while idle.
*/

use std::os::unix::io::RawFd;
use std::time::Duration;

/// # Hard Cap On A Single Poll Call (§4.3).
pub const MAX_POLL_MILLIS: i32 = 90;

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
/// # Which Side(s) Became Ready.
pub struct Ready {
	pub readable: bool,
	pub writable: bool,
}

/// # Wait For Readiness.
///
/// `fd_in`/`fd_out` are `None` when that side isn't being watched this
/// pass (e.g. the input already hit EOF). `deadline` is clamped to
/// `MAX_POLL_MILLIS`. A transient interrupt (`EINTR`) is reported as
/// "nothing ready" rather than surfaced as an error (§4.3).
pub fn wait_ready(fd_in: Option<RawFd>, fd_out: Option<RawFd>, deadline: Duration) -> Ready {
	let mut fds: [libc::pollfd; 2] = [
		libc::pollfd { fd: -1, events: 0, revents: 0 },
		libc::pollfd { fd: -1, events: 0, revents: 0 },
	];
	let mut n = 0usize;
	let in_idx = fd_in.map(|fd| { fds[n] = libc::pollfd { fd, events: libc::POLLIN, revents: 0 }; let i = n; n += 1; i });
	let out_idx = fd_out.map(|fd| { fds[n] = libc::pollfd { fd, events: libc::POLLOUT, revents: 0 }; let i = n; n += 1; i });

	if n == 0 { return Ready::default(); }

	let millis = deadline.as_millis().min(MAX_POLL_MILLIS as u128) as i32;

	// Safety: `fds` points at a valid, correctly-sized stack array for the
	// duration of the call; `n` never exceeds its length.
	let rc = unsafe { libc::poll(fds.as_mut_ptr(), n as libc::nfds_t, millis) };

	if rc <= 0 {
		// rc == 0: timed out. rc < 0: error, including EINTR — both mean
		// "nothing ready" per §4.3.
		return Ready::default();
	}

	let mut ready = Ready::default();
	if let Some(i) = in_idx {
		ready.readable = fds[i].revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR) != 0;
	}
	if let Some(i) = out_idx {
		ready.writable = fds[i].revents & (libc::POLLOUT | libc::POLLERR) != 0;
	}
	ready
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::os::unix::io::AsRawFd;

	#[test]
	fn t_no_fds_watched() {
		let ready = wait_ready(None, None, Duration::from_millis(10));
		assert!(! ready.readable && ! ready.writable);
	}

	#[test]
	fn t_pipe_write_side_ready_immediately() {
		let (r, w) = unsafe {
			let mut fds = [0i32; 2];
			assert_eq!(libc::pipe(fds.as_mut_ptr()), 0);
			(
				std::fs::File::from_raw_fd(fds[0]),
				std::fs::File::from_raw_fd(fds[1]),
			)
		};
		use std::os::unix::io::FromRawFd;
		let ready = wait_ready(None, Some(w.as_raw_fd()), Duration::from_millis(50));
		assert!(ready.writable);
		drop(r);
		drop(w);
	}

	#[test]
	fn t_empty_pipe_not_readable() {
		let mut fds = [0i32; 2];
		unsafe { assert_eq!(libc::pipe(fds.as_mut_ptr()), 0); }
		use std::os::unix::io::FromRawFd;
		let r = unsafe { std::fs::File::from_raw_fd(fds[0]) };
		let w = unsafe { std::fs::File::from_raw_fd(fds[1]) };
		let ready = wait_ready(Some(r.as_raw_fd()), None, Duration::from_millis(10));
		assert!(! ready.readable);
		drop(r);
		drop(w);
	}
}

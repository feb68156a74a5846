/*!
# PV Core: Errors
*/

use std::{
	error::Error,
	fmt,
	io,
	path::PathBuf,
};



#[derive(Debug)]
/// # Core Error.
///
/// Every fallible operation in this crate returns through one of these
/// variants. None of them carry enough detail to be actionable beyond a
/// single stderr line; anything more belongs to the caller. There is no
/// separate "transient I/O" variant: retryable read/write failures (the
/// ones `EAGAIN`/`EINTR` or an adaptive skip can paper over) never escape
/// the engine as an `Err` — by the time `TransferRead`/`TransferWrite`
/// reaches a caller, retrying has already been exhausted.
pub enum PvError {
	/// # Malformed option or mutually-exclusive combination.
	ConfigInvalid(Box<str>),

	/// # Input file could not be opened/read at all.
	AccessDenied(PathBuf, io::Error),

	/// # Read failed on an already-open input.
	TransferRead(io::Error),

	/// # Write failed on the output.
	TransferWrite(io::Error),

	/// # Buffer or history-ring allocation failed.
	MemoryAllocation,

	/// # A signal handler could not be installed.
	SignalSetup(i32),
}

impl fmt::Display for PvError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::ConfigInvalid(msg) => write!(f, "invalid configuration: {msg}"),
			Self::AccessDenied(path, err) =>
				write!(f, "{}: {err}", path.display()),
			Self::TransferRead(err) => write!(f, "read failed: {err}"),
			Self::TransferWrite(err) => write!(f, "write failed: {err}"),
			Self::MemoryAllocation => f.write_str("out of memory"),
			Self::SignalSetup(sig) => write!(f, "could not install handler for signal {sig}"),
		}
	}
}

impl Error for PvError {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		match self {
			Self::AccessDenied(_, err)
				| Self::TransferRead(err)
				| Self::TransferWrite(err) => Some(err),
			_ => None,
		}
	}
}

impl PvError {
	#[must_use]
	/// # Which Exit Bit Does This Set?
	pub const fn exit_flag(&self) -> ExitFlags {
		match self {
			Self::ConfigInvalid(_) => ExitFlags::NONE,
			Self::AccessDenied(..) => ExitFlags::ACCESS,
			Self::TransferRead(_) | Self::TransferWrite(_) => ExitFlags::TRANSFER,
			Self::MemoryAllocation => ExitFlags::MEMORY,
			Self::SignalSetup(_) => ExitFlags::SIGNAL,
		}
	}
}



#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
/// # Exit Code Bitmask.
///
/// Mirrors the original tool's exit-code bits (§6/§7). `REMOTE_OR_PID` and
/// `SAF` are named for parity but never set by this core since their
/// producers (remote-control IPC, store-and-forward) are out of scope.
pub struct ExitFlags(u8);

impl ExitFlags {
	/// # Success.
	pub const NONE: Self = Self(0);
	/// # Allocation failure.
	pub const MEMORY: Self = Self(0b0000_0001);
	/// # Input access failure.
	pub const ACCESS: Self = Self(0b0000_0010);
	/// # Terminated by signal.
	pub const SIGNAL: Self = Self(0b0000_0100);
	/// # Transfer (I/O) error.
	pub const TRANSFER: Self = Self(0b0000_1000);
	/// # Remote-control or PID-file failure. Never set by this core.
	pub const REMOTE_OR_PID: Self = Self(0b0001_0000);
	/// # Store-and-forward failure. Never set by this core.
	pub const SAF: Self = Self(0b0010_0000);

	#[must_use]
	/// # Merge In Another Flag.
	pub const fn with(self, other: Self) -> Self { Self(self.0 | other.0) }

	/// # Set A Flag In Place.
	pub fn set(&mut self, other: Self) { self.0 |= other.0; }

	#[must_use]
	/// # Is Success?
	pub const fn is_empty(self) -> bool { self.0 == 0 }

	#[must_use]
	/// # As Raw Exit Code.
	pub const fn as_u8(self) -> u8 { self.0 }
}

impl From<ExitFlags> for std::process::ExitCode {
	fn from(flags: ExitFlags) -> Self { Self::from(flags.0) }
}



#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn t_merge() {
		let mut flags = ExitFlags::NONE;
		assert!(flags.is_empty());
		flags.set(ExitFlags::ACCESS);
		flags.set(ExitFlags::TRANSFER);
		assert_eq!(flags.as_u8(), 0b0000_1010);
		assert!(! flags.is_empty());
	}

	#[test]
	fn t_error_flags() {
		assert_eq!(
			PvError::MemoryAllocation.exit_flag(),
			ExitFlags::MEMORY,
		);
		assert_eq!(
			PvError::SignalSetup(15).exit_flag(),
			ExitFlags::SIGNAL,
		);
	}
}

/*!
# PV Core

The transfer engine, rate calculator, status-line formatter, and main loop
behind a `pv`-style pipeline monitor: reads from one or more descriptors,
writes to one, and keeps a running status line on `Stderr` honest about
how much has moved and how fast.

Argument parsing is deliberately not this crate's job — callers build a
[`Control`] however they like (flags, a config file, hardcoded defaults
for a test) and hand it to [`run`] along with already-opened descriptors.
*/

#![warn(clippy::filetype_is_file)]
#![warn(clippy::integer_division)]
#![warn(clippy::needless_borrow)]
#![warn(clippy::nursery)]
#![warn(clippy::pedantic)]
#![warn(clippy::perf)]
#![warn(clippy::suboptimal_flops)]
#![warn(missing_copy_implementations)]
#![warn(missing_debug_implementations)]
#![warn(missing_docs)]
#![warn(trivial_casts)]
#![warn(trivial_numeric_casts)]
#![warn(unused_import_braces)]

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod control;
pub mod display;
pub mod engine;
pub mod error;
pub mod format;
pub mod mainloop;
pub mod msg;
pub mod rate;
pub mod readiness;
pub mod signals;
pub mod time;
pub mod units;

pub use control::Control;
pub use engine::{InputSide, OutputSide};
pub use error::{ExitFlags, PvError};
pub use mainloop::{run, Source};

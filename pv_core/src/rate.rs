/*!
# PV Core: Rate Calculator

Instantaneous rate, windowed average, min/max/variance, ETA, and percentage
(§4.5). This module hands `eta_secs`/elapsed values off to
`format::format_hms`, which does the actual `dactyl::NiceElapsed::hms`
formatting; grounded on the shape of `ProglessInner`'s own done/total
counters for the "cheap running totals, refreshed once per tick" style.
*/

use std::collections::VecDeque;



/// # ETA Ceiling, Seconds (100 Hours).
pub const ETA_MAX_SECS: f64 = 360_000_000.0;

/// # Below This Interval The Previous Instantaneous Rate Is Reused.
const MIN_RATE_INTERVAL_SECS: f64 = 0.010;



#[derive(Debug, Clone, Copy)]
/// # One Average-Rate History Sample.
struct Sample {
	elapsed_sec: f64,
	transferred: u64,
}



#[derive(Debug)]
/// # Rate/ETA Calculator.
pub struct Calculator {
	prev_transferred: u64,
	prev_elapsed_sec: f64,
	prev_rate: f64,
	/// # Bytes Seen But Not Yet Reflected In `prev_rate` (the "carry").
	carry: u64,

	history: VecDeque<Sample>,
	history_cap: usize,
	sample_spacing: f64,

	current_avg_rate: f64,

	min_rate: f64,
	max_rate: f64,
	rate_sum: f64,
	rate_squared_sum: f64,
	measurements_taken: u64,

	/// # Unknown-Size Sweep Position, `0..=200`.
	sweep: u32,
}

impl Calculator {
	#[must_use]
	/// # New.
	///
	/// `window` is the average-rate window in seconds (§4.5, "Average
	/// rate"): ring length is `window + 1` samples spaced 1 second apart
	/// when `window < 20`, else `window/5 + 1` samples spaced 5 seconds
	/// apart.
	pub fn new(window: u32) -> Self {
		let (history_cap, sample_spacing) = if window < 20 {
			(window as usize + 1, 1.0)
		}
		else {
			(window as usize / 5 + 1, 5.0)
		};

		Self {
			prev_transferred: 0,
			prev_elapsed_sec: 0.0,
			prev_rate: 0.0,
			carry: 0,

			history: VecDeque::with_capacity(history_cap),
			history_cap,
			sample_spacing,

			current_avg_rate: 0.0,

			min_rate: f64::INFINITY,
			max_rate: 0.0,
			rate_sum: 0.0,
			rate_squared_sum: 0.0,
			measurements_taken: 0,

			sweep: 0,
		}
	}

	#[must_use]
	/// # Instantaneous Rate (Bytes/Sec, Or Bits/Sec If `bits`).
	pub fn instantaneous_rate(&self) -> f64 { self.prev_rate }

	#[must_use]
	/// # Current Average Rate.
	pub fn average_rate(&self) -> f64 { self.current_avg_rate }

	/// # Refresh, Once Per Display Interval.
	///
	/// `transferred` is the calculator's notion of delivered bytes/lines
	/// (the engine's `transferred` counter, not `total_written`); `elapsed`
	/// is the current elapsed seconds; `bits` multiplies rates by 8.
	pub fn refresh(&mut self, transferred: u64, elapsed: f64, bits: bool) {
		let dt = elapsed - self.prev_elapsed_sec;
		let delta = transferred.saturating_sub(self.prev_transferred);

		if dt < MIN_RATE_INTERVAL_SECS {
			self.carry = self.carry.saturating_add(delta);
		}
		else {
			let total_delta = self.carry.saturating_add(delta);
			self.carry = 0;
			let mut rate = total_delta as f64 / dt;
			if bits { rate *= 8.0; }
			self.prev_rate = rate;

			self.min_rate = self.min_rate.min(rate);
			self.max_rate = self.max_rate.max(rate);
			self.rate_sum += rate;
			self.rate_squared_sum += rate * rate;
			self.measurements_taken += 1;
		}

		self.prev_transferred = transferred;
		self.prev_elapsed_sec = elapsed;

		self.push_history_sample(elapsed, transferred);
		self.recompute_average();
	}

	fn push_history_sample(&mut self, elapsed: f64, transferred: u64) {
		let should_push = match self.history.back() {
			None => true,
			Some(last) => elapsed - last.elapsed_sec >= self.sample_spacing,
		};
		if should_push {
			if self.history.len() >= self.history_cap { self.history.pop_front(); }
			self.history.push_back(Sample { elapsed_sec: elapsed, transferred });
		}
	}

	fn recompute_average(&mut self) {
		self.current_avg_rate = match (self.history.front(), self.history.back()) {
			(Some(first), Some(last)) if self.history.len() > 1 => {
				let dt = last.elapsed_sec - first.elapsed_sec;
				if dt > 0.0 {
					(last.transferred.saturating_sub(first.transferred)) as f64 / dt
				}
				else { self.prev_rate }
			},
			_ => self.prev_rate,
		};
	}

	/// # Final Update (§4.5, "Final update").
	///
	/// Both instantaneous and average rate collapse to
	/// `(transferred - initial_offset) / elapsed`, with `elapsed` floored
	/// at 1 microsecond to avoid division by zero.
	pub fn finalize(&mut self, transferred: u64, initial_offset: u64, elapsed: f64, bits: bool) {
		let elapsed = elapsed.max(0.000_001);
		let mut rate = transferred.saturating_sub(initial_offset) as f64 / elapsed;
		if bits { rate *= 8.0; }
		self.prev_rate = rate;
		self.current_avg_rate = rate;
	}

	#[must_use]
	/// # Percentage, Known Size (§4.5, "Percentage").
	pub fn percentage_known(transferred: u64, size: u64) -> f64 {
		if size == 0 { return 0.0; }
		(100.0 * transferred as f64 / size as f64).clamp(0.0, 100_000.0)
	}

	/// # Percentage, Unknown Size — Advance The Sweep.
	///
	/// Increments by 2 per refresh when the instantaneous rate is
	/// positive, wrapping at 200; returns the raw `0..=200` sweep value.
	pub fn advance_sweep(&mut self) -> u32 {
		if self.prev_rate > 0.0 {
			self.sweep = (self.sweep + 2) % 202;
		}
		self.sweep
	}

	#[must_use]
	/// # Fold A `0..=200` Sweep Into A `0..=100` Indicator Position.
	///
	/// `0..100` maps directly; `100..200` reflects back `100..0`.
	pub fn fold_sweep(raw: u32) -> u32 {
		if raw <= 100 { raw } else { 200 - raw }
	}

	#[must_use]
	/// # ETA Seconds (§4.5, "ETA seconds").
	pub fn eta_secs(&self, transferred: u64, size: u64) -> f64 {
		if size == 0 || self.current_avg_rate <= 0.0 || transferred >= size { return 0.0; }
		(((size - transferred) as f64) / self.current_avg_rate).clamp(0.0, ETA_MAX_SECS)
	}

	#[must_use]
	/// # Final Stats Summary, `min/avg/max/mdev`.
	pub fn stats_summary(&self) -> Option<(f64, f64, f64, f64)> {
		if self.measurements_taken == 0 { return None; }
		let n = self.measurements_taken as f64;
		let mean = self.rate_sum / n;
		let variance = (self.rate_squared_sum / n) - (mean * mean);
		let mdev = variance.max(0.0).sqrt();
		Some((self.min_rate, mean, self.max_rate, mdev))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn t_instantaneous_carry() {
		let mut calc = Calculator::new(30);
		// Sub-10ms delta: carried, rate stays zero.
		calc.refresh(100, 0.005, false);
		assert_eq!(calc.instantaneous_rate(), 0.0);
		// Now a real interval: carry + delta counted together.
		calc.refresh(300, 0.105, false);
		assert!(calc.instantaneous_rate() > 0.0);
	}

	#[test]
	fn t_instantaneous_never_negative() {
		let mut calc = Calculator::new(30);
		for i in 0..50u64 {
			calc.refresh(i * 7, i as f64 * 0.05, false);
			assert!(calc.instantaneous_rate() >= 0.0);
		}
	}

	#[test]
	fn t_average_single_sample() {
		let mut calc = Calculator::new(30);
		calc.refresh(1000, 1.0, false);
		assert_eq!(calc.average_rate(), calc.instantaneous_rate());
	}

	#[test]
	fn t_percentage_known() {
		assert_eq!(Calculator::percentage_known(50, 100), 50.0);
		assert_eq!(Calculator::percentage_known(150, 100), 100_000.0f64.min(150.0));
		assert_eq!(Calculator::percentage_known(0, 0), 0.0);
	}

	#[test]
	fn t_sweep_wraps_and_visits_range() {
		let mut calc = Calculator::new(30);
		calc.refresh(10, 1.0, false); // establish a positive rate
		let mut seen_zero_ish = false;
		let mut seen_high = false;
		for _ in 0..120 {
			let raw = calc.advance_sweep();
			let folded = Calculator::fold_sweep(raw);
			assert!(folded <= 100);
			if folded <= 2 { seen_zero_ish = true; }
			if folded >= 98 { seen_high = true; }
		}
		assert!(seen_zero_ish && seen_high);
	}

	#[test]
	fn t_eta_zero_when_unknown_size() {
		let calc = Calculator::new(30);
		assert_eq!(calc.eta_secs(10, 0), 0.0);
	}

	#[test]
	fn t_finalize_no_div_by_zero() {
		let mut calc = Calculator::new(30);
		calc.finalize(1000, 0, 0.0, false);
		assert!(calc.instantaneous_rate().is_finite());
	}

	#[test]
	fn t_stats_summary_mdev() {
		let mut calc = Calculator::new(30);
		calc.refresh(100, 0.1, false);
		calc.refresh(300, 0.2, false);
		calc.refresh(600, 0.3, false);
		let (min, avg, max, mdev) = calc.stats_summary().unwrap();
		assert!(min <= avg && avg <= max);
		assert!(mdev >= 0.0);
	}
}

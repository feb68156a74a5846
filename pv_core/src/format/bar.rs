/*!
# PV Core: Format — Bar Styles

Each style has an `indicator` (unknown-size sweep glyph), a `tip` (leading
edge of the filled region when there are only two filler entries), and an
ordered filler list where `filler[0]` is empty and `filler[last]` is full
(§4.6.4). Up to 4 distinct styles may coexist in one template, matched by
id; when the terminal lacks UTF-8 the engine silently falls back to the
plain style.
*/

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
/// # Known Bar Style Names.
pub enum BarStyleName {
	Plain,
	Block,
	Granular,
	Shaded,
}

impl BarStyleName {
	#[must_use]
	/// # Parse From A CLI-Supplied Name (§6 `bar-style:NAME`).
	pub fn parse(name: &str) -> Option<Self> {
		match name {
			"plain" => Some(Self::Plain),
			"block" => Some(Self::Block),
			"granular" => Some(Self::Granular),
			"shaded" => Some(Self::Shaded),
			_ => None,
		}
	}
}

#[derive(Debug, Clone, Copy)]
/// # A Loaded Bar Style.
pub struct BarStyle {
	pub indicator: char,
	pub tip: char,
	pub filler: &'static [char],
}

impl BarStyle {
	#[must_use]
	/// # Resolve A Style, Falling Back To Plain Without UTF-8 (§4.6.4).
	pub const fn resolve(name: BarStyleName, utf8: bool) -> Self {
		if !utf8 { return Self::PLAIN; }
		match name {
			BarStyleName::Plain => Self::PLAIN,
			BarStyleName::Block => Self::BLOCK,
			BarStyleName::Granular => Self::GRANULAR,
			BarStyleName::Shaded => Self::SHADED,
		}
	}

	/// # Plain (`#`/`-`), Always Available.
	pub const PLAIN: Self = Self { indicator: '*', tip: '#', filler: &['-', '#'] };

	/// # Solid Unicode Block.
	pub const BLOCK: Self = Self { indicator: '◆', tip: '█', filler: &[' ', '█'] };

	/// # Eighth-Cell Sub-Granularity Block.
	pub const GRANULAR: Self = Self {
		indicator: '◆',
		tip: '█',
		filler: &[' ', '▏', '▎', '▍', '▌', '▋', '▊', '▉', '█'],
	};

	/// # Shaded Gradient.
	pub const SHADED: Self = Self { indicator: '▒', tip: '█', filler: &[' ', '░', '▒', '▓', '█'] };

	#[must_use]
	/// # Render A Bar Of `width` Cells At `fraction` (0.0..=1.0) Full.
	///
	/// `fraction` beyond `1.0` clamps; negative clamps to zero. When there
	/// are only two filler entries (empty/full), the cell straddling the
	/// fill boundary becomes `tip` rather than a sub-cell glyph.
	pub fn render(&self, width: usize, fraction: f64) -> String {
		if width == 0 { return String::new(); }
		let fraction = fraction.clamp(0.0, 1.0);

		let total_eighths = (width as f64 * fraction * (self.filler.len() - 1) as f64).round() as usize;
		let full_cells = total_eighths / (self.filler.len() - 1);
		let remainder_idx = total_eighths % (self.filler.len() - 1);

		let mut out = String::with_capacity(width);
		for i in 0..width {
			if i < full_cells {
				if self.filler.len() == 2 && i + 1 == full_cells && remainder_idx == 0 {
					out.push(self.tip);
				}
				else {
					out.push(*self.filler.last().unwrap());
				}
			}
			else if i == full_cells && remainder_idx > 0 {
				out.push(self.filler[remainder_idx]);
			}
			else {
				out.push(self.filler[0]);
			}
		}
		out
	}

	#[must_use]
	/// # Render The Unknown-Size Sweep Indicator At Position `pos` (0..=100).
	pub fn render_sweep(&self, width: usize, pos: u32) -> String {
		if width == 0 { return String::new(); }
		let idx = ((pos as usize) * width.saturating_sub(1)) / 100;
		let mut out = String::with_capacity(width);
		for i in 0..width {
			out.push(if i == idx { self.indicator } else { self.filler[0] });
		}
		out
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn t_parse() {
		assert_eq!(BarStyleName::parse("block"), Some(BarStyleName::Block));
		assert_eq!(BarStyleName::parse("bogus"), None);
	}

	#[test]
	fn t_fallback_without_utf8() {
		let style = BarStyle::resolve(BarStyleName::Block, false);
		assert_eq!(style.filler, BarStyle::PLAIN.filler);
	}

	#[test]
	fn t_render_full_and_empty() {
		let style = BarStyle::PLAIN;
		assert_eq!(style.render(10, 0.0), "-".repeat(10));
		assert_eq!(style.render(10, 1.0), "#".repeat(10));
	}

	#[test]
	fn t_render_half() {
		let style = BarStyle::PLAIN;
		let out = style.render(10, 0.5);
		assert_eq!(out.chars().count(), 10);
		assert!(out.starts_with('#') || out.starts_with('-'));
	}

	#[test]
	fn t_sweep_visits_ends() {
		let style = BarStyle::PLAIN;
		let start = style.render_sweep(10, 0);
		let end = style.render_sweep(10, 100);
		assert!(start.starts_with('*'));
		assert!(end.ends_with('*'));
	}
}

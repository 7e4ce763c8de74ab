//! In-place textual progress bar for one epoch phase
//!
//! Each render clears the current terminal line and redraws
//! `{prefix}[=====>      ]{suffix}` without a trailing newline.

use std::io::{self, Write};

/// Default bar width in cells
pub const DEFAULT_BAR_WIDTH: usize = 25;

const CLEAR_LINE: &str = "\x1b[2K\r";

/// Render the bar cells for step `current` of `total`.
///
/// Cells left of `current * width / total` are `=`, the boundary cell is
/// `>`, the rest are blank. A zero `total` renders an empty bar.
pub fn render_bar(current: usize, total: usize, width: usize) -> String {
    if total == 0 {
        return " ".repeat(width);
    }
    let boundary = current * width / total;
    (0..width)
        .map(|i| match boundary.cmp(&i) {
            std::cmp::Ordering::Greater => '=',
            std::cmp::Ordering::Equal => '>',
            std::cmp::Ordering::Less => ' ',
        })
        .collect()
}

/// Progress reporter writing to a terminal-like sink
pub struct ProgressBar {
    out: Box<dyn Write + Send>,
    width: usize,
}

impl ProgressBar {
    /// Bar on stdout with the default width
    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()), DEFAULT_BAR_WIDTH)
    }

    /// Bar on an arbitrary sink
    pub fn new(out: Box<dyn Write + Send>, width: usize) -> Self {
        Self { out, width }
    }

    /// Bar that discards everything
    pub fn hidden() -> Self {
        Self::new(Box::new(io::sink()), DEFAULT_BAR_WIDTH)
    }

    /// Draw step `current` of `total`.
    ///
    /// Only `current == total` counts as the final step. There, `end` decides
    /// what stays on the line: `None` keeps the bar and ends the line, an empty
    /// string leaves the line blank, anything else replaces the bar.
    pub fn update(
        &mut self,
        current: usize,
        total: usize,
        prefix: &str,
        suffix: &str,
        end: Option<&str>,
    ) -> io::Result<()> {
        let bar = render_bar(current, total, self.width);
        write!(self.out, "{CLEAR_LINE}")?;

        if current == total {
            match end {
                None => writeln!(self.out, "\r{prefix}[{bar}]{suffix}")?,
                Some("") => write!(self.out, "\r")?,
                Some(text) => writeln!(self.out, "\r{text}")?,
            }
        } else {
            write!(self.out, "\r{prefix}[{bar}]{suffix}")?;
        }
        self.out.flush()
    }

    /// Write a full line through the same sink, so it interleaves correctly with the bar
    pub fn println(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.out, "{line}")?;
        self.out.flush()
    }
}

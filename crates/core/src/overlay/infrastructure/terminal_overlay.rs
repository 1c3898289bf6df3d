use std::io::{self, Write};

use crate::overlay::domain::display_mapper::DisplaySize;
use crate::overlay::domain::overlay_positioner::AnchorPoint;
use crate::overlay::domain::render_sink::SymbolSink;

/// Presents the glyph on an ANSI terminal by mapping display-space
/// pixels onto character cells.
///
/// Anchors are not clamped upstream, so an anchor may land outside the
/// surface; here that hides the glyph (its cell is erased), the same
/// way an off-viewport element simply isn't visible.
pub struct TerminalSymbolSink<W: Write + Send> {
    out: W,
    display: DisplaySize,
    cols: u16,
    rows: u16,
    /// 1-based (row, col) currently occupied by the glyph, if visible.
    cell: Option<(u16, u16)>,
}

impl TerminalSymbolSink<io::Stdout> {
    pub fn new(display: DisplaySize, cols: u16, rows: u16) -> Self {
        Self::with_writer(io::stdout(), display, cols, rows)
    }
}

impl<W: Write + Send> TerminalSymbolSink<W> {
    pub fn with_writer(out: W, display: DisplaySize, cols: u16, rows: u16) -> Self {
        Self {
            out,
            display,
            cols,
            rows,
            cell: None,
        }
    }
}

impl<W: Write + Send> SymbolSink for TerminalSymbolSink<W> {
    fn present(
        &mut self,
        glyph: &str,
        anchor: Option<AnchorPoint>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(anchor) = anchor {
            let next = cell_for(&anchor, self.display, self.cols, self.rows);
            if next != self.cell {
                if let Some((row, col)) = self.cell {
                    // Two spaces: emoji render double-width
                    write!(self.out, "\x1b[{row};{col}H  ")?;
                }
                self.cell = next;
            }
        }

        if let Some((row, col)) = self.cell {
            write!(self.out, "\x1b[{row};{col}H{glyph}")?;
        }
        self.out.flush()?;

        log::debug!("overlay glyph {glyph} at cell {:?}", self.cell);
        Ok(())
    }
}

/// Maps a display-space anchor to a 1-based terminal cell, or `None`
/// when the anchor lies outside the surface.
fn cell_for(anchor: &AnchorPoint, display: DisplaySize, cols: u16, rows: u16) -> Option<(u16, u16)> {
    if anchor.left < 0.0 || anchor.top < 0.0 {
        return None;
    }
    let col = (anchor.left / display.width as f64 * cols as f64).floor() as i64;
    let row = (anchor.top / display.height as f64 * rows as f64).floor() as i64;
    if col < 0 || col >= cols as i64 || row < 0 || row >= rows as i64 {
        return None;
    }
    Some((row as u16 + 1, col as u16 + 1))
}

use crate::overlay::domain::overlay_positioner::AnchorPoint;

/// Sink that presents the current annotation glyph.
///
/// `anchor` carries a new placement; `None` means "no face this tick" —
/// the sink keeps the glyph wherever it last was.
pub trait SymbolSink: Send {
    fn present(
        &mut self,
        glyph: &str,
        anchor: Option<AnchorPoint>,
    ) -> Result<(), Box<dyn std::error::Error>>;
}

/// Drawing surface cleared at the start of every committed render step.
///
/// Sized once to the session's display dimensions; the loop never
/// resizes it.
pub trait DrawingSurface: Send {
    fn clear(&mut self) -> Result<(), Box<dyn std::error::Error>>;
}

/// Discards every glyph. For embeddings that only want the loop's
/// side observable state, and for tests.
pub struct NullSymbolSink;

impl SymbolSink for NullSymbolSink {
    fn present(
        &mut self,
        _glyph: &str,
        _anchor: Option<AnchorPoint>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        Ok(())
    }
}

/// Surface with nothing to clear.
pub struct NullDrawingSurface;

impl DrawingSurface for NullDrawingSurface {
    fn clear(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_sink_accepts_any_write() {
        let mut sink = NullSymbolSink;
        sink.present("😄", None).unwrap();
        sink.present(
            "😐",
            Some(AnchorPoint {
                left: -5.0,
                top: 40.0,
            }),
        )
        .unwrap();
    }

    #[test]
    fn test_null_surface_clear_is_noop() {
        let mut surface = NullDrawingSurface;
        surface.clear().unwrap();
        surface.clear().unwrap();
    }
}

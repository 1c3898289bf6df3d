use std::path::PathBuf;

/// What a frame source knows about itself once it has signalled ready.
///
/// Native dimensions are fixed for the whole session; `fps` is the
/// source's own rate and is unrelated to the sampling tick.
#[derive(Clone, Debug, PartialEq)]
pub struct CaptureMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub source_path: Option<PathBuf>,
}

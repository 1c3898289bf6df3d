use std::path::PathBuf;

use thiserror::Error;

use crate::shared::capture_metadata::CaptureMetadata;
use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("frame source has not been opened")]
    NotOpen,
    #[error("frame source has no more frames")]
    Exhausted,
    #[error("failed to open {path}: {message}")]
    Open { path: PathBuf, message: String },
    #[error("frame decode failed: {0}")]
    Decode(String),
}

/// Port for the live video feed.
///
/// `open` blocks until the source is ready; its return is the one-time
/// "ready" signal, carrying the native dimensions the session's display
/// geometry is derived from. `current_frame` hands out the most recent
/// frame available; a finite source reports `Exhausted` when it runs
/// dry, which ends the session cleanly.
pub trait FrameSource: Send {
    fn open(&mut self) -> Result<CaptureMetadata, CaptureError>;

    fn current_frame(&mut self) -> Result<Frame, CaptureError>;

    fn close(&mut self);
}

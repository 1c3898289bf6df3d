use std::path::PathBuf;

use crate::capture::domain::frame_source::{CaptureError, FrameSource};
use crate::shared::capture_metadata::CaptureMetadata;
use crate::shared::frame::Frame;

/// Frame source decoding a video file or stream URL via ffmpeg-next
/// (libavformat + libavcodec), converting every frame to RGB24.
///
/// Playback position only moves forward; each `current_frame` call
/// decodes the next frame, which stands in for "the latest frame" of a
/// live feed.
pub struct FfmpegFrameSource {
    path: PathBuf,
    state: Option<DecodeState>,
}

// Safety: the source is driven from one thread at a time; the raw
// pointers inside the ffmpeg contexts are never shared.
unsafe impl Send for FfmpegFrameSource {}

struct DecodeState {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    stream_index: usize,
    width: u32,
    height: u32,
    flushing: bool,
    done: bool,
}

impl FfmpegFrameSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: None,
        }
    }

    fn open_error(&self, message: impl ToString) -> CaptureError {
        CaptureError::Open {
            path: self.path.clone(),
            message: message.to_string(),
        }
    }
}

impl FrameSource for FfmpegFrameSource {
    fn open(&mut self) -> Result<CaptureMetadata, CaptureError> {
        ffmpeg_next::init().map_err(|e| self.open_error(e))?;

        let ictx = ffmpeg_next::format::input(&self.path).map_err(|e| self.open_error(e))?;

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| self.open_error("no video stream"))?;
        let stream_index = stream.index();

        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
            .map_err(|e| self.open_error(e))?;
        let decoder = codec_ctx
            .decoder()
            .video()
            .map_err(|e| self.open_error(e))?;

        let rate = stream.rate();
        let fps = if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            0.0
        };

        let width = decoder.width();
        let height = decoder.height();

        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )
        .map_err(|e| self.open_error(e))?;

        self.state = Some(DecodeState {
            ictx,
            decoder,
            scaler,
            stream_index,
            width,
            height,
            flushing: false,
            done: false,
        });

        Ok(CaptureMetadata {
            width,
            height,
            fps,
            source_path: Some(self.path.clone()),
        })
    }

    fn current_frame(&mut self) -> Result<Frame, CaptureError> {
        let state = self.state.as_mut().ok_or(CaptureError::NotOpen)?;
        state.next_frame()
    }

    fn close(&mut self) {
        self.state = None;
    }
}

impl DecodeState {
    fn next_frame(&mut self) -> Result<Frame, CaptureError> {
        if self.done {
            return Err(CaptureError::Exhausted);
        }

        if let Some(frame) = self.try_receive()? {
            return Ok(frame);
        }

        if self.flushing {
            self.done = true;
            return Err(CaptureError::Exhausted);
        }

        loop {
            let Some((stream, packet)) = self.ictx.packets().next() else {
                let _ = self.decoder.send_eof();
                self.flushing = true;
                if let Some(frame) = self.try_receive()? {
                    return Ok(frame);
                }
                self.done = true;
                return Err(CaptureError::Exhausted);
            };

            if stream.index() != self.stream_index {
                continue;
            }
            if self.decoder.send_packet(&packet).is_err() {
                continue;
            }
            if let Some(frame) = self.try_receive()? {
                return Ok(frame);
            }
        }
    }

    fn try_receive(&mut self) -> Result<Option<Frame>, CaptureError> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return Ok(None);
        }

        let mut rgb = ffmpeg_next::util::frame::video::Video::empty();
        self.scaler
            .run(&decoded, &mut rgb)
            .map_err(|e| CaptureError::Decode(e.to_string()))?;

        Ok(Some(Frame::new(
            strip_row_padding(&rgb, self.width, self.height),
            self.width,
            self.height,
            3,
        )))
    }
}

/// ffmpeg rows may carry padding (stride > width*3); copy out a tightly
/// packed RGB buffer.
fn strip_row_padding(
    rgb: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb.stride(0);
    let data = rgb.data(0);
    let row_bytes = width as usize * 3;

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(&data[start..start + row_bytes]);
    }
    pixels
}

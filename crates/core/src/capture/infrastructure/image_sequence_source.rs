use std::fs;
use std::path::PathBuf;

use crate::capture::domain::frame_source::{CaptureError, FrameSource};
use crate::shared::capture_metadata::CaptureMetadata;
use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::frame::Frame;

/// Serves a directory of still images as an endless synthetic feed,
/// cycling through the files in name order.
///
/// Development stand-in for a camera: point it at a folder of webcam
/// captures and the loop sees a "live" source that never runs dry.
/// Every image must share the dimensions of the first one.
pub struct ImageSequenceSource {
    dir: PathBuf,
    files: Vec<PathBuf>,
    next: usize,
    native: Option<(u32, u32)>,
}

impl ImageSequenceSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            files: Vec::new(),
            next: 0,
            native: None,
        }
    }

    fn decode(&self, path: &PathBuf) -> Result<Frame, CaptureError> {
        let img = image::open(path)
            .map_err(|e| CaptureError::Decode(format!("{}: {e}", path.display())))?
            .to_rgb8();
        let (width, height) = img.dimensions();

        if let Some((nw, nh)) = self.native {
            if (width, height) != (nw, nh) {
                return Err(CaptureError::Decode(format!(
                    "{} is {width}x{height}, expected {nw}x{nh}",
                    path.display()
                )));
            }
        }

        Ok(Frame::new(img.into_raw(), width, height, 3))
    }
}

impl FrameSource for ImageSequenceSource {
    fn open(&mut self) -> Result<CaptureMetadata, CaptureError> {
        self.native = None;
        let entries = fs::read_dir(&self.dir).map_err(|e| CaptureError::Open {
            path: self.dir.clone(),
            message: e.to_string(),
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| {
                        IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
                    })
            })
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(CaptureError::Open {
                path: self.dir.clone(),
                message: "no image files found".to_string(),
            });
        }

        self.files = files;
        self.next = 0;

        let first = self.decode(&self.files[0])?;
        self.native = Some((first.width(), first.height()));

        Ok(CaptureMetadata {
            width: first.width(),
            height: first.height(),
            fps: 0.0,
            source_path: Some(self.dir.clone()),
        })
    }

    fn current_frame(&mut self) -> Result<Frame, CaptureError> {
        if self.files.is_empty() {
            return Err(CaptureError::NotOpen);
        }
        let path = self.files[self.next % self.files.len()].clone();
        let frame = self.decode(&path)?;
        self.next += 1;
        Ok(frame)
    }

    fn close(&mut self) {
        self.files.clear();
        self.next = 0;
        self.native = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::path::Path;

    fn write_png(dir: &Path, name: &str, width: u32, height: u32, shade: u8) {
        let img = RgbImage::from_pixel(width, height, Rgb([shade, shade, shade]));
        img.save(dir.join(name)).unwrap();
    }

    #[test]
    fn test_open_reports_first_image_dimensions() {
        let tmp = tempfile::tempdir().unwrap();
        write_png(tmp.path(), "a.png", 64, 48, 10);
        write_png(tmp.path(), "b.png", 64, 48, 20);

        let mut source = ImageSequenceSource::new(tmp.path());
        let meta = source.open().unwrap();
        assert_eq!(meta.width, 64);
        assert_eq!(meta.height, 48);
        assert_eq!(meta.fps, 0.0);
    }

    #[test]
    fn test_cycles_in_name_order() {
        let tmp = tempfile::tempdir().unwrap();
        write_png(tmp.path(), "a.png", 8, 8, 10);
        write_png(tmp.path(), "b.png", 8, 8, 20);

        let mut source = ImageSequenceSource::new(tmp.path());
        source.open().unwrap();

        assert_eq!(source.current_frame().unwrap().data()[0], 10);
        assert_eq!(source.current_frame().unwrap().data()[0], 20);
        // Wraps around — a live source never exhausts
        assert_eq!(source.current_frame().unwrap().data()[0], 10);
    }

    #[test]
    fn test_non_image_files_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        write_png(tmp.path(), "a.png", 8, 8, 10);
        fs::write(tmp.path().join("notes.txt"), b"not an image").unwrap();

        let mut source = ImageSequenceSource::new(tmp.path());
        source.open().unwrap();
        source.current_frame().unwrap();
        source.current_frame().unwrap();
    }

    #[test]
    fn test_empty_directory_fails_open() {
        let tmp = tempfile::tempdir().unwrap();
        let mut source = ImageSequenceSource::new(tmp.path());
        assert!(matches!(source.open(), Err(CaptureError::Open { .. })));
    }

    #[test]
    fn test_dimension_mismatch_is_decode_error() {
        let tmp = tempfile::tempdir().unwrap();
        write_png(tmp.path(), "a.png", 8, 8, 10);
        write_png(tmp.path(), "b.png", 16, 16, 20);

        let mut source = ImageSequenceSource::new(tmp.path());
        source.open().unwrap();
        source.current_frame().unwrap();
        assert!(matches!(
            source.current_frame(),
            Err(CaptureError::Decode(_))
        ));
    }

    #[test]
    fn test_current_frame_before_open_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let mut source = ImageSequenceSource::new(tmp.path());
        assert!(matches!(
            source.current_frame(),
            Err(CaptureError::NotOpen)
        ));
    }

    #[test]
    fn test_close_resets() {
        let tmp = tempfile::tempdir().unwrap();
        write_png(tmp.path(), "a.png", 8, 8, 10);

        let mut source = ImageSequenceSource::new(tmp.path());
        source.open().unwrap();
        source.close();
        assert!(matches!(
            source.current_frame(),
            Err(CaptureError::NotOpen)
        ));
    }
}

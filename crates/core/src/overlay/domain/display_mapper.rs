use crate::shared::face_box::FaceBox;

/// Pixel dimensions of the rendering surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisplaySize {
    pub width: u32,
    pub height: u32,
}

/// Rescales classifier boxes from native frame space into display space.
///
/// Constructed once per session, after the frame source has reported
/// its native dimensions; both spaces are fixed from then on. Callers
/// must not build one before the source is ready.
#[derive(Clone, Copy, Debug)]
pub struct DisplayMapper {
    sx: f64,
    sy: f64,
}

impl DisplayMapper {
    pub fn new(native_width: u32, native_height: u32, display: DisplaySize) -> Self {
        Self {
            sx: display.width as f64 / native_width as f64,
            sy: display.height as f64 / native_height as f64,
        }
    }

    pub fn map_box(&self, face_box: &FaceBox) -> FaceBox {
        face_box.scaled(self.sx, self.sy)
    }

    pub fn map_all(&self, boxes: &[FaceBox]) -> Vec<FaceBox> {
        boxes.iter().map(|b| self.map_box(b)).collect()
    }
}

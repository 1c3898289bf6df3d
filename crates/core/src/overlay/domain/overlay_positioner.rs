use crate::shared::constants::{ANCHOR_RISE, HALF_SYMBOL_WIDTH};
use crate::shared::face_box::FaceBox;

/// Display-space pixel position for the glyph's top-left corner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnchorPoint {
    pub left: f64,
    pub top: f64,
}

/// Anchor for a display-space face box: the glyph sits centered over
/// the face and floats above the box.
///
/// Deliberately unclamped — a face near the surface edge anchors
/// partly or fully off-surface.
pub fn anchor_for(face_box: &FaceBox) -> AnchorPoint {
    AnchorPoint {
        left: face_box.x + face_box.width / 2.0 - HALF_SYMBOL_WIDTH,
        top: face_box.y - ANCHOR_RISE,
    }
}

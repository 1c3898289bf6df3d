use crate::expression::domain::expression::ExpressionScores;
use crate::expression::domain::face_landmarks::FaceLandmarks;
use crate::shared::face_box::FaceBox;

/// One face found in a single frame: bounding box in native frame
/// pixels, optional landmarks, and the per-category expression scores.
///
/// Detections are ephemeral — recomputed every tick, never carried over
/// or compared across ticks.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceDetection {
    pub face_box: FaceBox,
    pub landmarks: Option<FaceLandmarks>,
    pub scores: ExpressionScores,
}

impl FaceDetection {
    pub fn new(
        face_box: FaceBox,
        landmarks: Option<FaceLandmarks>,
        scores: ExpressionScores,
    ) -> Self {
        Self {
            face_box,
            landmarks,
            scores,
        }
    }
}

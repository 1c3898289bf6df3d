use crate::expression::domain::detection::FaceDetection;
use crate::shared::frame::Frame;

/// Port for the face/expression inference capability.
///
/// Implementations hold model sessions and possibly per-stream state,
/// hence `&mut self`. Detections come back ordered by descending
/// detector confidence, so the first entry is the primary detection the
/// loop annotates. An empty vec means no face this tick.
pub trait ExpressionClassifier: Send {
    fn classify(&mut self, frame: &Frame) -> Result<Vec<FaceDetection>, Box<dyn std::error::Error>>;
}

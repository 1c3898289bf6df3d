use std::time::Duration;

pub const DETECTOR_MODEL_NAME: &str = "moodlens-facedet-n.onnx";
pub const DETECTOR_MODEL_URL: &str =
    "https://github.com/moodlens/moodlens/releases/download/v0.1.0/moodlens-facedet-n.onnx";

pub const LANDMARK_MODEL_NAME: &str = "moodlens-landmark5.onnx";
pub const LANDMARK_MODEL_URL: &str =
    "https://github.com/moodlens/moodlens/releases/download/v0.1.0/moodlens-landmark5.onnx";

pub const EXPRESSION_MODEL_NAME: &str = "moodlens-expr7.onnx";
pub const EXPRESSION_MODEL_URL: &str =
    "https://github.com/moodlens/moodlens/releases/download/v0.1.0/moodlens-expr7.onnx";

/// Interval between sampling ticks.
pub const TICK_PERIOD: Duration = Duration::from_millis(100);

/// Half the rendered glyph width; subtracted to center it over the face.
pub const HALF_SYMBOL_WIDTH: f64 = 32.0;

/// How far above the face box the glyph floats.
pub const ANCHOR_RISE: f64 = 60.0;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "webp"];

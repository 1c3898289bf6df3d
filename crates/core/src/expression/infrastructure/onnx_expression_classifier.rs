//! Three-stage ONNX classifier: face detector, 5-point landmark net,
//! expression head, all run through `ort`.
//!
//! The detector sees the letterboxed full frame; the landmark and
//! expression nets each see a square crop around one face. Landmarks
//! re-center the expression crop so a tilted or offset detection box
//! still feeds the head a face-centered patch.
use std::path::Path;

use crate::expression::domain::detection::FaceDetection;
use crate::expression::domain::expression::ExpressionScores;
use crate::expression::domain::expression_classifier::ExpressionClassifier;
use crate::expression::domain::face_landmarks::FaceLandmarks;
use crate::shared::face_box::FaceBox;
use crate::shared::frame::Frame;

/// Fallback detector input resolution when the model's shape is dynamic.
const DEFAULT_DETECTOR_INPUT: u32 = 640;

/// Input resolution of the landmark and expression nets.
const CROP_INPUT: u32 = 112;

/// Default face-confidence threshold.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f64 = 0.45;

pub struct OnnxExpressionClassifier {
    detector: ort::session::Session,
    landmarker: ort::session::Session,
    expression: ort::session::Session,
    confidence: f64,
    detector_input: u32,
}

impl OnnxExpressionClassifier {
    /// Load the three model sessions.
    ///
    /// The detector input resolution is read from its input shape
    /// (NCHW); dynamic shapes fall back to 640.
    pub fn new(
        detector_path: &Path,
        landmark_path: &Path,
        expression_path: &Path,
        confidence: f64,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let detector = ort::session::Session::builder()?.commit_from_file(detector_path)?;
        let landmarker = ort::session::Session::builder()?.commit_from_file(landmark_path)?;
        let expression = ort::session::Session::builder()?.commit_from_file(expression_path)?;

        let detector_input = detector
            .inputs()
            .first()
            .and_then(|input| {
                if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                    // NCHW: [1, 3, H, W]
                    if shape.len() >= 4 && shape[2] > 0 {
                        Some(shape[2] as u32)
                    } else {
                        None
                    }
                } else {
                    None
                }
            })
            .unwrap_or(DEFAULT_DETECTOR_INPUT);

        Ok(Self {
            detector,
            landmarker,
            expression,
            confidence,
            detector_input,
        })
    }

    fn detect_faces(&mut self, frame: &Frame) -> Result<Vec<RawFace>, Box<dyn std::error::Error>> {
        let (tensor, scale, pad_x, pad_y) = letterbox(frame, self.detector_input);

        let input = ort::value::Tensor::from_array(tensor)?;
        let outputs = self.detector.run(ort::inputs![input])?;
        if outputs.len() == 0 {
            return Err("face detector produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let shape = tensor.shape();
        if shape.len() != 3 {
            return Err(format!("unexpected detector output shape: {shape:?}").into());
        }

        // [1, features, candidates] (transposed) or [1, candidates, features]
        let transposed = shape[1] < shape[2];
        let (candidates, features) = if transposed {
            (shape[2], shape[1])
        } else {
            (shape[1], shape[2])
        };
        let data = tensor.as_slice().ok_or("detector output not contiguous")?;

        let mut faces = Vec::new();
        for i in 0..candidates {
            let at = |f: usize| {
                if transposed {
                    data[f * candidates + i]
                } else {
                    data[i * features + f]
                }
            };
            if features < 5 {
                continue;
            }
            let conf = at(4) as f64;
            if conf < self.confidence {
                continue;
            }

            // Row: [cx, cy, w, h, conf] in letterbox space
            let cx = at(0) as f64;
            let cy = at(1) as f64;
            let w = at(2) as f64;
            let h = at(3) as f64;

            faces.push(RawFace {
                x1: ((cx - w / 2.0) - pad_x as f64) / scale,
                y1: ((cy - h / 2.0) - pad_y as f64) / scale,
                x2: ((cx + w / 2.0) - pad_x as f64) / scale,
                y2: ((cy + h / 2.0) - pad_y as f64) / scale,
                confidence: conf,
            });
        }

        Ok(nms(faces, NMS_IOU_THRESH))
    }

    fn landmarks_for(
        &mut self,
        frame: &Frame,
        crop: &SquareCrop,
    ) -> Result<FaceLandmarks, Box<dyn std::error::Error>> {
        let tensor = crop.tensor(frame, CROP_INPUT);
        let input = ort::value::Tensor::from_array(tensor)?;
        let outputs = self.landmarker.run(ort::inputs![input])?;
        if outputs.len() == 0 {
            return Err("landmark net produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let data = tensor.as_slice().ok_or("landmark output not contiguous")?;
        if data.len() < 10 {
            return Err(format!("landmark net emitted {} values, need 10", data.len()).into());
        }

        // Five (x, y) pairs normalized to the crop square
        let mut points = [(0.0f64, 0.0f64); 5];
        for (k, point) in points.iter_mut().enumerate() {
            *point = crop.to_frame(data[k * 2] as f64, data[k * 2 + 1] as f64);
        }
        Ok(FaceLandmarks::new(points))
    }

    fn scores_for(
        &mut self,
        frame: &Frame,
        crop: &SquareCrop,
    ) -> Result<ExpressionScores, Box<dyn std::error::Error>> {
        let tensor = crop.tensor(frame, CROP_INPUT);
        let input = ort::value::Tensor::from_array(tensor)?;
        let outputs = self.expression.run(ort::inputs![input])?;
        if outputs.len() == 0 {
            return Err("expression head produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let data = tensor.as_slice().ok_or("expression output not contiguous")?;
        if data.len() < 7 {
            return Err(format!("expression head emitted {} logits, need 7", data.len()).into());
        }

        let mut logits = [0.0f32; 7];
        logits.copy_from_slice(&data[..7]);
        Ok(ExpressionScores::new(softmax(logits)))
    }
}

impl ExpressionClassifier for OnnxExpressionClassifier {
    fn classify(
        &mut self,
        frame: &Frame,
    ) -> Result<Vec<FaceDetection>, Box<dyn std::error::Error>> {
        let faces = self.detect_faces(frame)?;

        let mut detections = Vec::with_capacity(faces.len());
        for face in &faces {
            let crop = SquareCrop::around(face.center(), face.half_extent());
            let landmarks = self.landmarks_for(frame, &crop)?;

            // Re-center the expression patch on the landmark centroid
            let expression_crop = match landmarks.center() {
                Some(center) => SquareCrop::around(center, face.half_extent()),
                None => crop,
            };
            let scores = self.scores_for(frame, &expression_crop)?;

            detections.push(FaceDetection::new(
                FaceBox::new(face.x1, face.y1, face.x2 - face.x1, face.y2 - face.y1),
                Some(landmarks),
                scores,
            ));
        }

        // NMS already ordered by confidence, so detections[0] is primary
        Ok(detections)
    }
}

// ---------------------------------------------------------------------------
// Geometry helpers
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
struct RawFace {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    confidence: f64,
}

impl RawFace {
    fn center(&self) -> (f64, f64) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    fn half_extent(&self) -> f64 {
        ((self.x2 - self.x1).max(self.y2 - self.y1) / 2.0).max(1.0)
    }
}

/// Square patch of the frame, possibly hanging over its edges; sampling
/// clamps to the nearest edge pixel.
#[derive(Clone, Copy, Debug)]
struct SquareCrop {
    cx: f64,
    cy: f64,
    half: f64,
}

impl SquareCrop {
    fn around(center: (f64, f64), half: f64) -> Self {
        Self {
            cx: center.0,
            cy: center.1,
            half,
        }
    }

    /// Normalized crop coordinates ([0,1] within the square) → frame pixels.
    fn to_frame(&self, nx: f64, ny: f64) -> (f64, f64) {
        (
            self.cx - self.half + nx * 2.0 * self.half,
            self.cy - self.half + ny * 2.0 * self.half,
        )
    }

    /// NCHW float tensor of the patch resampled to `size`², values in [0,1].
    fn tensor(&self, frame: &Frame, size: u32) -> ndarray::Array4<f32> {
        let src = frame.as_ndarray();
        let max_row = frame.height() as i64 - 1;
        let max_col = frame.width() as i64 - 1;
        let step = 2.0 * self.half / size as f64;

        let mut tensor =
            ndarray::Array4::<f32>::zeros((1, 3, size as usize, size as usize));
        for y in 0..size as usize {
            let fy = (self.cy - self.half + (y as f64 + 0.5) * step) as i64;
            let row = fy.clamp(0, max_row) as usize;
            for x in 0..size as usize {
                let fx = (self.cx - self.half + (x as f64 + 0.5) * step) as i64;
                let col = fx.clamp(0, max_col) as usize;
                for c in 0..3 {
                    tensor[[0, c, y, x]] = src[[row, col, c]] as f32 / 255.0;
                }
            }
        }
        tensor
    }
}

/// Letterbox-resize a frame to `target`², preserving aspect ratio with
/// gray padding. Returns `(NCHW tensor, scale, pad_x, pad_y)`.
fn letterbox(frame: &Frame, target: u32) -> (ndarray::Array4<f32>, f64, u32, u32) {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let t = target as f64;

    let scale = (t / fw).min(t / fh);
    let scaled_w = (fw * scale).round() as u32;
    let scaled_h = (fh * scale).round() as u32;
    let pad_x = (target - scaled_w) / 2;
    let pad_y = (target - scaled_h) / 2;

    let gray = 114.0f32 / 255.0;
    let mut tensor =
        ndarray::Array4::<f32>::from_elem((1, 3, target as usize, target as usize), gray);

    let src = frame.as_ndarray();
    let max_row = frame.height() as usize - 1;
    let max_col = frame.width() as usize - 1;

    for y in 0..scaled_h as usize {
        let row = ((y as f64 / scale) as usize).min(max_row);
        for x in 0..scaled_w as usize {
            let col = ((x as f64 / scale) as usize).min(max_col);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = src[[row, col, c]] as f32 / 255.0;
            }
        }
    }

    (tensor, scale, pad_x, pad_y)
}

/// Greedy NMS on confidence-sorted faces.
fn nms(mut faces: Vec<RawFace>, iou_thresh: f64) -> Vec<RawFace> {
    faces.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<RawFace> = Vec::with_capacity(faces.len());
    for face in faces {
        let overlaps = kept.iter().any(|k| iou(k, &face) > iou_thresh);
        if !overlaps {
            kept.push(face);
        }
    }
    kept
}

fn iou(a: &RawFace, b: &RawFace) -> f64 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }
    let area_a = (a.x2 - a.x1) * (a.y2 - a.y1);
    let area_b = (b.x2 - b.x1) * (b.y2 - b.y1);
    inter / (area_a + area_b - inter)
}

fn softmax(logits: [f32; 7]) -> [f32; 7] {
    let max = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let mut out = [0.0f32; 7];
    let mut sum = 0.0f32;
    for (i, &l) in logits.iter().enumerate() {
        out[i] = (l - max).exp();
        sum += out[i];
    }
    for v in &mut out {
        *v /= sum;
    }
    out
}

//! MoodLens core: samples a live video feed, infers the dominant facial
//! expression once per tick, and computes where to place an emoji
//! annotation over the detected face.
//!
//! Each area is split into `domain` (pure logic and trait ports) and
//! `infrastructure` (ffmpeg/ort/terminal adapters). The sampling loop in
//! [`sampling`] is the only stateful part; everything it talks to is a
//! port it owns as a boxed trait object.

pub mod capture;
pub mod expression;
pub mod overlay;
pub mod sampling;
pub mod shared;

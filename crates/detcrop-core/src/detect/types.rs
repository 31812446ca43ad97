//! Core types for detection decoding.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::Rect;

/// Error types for detection decoding.
#[derive(Debug, Error)]
pub enum DetectError {
    /// The model output tensor does not have the expected shape.
    #[error("Malformed model output: expected (proposals, 4 + classes), got {got:?}")]
    BadShape {
        /// The shape that was actually received.
        got: Vec<usize>,
    },

    /// The tensor's data length disagrees with its declared shape.
    #[error("Model output data length {len} does not match shape {shape:?}")]
    LengthMismatch {
        /// Declared shape.
        shape: Vec<usize>,
        /// Actual number of elements.
        len: usize,
    },

    /// The model failed to run inference.
    #[error("Inference failed: {0}")]
    Infer(String),
}

/// Raw output tensor from the detection model.
///
/// Layout is `(1, 4 + num_classes, num_proposals)` as produced by the
/// collaborator model; the batch dimension may be omitted.
#[derive(Debug, Clone)]
pub struct ModelOutput {
    /// Tensor shape.
    pub shape: Vec<usize>,
    /// Row-major tensor data.
    pub data: Vec<f32>,
}

impl ModelOutput {
    /// Create a model output tensor.
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Self {
        Self { shape, data }
    }
}

/// A single decoded detection in original-image pixel coordinates.
///
/// Detections are created per inference call and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Bounding box in top-left/width/height form.
    pub rect: Rect,
    /// Confidence score in [0, 1].
    pub score: f32,
    /// Arg-max class index.
    pub class_id: usize,
    /// Resolved class name.
    pub class_name: String,
}

//! Model output decoding and non-maximum suppression.
//!
//! The detection model emits a tensor shaped `(1, 4 + num_classes,
//! num_proposals)`: four center-form box rows (cx, cy, w, h) followed by one
//! score row per class, with one column per proposal. Decoding transposes
//! that into per-proposal candidates, selects the best class, maps boxes
//! back into original-image pixel coordinates, and runs greedy NMS.

use tracing::debug;

use crate::detect::labels::ClassNames;
use crate::detect::types::{DetectError, Detection, ModelOutput};
use crate::geometry::Rect;

/// Everything the decoder needs beyond the tensor itself: the model's
/// input size, the original image size, and the label table.
#[derive(Debug, Clone)]
pub struct DecodeContext<'a> {
    /// Width of the model input the image was resized to.
    pub model_width: u32,
    /// Height of the model input the image was resized to.
    pub model_height: u32,
    /// Width of the original image, in pixels.
    pub image_width: u32,
    /// Height of the original image, in pixels.
    pub image_height: u32,
    /// Class-id → name table from the model metadata.
    pub class_names: &'a ClassNames,
}

/// A decoded proposal before suppression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// Bounding box in original-image pixel coordinates.
    pub rect: Rect,
    /// Best class score for this proposal.
    pub score: f32,
    /// Index of the best class.
    pub class_id: usize,
}

/// Decode a raw model output tensor into scored, suppressed detections.
///
/// `confidence_threshold` drops proposals below it during suppression;
/// `nms_threshold` is the IoU above which a lower-scored overlapping box
/// is suppressed. Detections come back in suppression emission order,
/// which is score-descending with ties keeping proposal order.
pub fn decode_output(
    output: &ModelOutput,
    ctx: &DecodeContext<'_>,
    confidence_threshold: f32,
    nms_threshold: f32,
) -> Result<Vec<Detection>, DetectError> {
    let (rows, cols) = validate_shape(output)?;

    // A model run over a blank input produces an all-zero tensor; skip
    // the per-proposal work entirely.
    if output.data.iter().all(|&v| v == 0.0) {
        debug!("decode: all-zero tensor, no detections");
        return Ok(Vec::new());
    }

    let num_classes = rows - 4;
    let at = |row: usize, col: usize| output.data[row * cols + col];

    let scale_x = ctx.image_width as f32 / ctx.model_width as f32;
    let scale_y = ctx.image_height as f32 / ctx.model_height as f32;

    let mut candidates = Vec::with_capacity(cols);
    for col in 0..cols {
        let mut best_score = at(4, col);
        let mut best_class = 0;
        for class in 1..num_classes {
            let score = at(4 + class, col);
            if score > best_score {
                best_score = score;
                best_class = class;
            }
        }

        let cx = at(0, col);
        let cy = at(1, col);
        let w = at(2, col);
        let h = at(3, col);

        // Center form to top-left form, then back into original-image
        // pixels. Truncation matches the downstream integer crop grid.
        let rect = Rect::new(
            ((cx - w / 2.0) * scale_x) as i32,
            ((cy - h / 2.0) * scale_y) as i32,
            (w * scale_x) as i32,
            (h * scale_y) as i32,
        );

        candidates.push(Candidate {
            rect,
            score: best_score,
            class_id: best_class,
        });
    }

    let keep = non_max_suppression(&candidates, confidence_threshold, nms_threshold);
    debug!(
        proposals = cols,
        kept = keep.len(),
        "decode: suppression complete"
    );

    Ok(keep
        .into_iter()
        .map(|i| {
            let c = &candidates[i];
            Detection {
                rect: c.rect,
                score: c.score,
                class_id: c.class_id,
                class_name: ctx.class_names.name(c.class_id),
            }
        })
        .collect())
}

/// Greedy class-agnostic non-maximum suppression.
///
/// Candidates below `confidence_threshold` never survive. Among the rest,
/// boxes are visited in score-descending order (stable, so equal scores
/// keep their proposal order); each visited box is kept and suppresses
/// every remaining box whose IoU with it exceeds `nms_threshold`. The
/// returned indices are in emission order.
pub fn non_max_suppression(
    candidates: &[Candidate],
    confidence_threshold: f32,
    nms_threshold: f32,
) -> Vec<usize> {
    let mut order: Vec<usize> = (0..candidates.len())
        .filter(|&i| candidates[i].score >= confidence_threshold)
        .collect();
    order.sort_by(|&a, &b| {
        candidates[b]
            .score
            .partial_cmp(&candidates[a].score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    let mut suppressed = vec![false; candidates.len()];
    for (pos, &i) in order.iter().enumerate() {
        if suppressed[i] {
            continue;
        }
        keep.push(i);
        for &j in &order[pos + 1..] {
            if !suppressed[j] && candidates[i].rect.iou(&candidates[j].rect) > nms_threshold {
                suppressed[j] = true;
            }
        }
    }
    keep
}

/// Check the declared shape and data length, returning `(rows, cols)` of
/// the 2-D tensor after dropping the batch dimension.
fn validate_shape(output: &ModelOutput) -> Result<(usize, usize), DetectError> {
    let dims: &[usize] = match output.shape.as_slice() {
        [1, rest @ ..] if rest.len() == 2 => rest,
        [_, _] => &output.shape,
        _ => {
            return Err(DetectError::BadShape {
                got: output.shape.clone(),
            })
        }
    };
    let (rows, cols) = (dims[0], dims[1]);
    if rows < 5 || cols == 0 {
        return Err(DetectError::BadShape {
            got: output.shape.clone(),
        });
    }
    if output.data.len() != rows * cols {
        return Err(DetectError::LengthMismatch {
            shape: output.shape.clone(),
            len: output.data.len(),
        });
    }
    Ok((rows, cols))
}

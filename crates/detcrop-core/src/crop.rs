//! Crop rectangle calculation from detection results.
//!
//! This module derives a single target crop rectangle from a set of
//! detections under a caller-chosen [`CropPolicy`]: which box to prefer,
//! how much padding to add, and what aspect ratio to lock to.
//!
//! # Algorithm
//!
//! 1. Seed a rectangle from the detections (top confidence or union of all).
//! 2. Expand it symmetrically by the padding fraction.
//! 3. Lock the aspect ratio by *growing* the deficient axis, centered.
//! 4. Clamp to the image bounds.
//!
//! The whole computation is pure integer geometry after the padding and
//! aspect steps; it never touches pixel data, so identical inputs always
//! produce an identical rectangle.

use serde::{Deserialize, Serialize};

use crate::detect::Detection;
use crate::geometry::Rect;

/// Which detection(s) seed the crop rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SelectionMode {
    /// The single detection with the highest score (ties: first encountered).
    #[default]
    TopConfidence,
    /// The smallest rectangle enclosing the union of all detection boxes.
    ///
    /// Note that this unions every surviving detection regardless of class,
    /// so unrelated objects may merge into one oversized rectangle.
    LargestArea,
}

/// Target aspect ratio expressed as a width:height pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AspectRatio {
    /// Width component of the ratio.
    pub w: u32,
    /// Height component of the ratio.
    pub h: u32,
}

impl AspectRatio {
    /// Create a new aspect ratio. Components must be non-zero to be usable.
    pub fn new(w: u32, h: u32) -> Self {
        Self { w, h }
    }
}

impl Default for AspectRatio {
    fn default() -> Self {
        Self { w: 1, h: 1 }
    }
}

/// Policy controlling how a crop rectangle is derived from detections.
///
/// Supplied by the caller per crop request; this is a stateless value type.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CropPolicy {
    /// How to seed the rectangle from the detections.
    pub selection: SelectionMode,
    /// Symmetric padding as a fraction of the seed dimensions (0.0 to 0.5).
    pub padding_fraction: f32,
    /// Aspect ratio to lock the padded rectangle to.
    pub aspect: AspectRatio,
}

/// Compute the crop rectangle for a set of detections.
///
/// # Arguments
///
/// * `detections` - Detections in original-image pixel coordinates.
/// * `image_width` / `image_height` - Dimensions of the original image.
/// * `policy` - Selection mode, padding fraction, and target aspect ratio.
///
/// # Returns
///
/// The clamped crop rectangle, or `None` when no valid crop exists: the
/// detection list is empty, or the rectangle ends up entirely outside the
/// image. `None` means "no valid crop", not an error.
pub fn compute_crop_rect(
    detections: &[Detection],
    image_width: u32,
    image_height: u32,
    policy: &CropPolicy,
) -> Option<Rect> {
    let seed = seed_rect(detections, policy.selection)?;
    let padded = apply_padding(seed, policy.padding_fraction);
    let locked = lock_aspect(padded, policy.aspect);

    let image_rect = Rect::new(0, 0, image_width as i32, image_height as i32);
    locked.intersect(&image_rect)
}

/// Seed rectangle for the given selection mode.
fn seed_rect(detections: &[Detection], selection: SelectionMode) -> Option<Rect> {
    if detections.is_empty() {
        return None;
    }

    match selection {
        SelectionMode::TopConfidence => {
            let mut best = &detections[0];
            for det in &detections[1..] {
                // Strict comparison keeps the first on ties
                if det.score > best.score {
                    best = det;
                }
            }
            Some(best.rect)
        }
        SelectionMode::LargestArea => Rect::union_bounds(detections.iter().map(|d| &d.rect)),
    }
}

/// Expand a rectangle symmetrically by `fraction` of its dimensions.
///
/// The padding on each side is `floor(dim * fraction)`, so the rectangle
/// grows by twice that per axis.
fn apply_padding(rect: Rect, fraction: f32) -> Rect {
    if fraction <= 0.0 {
        return rect;
    }

    let pad_x = (rect.width as f32 * fraction).floor() as i32;
    let pad_y = (rect.height as f32 * fraction).floor() as i32;

    Rect::new(
        rect.x - pad_x,
        rect.y - pad_y,
        rect.width + 2 * pad_x,
        rect.height + 2 * pad_y,
    )
}

/// Grow the deficient axis of `rect` until it satisfies `aspect`.
///
/// Exactly one axis is adjusted: if the rectangle is too wide the height
/// grows, if too tall the width grows. The grown axis stays centered on the
/// original span; when the growth is odd, the extra pixel lands on the
/// top/left side. A ratio with a zero component disables the lock.
fn lock_aspect(rect: Rect, aspect: AspectRatio) -> Rect {
    if aspect.w == 0 || aspect.h == 0 || !rect.is_positive() {
        return rect;
    }

    let (rw, rh) = (aspect.w as i64, aspect.h as i64);
    let (w, h) = (rect.width as i64, rect.height as i64);

    // Cross-multiplied comparison of w/h against rw/rh avoids floats
    if w * rh > h * rw {
        // Too wide: grow height to w * rh / rw, rounding up so the
        // result never stays short of the target ratio
        let target_h = (w * rh + rw - 1) / rw;
        let extra = (target_h - h) as i32;
        let above = extra - extra / 2;
        Rect::new(rect.x, rect.y - above, rect.width, target_h as i32)
    } else if w * rh < h * rw {
        // Too tall: grow width symmetrically the same way
        let target_w = (h * rw + rh - 1) / rh;
        let extra = (target_w - w) as i32;
        let left = extra - extra / 2;
        Rect::new(rect.x - left, rect.y, target_w as i32, rect.height)
    } else {
        rect
    }
}


// ============================================================================
// Property-Based Tests
// ============================================================================

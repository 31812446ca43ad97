//! Detcrop Core - Detection-driven cropping library
//!
//! This crate provides the core pipeline for Detcrop: decoding detection
//! model output into scored bounding boxes, turning those boxes into a
//! padded aspect-locked crop rectangle, and saving the crop back out with
//! format-aware handling for standard, raw-sensor, and tiled-container
//! images.

pub mod crop;
pub mod detect;
pub mod geometry;
pub mod persist;
pub mod raster;

pub use crop::{compute_crop_rect, AspectRatio, CropPolicy, SelectionMode};
pub use detect::{detect, ClassNames, DetectError, Detection, Model, ModelOutput};
pub use geometry::Rect;
pub use persist::{crop_and_save, crop_and_save_with_codec, crop_batch, SaveError};
pub use raster::{DecodeError, FormatFamily, ImageBuffer, Orientation, TiledCodec};

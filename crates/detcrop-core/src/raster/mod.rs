//! Raster decoding, encoding, and format-family dispatch.
//!
//! This module provides functionality for:
//! - Decoding Standard-family images (PNG/JPEG/BMP/GIF) with EXIF orientation
//! - Developing camera raw files into 16-bit display-oriented buffers
//! - Cropping Tiled-Oriented (HEIF family) containers through a codec contract
//! - Carrying metadata through a crop, including EXIF dimension rewrites
//!
//! # Architecture
//!
//! Format-family branching happens once, at extension resolution
//! ([`FormatFamily::from_path`]); each family then dispatches through its
//! own decode/encode pair instead of scattering extension checks around
//! call sites.

mod exif_edit;
mod orient;
mod raw;
mod standard;
mod tiled;
mod types;

pub use exif_edit::update_exif_dimensions;
pub use orient::{apply_orientation, reverse_orientation};
pub use raw::decode_raw;
pub use standard::{decode_standard, encode_to_path, extension_of, supports_16bit, EncodeError};
pub use tiled::{crop_for_encode, TiledCodec, TiledImage};
pub use types::{DecodeError, FormatFamily, ImageBuffer, MetadataBundle, Orientation, PixelData};

#[cfg(test)]
pub(crate) use tiled::testing;

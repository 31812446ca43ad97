//! Decode/encode strategy for the Standard family (PNG/JPEG/BMP/GIF).
//!
//! Standard decoders present pixels in display orientation once the EXIF
//! orientation is applied, so cropping needs no coordinate gymnastics here.
//! Encoding targets whatever format the output extension names; 16-bit
//! buffers can only be persisted losslessly to PNG or TIFF.

use std::io::Cursor;
use std::path::Path;

use exif::{In, Reader, Tag};
use image::ImageReader;
use thiserror::Error;

use super::orient::apply_orientation;
use super::types::{DecodeError, ImageBuffer, MetadataBundle, Orientation, PixelData};

/// Errors that can occur while encoding a buffer to disk.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Width or height is zero
    #[error("Invalid dimensions: width ({width}) and height ({height}) must be non-zero")]
    InvalidDimensions { width: u32, height: u32 },

    /// The output extension cannot represent the buffer's bit depth
    #[error("Format '{extension}' does not support {bit_depth}-bit output")]
    UnsupportedBitDepth { extension: String, bit_depth: u8 },

    /// The underlying encoder failed
    #[error("Encoding failed: {0}")]
    EncodingFailed(String),
}

/// Decode an image file's bytes, applying EXIF orientation correction.
///
/// # Returns
///
/// The display-oriented 8-bit buffer plus the metadata bundle (raw EXIF
/// block and the orientation that was applied).
///
/// # Errors
///
/// Returns `DecodeError::CorruptedFile` when the bytes cannot be decoded.
pub fn decode_standard(bytes: &[u8]) -> Result<(ImageBuffer, MetadataBundle), DecodeError> {
    // Extract EXIF before decoding; missing or unparseable EXIF is fine
    let (exif_block, orientation) = extract_exif(bytes);

    let cursor = Cursor::new(bytes);
    let reader = ImageReader::new(cursor)
        .with_guessed_format()
        .map_err(|e| DecodeError::CorruptedFile(e.to_string()))?;

    let img = reader
        .decode()
        .map_err(|e| DecodeError::CorruptedFile(e.to_string()))?;

    let buffer = ImageBuffer::from_rgb_image(img.into_rgb8());
    let oriented = apply_orientation(&buffer, orientation);

    let meta = MetadataBundle {
        exif: exif_block,
        orientation,
        bit_depth: 8,
        ..Default::default()
    };
    Ok((oriented, meta))
}

/// Encode a buffer to `path`, with the format inferred from the extension.
///
/// 8-bit buffers encode to any Standard-family format. 16-bit buffers
/// require a lossless 16-bit container (PNG or TIFF) and fail with
/// [`EncodeError::UnsupportedBitDepth`] otherwise; use
/// [`ImageBuffer::to_rgb8`] first when a lossy target is intended.
pub fn encode_to_path(buffer: &ImageBuffer, path: &Path) -> Result<(), EncodeError> {
    if buffer.is_empty() {
        return Err(EncodeError::InvalidDimensions {
            width: buffer.width,
            height: buffer.height,
        });
    }

    match &buffer.pixels {
        PixelData::Rgb8(pixels) => {
            let img = image::RgbImage::from_raw(buffer.width, buffer.height, pixels.clone())
                .ok_or_else(|| {
                    EncodeError::EncodingFailed("pixel buffer size mismatch".to_string())
                })?;
            img.save(path)
                .map_err(|e| EncodeError::EncodingFailed(e.to_string()))
        }
        PixelData::Rgb16(pixels) => {
            if !supports_16bit(path) {
                return Err(EncodeError::UnsupportedBitDepth {
                    extension: extension_of(path),
                    bit_depth: 16,
                });
            }
            let img: image::ImageBuffer<image::Rgb<u16>, Vec<u16>> =
                image::ImageBuffer::from_raw(buffer.width, buffer.height, pixels.clone())
                    .ok_or_else(|| {
                        EncodeError::EncodingFailed("pixel buffer size mismatch".to_string())
                    })?;
            image::DynamicImage::ImageRgb16(img)
                .save(path)
                .map_err(|e| EncodeError::EncodingFailed(e.to_string()))
        }
    }
}

/// Whether the path's extension names a lossless 16-bit-capable container.
pub fn supports_16bit(path: &Path) -> bool {
    matches!(
        extension_of(path).as_str(),
        "png" | "tif" | "tiff"
    )
}

/// Lowercased extension of `path`, empty when absent.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Extract the raw EXIF block and orientation from image bytes.
///
/// Returns `(None, Normal)` when no EXIF data is found.
fn extract_exif(bytes: &[u8]) -> (Option<Vec<u8>>, Orientation) {
    let mut cursor = Cursor::new(bytes);
    match Reader::new().read_from_container(&mut cursor) {
        Ok(exif) => {
            let orientation = exif
                .get_field(Tag::Orientation, In::PRIMARY)
                .and_then(|f| f.value.get_uint(0))
                .map(Orientation::from)
                .unwrap_or_default();
            (Some(exif.buf().to_vec()), orientation)
        }
        Err(_) => (None, Orientation::default()),
    }
}

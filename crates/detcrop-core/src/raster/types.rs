//! Core types for raster decoding and encoding.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::Rect;

/// Error types for raster decode operations.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The file format is not recognized or supported.
    #[error("Invalid or unsupported image format")]
    InvalidFormat,

    /// The camera model is not supported for RAW decoding.
    #[error("Unsupported camera: {0}")]
    UnsupportedCamera(String),

    /// The image file is corrupted or incomplete.
    #[error("Corrupted or incomplete image file: {0}")]
    CorruptedFile(String),

    /// I/O error during file reading.
    #[error("I/O error: {0}")]
    IoError(String),

    /// EXIF parsing error.
    #[error("EXIF error: {0}")]
    ExifError(String),
}

/// Pixel storage for an [`ImageBuffer`], 8 or 16 bits per channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PixelData {
    /// 8-bit RGB, 3 bytes per pixel, row-major.
    Rgb8(Vec<u8>),
    /// 16-bit RGB, 3 samples per pixel, row-major.
    Rgb16(Vec<u16>),
}

/// A decoded image with RGB pixel data at 8 or 16 bits per channel.
///
/// The buffer is owned exclusively by whichever component currently holds
/// it; it is never shared across threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBuffer {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// RGB samples in row-major order.
    pub pixels: PixelData,
}

impl ImageBuffer {
    /// Create an 8-bit buffer with the given dimensions and pixel data.
    pub fn new_rgb8(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(
            pixels.len(),
            width as usize * height as usize * 3,
            "Pixel buffer size mismatch"
        );
        Self {
            width,
            height,
            pixels: PixelData::Rgb8(pixels),
        }
    }

    /// Create a 16-bit buffer with the given dimensions and pixel data.
    pub fn new_rgb16(width: u32, height: u32, pixels: Vec<u16>) -> Self {
        debug_assert_eq!(
            pixels.len(),
            width as usize * height as usize * 3,
            "Pixel buffer size mismatch"
        );
        Self {
            width,
            height,
            pixels: PixelData::Rgb16(pixels),
        }
    }

    /// Bits per channel: 8 or 16.
    pub fn bit_depth(&self) -> u8 {
        match self.pixels {
            PixelData::Rgb8(_) => 8,
            PixelData::Rgb16(_) => 16,
        }
    }

    /// Check if this is an empty/invalid image.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Crop the buffer to the intersection of `rect` with the image bounds.
    ///
    /// Returns `None` when the intersection has no area. Coordinates that
    /// extend past the image edges are truncated silently, matching the
    /// behavior callers expect from slice-style cropping.
    pub fn crop(&self, rect: &Rect) -> Option<ImageBuffer> {
        let bounds = Rect::new(0, 0, self.width as i32, self.height as i32);
        let r = rect.intersect(&bounds)?;
        let (x, y) = (r.x as usize, r.y as usize);
        let (w, h) = (r.width as usize, r.height as usize);

        let pixels = match &self.pixels {
            PixelData::Rgb8(p) => PixelData::Rgb8(crop_plane(p, self.width as usize, x, y, w, h)),
            PixelData::Rgb16(p) => PixelData::Rgb16(crop_plane(p, self.width as usize, x, y, w, h)),
        };

        Some(ImageBuffer {
            width: w as u32,
            height: h as u32,
            pixels,
        })
    }

    /// Reduce to 8 bits per channel.
    ///
    /// 16-bit samples are right-shifted by 8, keeping the most significant
    /// bits. An 8-bit buffer is returned as a clone.
    pub fn to_rgb8(&self) -> ImageBuffer {
        match &self.pixels {
            PixelData::Rgb8(_) => self.clone(),
            PixelData::Rgb16(p) => {
                let reduced: Vec<u8> = p.iter().map(|v| (v >> 8) as u8).collect();
                ImageBuffer::new_rgb8(self.width, self.height, reduced)
            }
        }
    }

    /// Convert an 8-bit buffer to an `image::RgbImage` for further processing.
    ///
    /// 16-bit buffers are reduced first.
    pub fn to_rgb_image(&self) -> Option<image::RgbImage> {
        match &self.pixels {
            PixelData::Rgb8(p) => image::RgbImage::from_raw(self.width, self.height, p.clone()),
            PixelData::Rgb16(_) => self.to_rgb8().to_rgb_image(),
        }
    }

    /// Create a buffer from an `image::RgbImage`.
    pub fn from_rgb_image(img: image::RgbImage) -> Self {
        let (width, height) = img.dimensions();
        ImageBuffer::new_rgb8(width, height, img.into_raw())
    }
}

/// Copy a `w`x`h` region starting at (`x`, `y`) out of a row-major RGB plane.
fn crop_plane<T: Copy>(pixels: &[T], src_width: usize, x: usize, y: usize, w: usize, h: usize) -> Vec<T> {
    let mut out = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        let start = ((y + row) * src_width + x) * 3;
        out.extend_from_slice(&pixels[start..start + w * 3]);
    }
    out
}

/// EXIF orientation values (1-8).
/// See: https://exiftool.org/TagNames/EXIF.html
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Orientation {
    /// Normal (no transformation needed).
    #[default]
    Normal = 1,
    /// Horizontal flip.
    FlipHorizontal = 2,
    /// Rotate 180 degrees.
    Rotate180 = 3,
    /// Vertical flip.
    FlipVertical = 4,
    /// Transpose (rotate 90 CW + flip horizontal).
    Transpose = 5,
    /// Rotate 90 degrees clockwise.
    Rotate90CW = 6,
    /// Transverse (rotate 270 CW + flip horizontal).
    Transverse = 7,
    /// Rotate 270 degrees clockwise (90 CCW).
    Rotate270CW = 8,
}

impl Orientation {
    /// The numeric EXIF code (1-8).
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Returns true if this orientation swaps width and height dimensions.
    ///
    /// Rotations of 90° and 270° (and their flip variants Transpose/Transverse)
    /// swap the image dimensions.
    #[inline]
    pub fn swaps_dimensions(self) -> bool {
        matches!(
            self,
            Orientation::Transpose
                | Orientation::Rotate90CW
                | Orientation::Transverse
                | Orientation::Rotate270CW
        )
    }
}

impl From<u32> for Orientation {
    fn from(value: u32) -> Self {
        match value {
            1 => Orientation::Normal,
            2 => Orientation::FlipHorizontal,
            3 => Orientation::Rotate180,
            4 => Orientation::FlipVertical,
            5 => Orientation::Transpose,
            6 => Orientation::Rotate90CW,
            7 => Orientation::Transverse,
            8 => Orientation::Rotate270CW,
            _ => Orientation::Normal,
        }
    }
}

/// Opaque metadata carried through a crop operation.
///
/// Everything here passes through unchanged except for the EXIF pixel
/// dimension fields, which the persister rewrites to the crop size when the
/// target format stores them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataBundle {
    /// Raw EXIF block (TIFF structure), if present.
    pub exif: Option<Vec<u8>>,
    /// EXIF orientation.
    pub orientation: Orientation,
    /// Bits per channel as stored in the container.
    pub bit_depth: u8,
    /// Chroma subsampling descriptor (e.g. "420"), container-specific.
    pub chroma: Option<String>,
    /// Color profile bytes (ICC/nclx), container-specific.
    pub color_profile: Option<Vec<u8>>,
    /// XMP block, if present.
    pub xmp: Option<Vec<u8>>,
}

impl Default for MetadataBundle {
    fn default() -> Self {
        Self {
            exif: None,
            orientation: Orientation::Normal,
            bit_depth: 8,
            chroma: None,
            color_profile: None,
            xmp: None,
        }
    }
}

/// Extensions handled by the Tiled-Oriented (HEIF family) strategy.
const HEIF_EXTENSIONS: &[&str] = &["heic", "heics", "heif", "heifs", "hif"];

/// Extensions handled by the RawSensor strategy.
const RAW_EXTENSIONS: &[&str] = &["arw", "nef", "cwr", "cr2", "cr3", "orf", "pef"];

/// Extensions handled by the Standard strategy.
const STANDARD_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp"];

/// Classification of image files sharing a decode/encode/orientation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormatFamily {
    /// PNG/JPEG/BMP/GIF: decoders present pixels in display orientation.
    Standard,
    /// HEIF family: tiled container with an orientation tag re-applied on load.
    TiledOriented,
    /// Camera raw formats: decoded through the sensor postprocessing pipeline.
    RawSensor,
}

impl FormatFamily {
    /// Resolve the family from a file extension (without the dot).
    ///
    /// Matching is case-insensitive. Unknown extensions return `None`.
    pub fn from_extension(ext: &str) -> Option<FormatFamily> {
        let ext = ext.to_ascii_lowercase();
        if STANDARD_EXTENSIONS.contains(&ext.as_str()) {
            Some(FormatFamily::Standard)
        } else if HEIF_EXTENSIONS.contains(&ext.as_str()) {
            Some(FormatFamily::TiledOriented)
        } else if RAW_EXTENSIONS.contains(&ext.as_str()) {
            Some(FormatFamily::RawSensor)
        } else {
            None
        }
    }

    /// Resolve the family from a file path's extension.
    pub fn from_path(path: &Path) -> Option<FormatFamily> {
        let ext = path.extension()?.to_str()?;
        Self::from_extension(ext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_buffer_creation_and_depth() {
        let buf8 = ImageBuffer::new_rgb8(4, 2, vec![0u8; 4 * 2 * 3]);
        assert_eq!(buf8.bit_depth(), 8);
        assert!(!buf8.is_empty());

        let buf16 = ImageBuffer::new_rgb16(4, 2, vec![0u16; 4 * 2 * 3]);
        assert_eq!(buf16.bit_depth(), 16);
    }

    #[test]
    fn test_crop_in_bounds() {
        // 4x4 image, each pixel value = row * 4 + col
        let mut pixels = Vec::new();
        for i in 0..16u8 {
            pixels.extend_from_slice(&[i, i, i]);
        }
        let buf = ImageBuffer::new_rgb8(4, 4, pixels);

        let cropped = buf.crop(&Rect::new(1, 1, 2, 2)).unwrap();
        assert_eq!(cropped.width, 2);
        assert_eq!(cropped.height, 2);
        match cropped.pixels {
            PixelData::Rgb8(p) => assert_eq!(p[0], 5), // pixel (1,1)
            _ => panic!("expected 8-bit pixels"),
        }
    }

    #[test]
    fn test_crop_truncates_past_edge() {
        let buf = ImageBuffer::new_rgb8(10, 10, vec![0u8; 10 * 10 * 3]);
        let cropped = buf.crop(&Rect::new(8, 8, 5, 5)).unwrap();
        assert_eq!(cropped.width, 2);
        assert_eq!(cropped.height, 2);
    }

    #[test]
    fn test_crop_outside_is_none() {
        let buf = ImageBuffer::new_rgb8(10, 10, vec![0u8; 10 * 10 * 3]);
        assert!(buf.crop(&Rect::new(20, 20, 5, 5)).is_none());
        assert!(buf.crop(&Rect::new(0, 0, 0, 5)).is_none());
    }

    #[test]
    fn test_crop_16bit() {
        let buf = ImageBuffer::new_rgb16(3, 3, vec![1000u16; 3 * 3 * 3]);
        let cropped = buf.crop(&Rect::new(0, 0, 2, 2)).unwrap();
        assert_eq!(cropped.bit_depth(), 16);
        assert_eq!(cropped.width, 2);
    }

    #[test]
    fn test_to_rgb8_shifts() {
        let buf = ImageBuffer::new_rgb16(1, 1, vec![0xFF00, 0x0100, 0xFFFF]);
        let reduced = buf.to_rgb8();
        match reduced.pixels {
            PixelData::Rgb8(p) => assert_eq!(p, vec![0xFF, 0x01, 0xFF]),
            _ => panic!("expected 8-bit pixels"),
        }
    }

    #[test]
    fn test_orientation_from_u32() {
        assert_eq!(Orientation::from(1), Orientation::Normal);
        assert_eq!(Orientation::from(6), Orientation::Rotate90CW);
        assert_eq!(Orientation::from(99), Orientation::Normal); // Invalid defaults to Normal
    }

    #[test]
    fn test_orientation_swaps_dimensions() {
        assert!(!Orientation::Normal.swaps_dimensions());
        assert!(!Orientation::Rotate180.swaps_dimensions());
        assert!(Orientation::Rotate90CW.swaps_dimensions());
        assert!(Orientation::Transverse.swaps_dimensions());
    }

    #[test]
    fn test_format_family_from_extension() {
        assert_eq!(FormatFamily::from_extension("jpg"), Some(FormatFamily::Standard));
        assert_eq!(FormatFamily::from_extension("PNG"), Some(FormatFamily::Standard));
        assert_eq!(FormatFamily::from_extension("heic"), Some(FormatFamily::TiledOriented));
        assert_eq!(FormatFamily::from_extension("HIF"), Some(FormatFamily::TiledOriented));
        assert_eq!(FormatFamily::from_extension("arw"), Some(FormatFamily::RawSensor));
        assert_eq!(FormatFamily::from_extension("nef"), Some(FormatFamily::RawSensor));
        assert_eq!(FormatFamily::from_extension("txt"), None);
    }

    #[test]
    fn test_format_family_from_path() {
        let p = PathBuf::from("/photos/IMG_0001.ARW");
        assert_eq!(FormatFamily::from_path(&p), Some(FormatFamily::RawSensor));
        assert_eq!(FormatFamily::from_path(&PathBuf::from("noext")), None);
    }

    #[test]
    fn test_metadata_bundle_default() {
        let meta = MetadataBundle::default();
        assert_eq!(meta.orientation, Orientation::Normal);
        assert_eq!(meta.bit_depth, 8);
        assert!(meta.exif.is_none());
    }
}

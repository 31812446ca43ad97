//! Format-aware crop persisting.
//!
//! Each format family gets its own save strategy:
//!
//! - **Standard** (png/jpg/jpeg/gif/bmp): decode with the `image` crate,
//!   crop, encode to whatever the output extension asks for.
//! - **RawSensor** (arw/nef/...): develop the raw mosaic into a 16-bit RGB
//!   image, crop, and force a lossless output format. A cropped raw can
//!   never be written back as a raw file.
//! - **TiledOriented** (heic/heif/...): decode through an injected
//!   [`TiledCodec`], crop in display coordinates, undo the orientation
//!   transform, rewrite the EXIF pixel dimensions, and re-encode with all
//!   other metadata untouched.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::geometry::Rect;
use crate::raster::{
    crop_for_encode, decode_raw, decode_standard, encode_to_path, extension_of, supports_16bit,
    DecodeError, FormatFamily, TiledCodec,
};

/// Errors from the crop-and-save pipeline.
#[derive(Debug, Error)]
pub enum SaveError {
    /// The input file does not exist.
    #[error("Input file not found: {0}")]
    NotFound(PathBuf),

    /// The crop rectangle has non-positive width or height, or does not
    /// intersect the image.
    #[error("Invalid crop rectangle: {rect:?}")]
    InvalidRect {
        /// The rejected rectangle.
        rect: Rect,
    },

    /// The input extension is outside the supported families, or the
    /// family needs a codec that was not supplied.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(PathBuf),

    /// The input could not be decoded.
    #[error("Decode failed: {0}")]
    Decode(#[from] DecodeError),

    /// The cropped image could not be encoded.
    #[error("Encode failed: {0}")]
    Encode(String),

    /// Filesystem error reading the input or preparing the output.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Crop `input` to `rect` and save the result at `output`.
///
/// The returned path is the one actually written, which differs from
/// `output` only for raw inputs whose requested extension cannot hold
/// 16-bit data (those are rewritten to `.png`).
///
/// Tiled-container inputs need a codec; use [`crop_and_save_with_codec`].
pub fn crop_and_save(input: &Path, output: &Path, rect: &Rect) -> Result<PathBuf, SaveError> {
    crop_and_save_inner(input, output, rect, None)
}

/// Like [`crop_and_save`], with a codec for the tiled-container family.
pub fn crop_and_save_with_codec(
    input: &Path,
    output: &Path,
    rect: &Rect,
    codec: &dyn TiledCodec,
) -> Result<PathBuf, SaveError> {
    crop_and_save_inner(input, output, rect, Some(codec))
}

fn crop_and_save_inner(
    input: &Path,
    output: &Path,
    rect: &Rect,
    codec: Option<&dyn TiledCodec>,
) -> Result<PathBuf, SaveError> {
    if !rect.is_positive() {
        return Err(SaveError::InvalidRect { rect: *rect });
    }
    if !input.is_file() {
        return Err(SaveError::NotFound(input.to_path_buf()));
    }
    let family = FormatFamily::from_path(input)
        .ok_or_else(|| SaveError::UnsupportedFormat(input.to_path_buf()))?;

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    debug!(family = ?family, "persist: cropping {} -> {}", input.display(), output.display());
    let written = match family {
        FormatFamily::Standard => save_standard(input, output, rect)?,
        FormatFamily::RawSensor => save_raw(input, output, rect)?,
        FormatFamily::TiledOriented => match codec {
            Some(codec) => save_tiled(input, output, rect, codec)?,
            None => return Err(SaveError::UnsupportedFormat(input.to_path_buf())),
        },
    };

    info!("persist: wrote {}", written.display());
    Ok(written)
}

fn save_standard(input: &Path, output: &Path, rect: &Rect) -> Result<PathBuf, SaveError> {
    let bytes = fs::read(input)?;
    let (image, _meta) = decode_standard(&bytes)?;
    let cropped = image
        .crop(rect)
        .ok_or(SaveError::InvalidRect { rect: *rect })?;
    encode_to_path(&cropped, output).map_err(|e| SaveError::Encode(e.to_string()))?;
    Ok(output.to_path_buf())
}

fn save_raw(input: &Path, output: &Path, rect: &Rect) -> Result<PathBuf, SaveError> {
    let (image, _meta) = decode_raw(input)?;
    let cropped = image
        .crop(rect)
        .ok_or(SaveError::InvalidRect { rect: *rect })?;

    // Developed raws are 16-bit; the output must be a lossless format
    // that can hold that.
    let output = if supports_16bit(output) {
        output.to_path_buf()
    } else {
        let rewritten = output.with_extension("png");
        warn!(
            "persist: '{}' cannot hold 16-bit data, writing {}",
            extension_of(output),
            rewritten.display()
        );
        rewritten
    };

    encode_to_path(&cropped, &output).map_err(|e| SaveError::Encode(e.to_string()))?;
    Ok(output)
}

fn save_tiled(
    input: &Path,
    output: &Path,
    rect: &Rect,
    codec: &dyn TiledCodec,
) -> Result<PathBuf, SaveError> {
    let image = codec.decode(input)?;
    let (sensor, meta) =
        crop_for_encode(&image, rect).ok_or(SaveError::InvalidRect { rect: *rect })?;
    codec
        .encode(&sensor, &meta, output)
        .map_err(|e| SaveError::Encode(e.to_string()))?;
    Ok(output.to_path_buf())
}

/// Crop a batch of files into `output_dir`, one output per input, with the
/// crop rectangle computed per file. A failing file is recorded and the
/// loop moves on.
pub fn crop_batch<F>(
    inputs: &[PathBuf],
    output_dir: &Path,
    mut rect_for: F,
) -> Vec<(PathBuf, Result<PathBuf, SaveError>)>
where
    F: FnMut(&Path) -> Rect,
{
    inputs
        .iter()
        .map(|input| {
            let name = input.file_name().unwrap_or_default();
            let output = output_dir.join(name);
            let rect = rect_for(input);
            let result = crop_and_save(input, &output, &rect);
            if let Err(e) = &result {
                warn!("persist: {} failed: {e}", input.display());
            }
            (input.clone(), result)
        })
        .collect()
}

//! RawSensor decoding: rawloader + fixed develop parameters.
//!
//! Camera raw files (ARW/NEF/...) are decoded to a 16-bit RGB buffer in
//! display orientation using a fixed pipeline: black/white level
//! normalization, camera white balance, no auto-brightening, and a
//! gradient-corrected bilinear demosaic. The result is only ever persisted
//! to a lossless 16-bit container, never re-encoded as raw.
//!
//! # Supported sensors
//!
//! Any camera rawloader can decode, as long as the mosaic is a 2x2 Bayer
//! pattern. Exotic patterns (X-Trans and friends) are rejected as
//! unsupported rather than demosaiced badly.

use std::path::Path;

use rawloader::{RawImage, RawImageData};
use tracing::debug;

use super::orient::apply_orientation;
use super::types::{DecodeError, ImageBuffer, MetadataBundle, Orientation};

/// Fixed exposure multiplier applied after white balance.
const BRIGHTNESS: f32 = 2.0;

/// BT.709 transfer curve parameters (power, linear toe slope).
const GAMMA_POWER: f32 = 2.222;
const GAMMA_SLOPE: f32 = 4.5;

/// Decode a camera raw file into a 16-bit display-oriented RGB buffer.
///
/// # Errors
///
/// - `DecodeError::UnsupportedCamera` - rawloader has no decoder for the
///   camera, the sample format is not integer, or the mosaic is not Bayer.
/// - `DecodeError::CorruptedFile` - the file could not be parsed.
pub fn decode_raw(path: &Path) -> Result<(ImageBuffer, MetadataBundle), DecodeError> {
    debug!("raw: decoding {}", path.display());

    let raw = rawloader::decode_file(path).map_err(|e| map_rawloader_error(e.to_string()))?;

    let orientation = map_orientation(&raw);
    let linear = develop(&raw)?;
    let oriented = apply_orientation(&linear, orientation);

    // Best-effort EXIF carry-over; raw containers that kamadak-exif cannot
    // parse simply produce a bundle without an EXIF block.
    let exif = read_exif_block(path);

    let meta = MetadataBundle {
        exif,
        // The buffer is already in display orientation
        orientation: Orientation::Normal,
        bit_depth: 16,
        ..Default::default()
    };

    debug!(
        "raw: {} {} -> {}x{} 16-bit",
        raw.clean_make, raw.clean_model, oriented.width, oriented.height
    );
    Ok((oriented, meta))
}

fn map_rawloader_error(message: String) -> DecodeError {
    // rawloader reports errors as strings; camera support gaps mention the
    // camera, everything else is treated as a parse failure
    if message.contains("amera") {
        DecodeError::UnsupportedCamera(message)
    } else {
        DecodeError::CorruptedFile(message)
    }
}

fn map_orientation(raw: &RawImage) -> Orientation {
    match raw.orientation {
        rawloader::Orientation::Normal => Orientation::Normal,
        rawloader::Orientation::HorizontalFlip => Orientation::FlipHorizontal,
        rawloader::Orientation::Rotate180 => Orientation::Rotate180,
        rawloader::Orientation::VerticalFlip => Orientation::FlipVertical,
        rawloader::Orientation::Transpose => Orientation::Transpose,
        rawloader::Orientation::Rotate90 => Orientation::Rotate90CW,
        rawloader::Orientation::Transverse => Orientation::Transverse,
        rawloader::Orientation::Rotate270 => Orientation::Rotate270CW,
        rawloader::Orientation::Unknown => Orientation::Normal,
    }
}

fn read_exif_block(path: &Path) -> Option<Vec<u8>> {
    let file = std::fs::File::open(path).ok()?;
    let mut reader = std::io::BufReader::new(file);
    exif::Reader::new()
        .read_from_container(&mut reader)
        .ok()
        .map(|e| e.buf().to_vec())
}

/// Run the fixed develop pipeline on the raw mosaic.
fn develop(raw: &RawImage) -> Result<ImageBuffer, DecodeError> {
    let data = match &raw.data {
        RawImageData::Integer(v) => v,
        RawImageData::Float(_) => {
            return Err(DecodeError::UnsupportedCamera(format!(
                "{} {}: floating point raw data",
                raw.clean_make, raw.clean_model
            )));
        }
    };

    if raw.cpp == 3 {
        // Sensor data is already RGB (e.g. linear DNG): normalize only
        return Ok(finish_rgb(
            &normalize_rgb(raw, data),
            raw.width,
            active_area(raw),
        ));
    }

    if raw.cfa.width != 2 || raw.cfa.height != 2 {
        return Err(DecodeError::UnsupportedCamera(format!(
            "{} {}: non-Bayer mosaic '{}'",
            raw.clean_make, raw.clean_model, raw.cfa.name
        )));
    }

    let mosaic = normalize_mosaic(raw, data);
    let rgb = demosaic(&mosaic, raw);
    Ok(finish_rgb(&rgb, raw.width, active_area(raw)))
}

/// Active-area rectangle as (left, top, width, height).
///
/// rawloader's crop margins are ordered top/right/bottom/left.
fn active_area(raw: &RawImage) -> (usize, usize, usize, usize) {
    let [top, right, bottom, left] = raw.crops;
    let width = raw.width.saturating_sub(left + right);
    let height = raw.height.saturating_sub(top + bottom);
    (left, top, width.max(1), height.max(1))
}

/// White-balance multipliers normalized so green is 1.0.
///
/// Cameras report coefficients per CFA color; a missing or degenerate
/// green coefficient disables white balance rather than corrupting output.
fn wb_multipliers(raw: &RawImage) -> [f32; 4] {
    let coeffs = raw.wb_coeffs;
    let green = coeffs[1];
    if !green.is_finite() || green <= 0.0 {
        return [1.0; 4];
    }
    let mut out = [1.0f32; 4];
    for (i, c) in coeffs.iter().enumerate() {
        if c.is_finite() && *c > 0.0 {
            out[i] = c / green;
        }
    }
    // The second green shares the first green's coefficient when absent
    if !coeffs[3].is_finite() || coeffs[3] <= 0.0 {
        out[3] = 1.0;
    }
    out
}

/// Normalize a single-component mosaic to [0, 1] with white balance applied.
///
/// The output plane keeps the full sensor dimensions; the CFA color of a
/// sample stays addressable by its absolute (row, col) position.
fn normalize_mosaic(raw: &RawImage, data: &[u16]) -> Vec<f32> {
    let wb = wb_multipliers(raw);
    let mut out = vec![0f32; raw.width * raw.height];
    for row in 0..raw.height {
        for col in 0..raw.width {
            let idx = row * raw.width + col;
            let color = raw.cfa.color_at(row, col);
            let black = raw.blacklevels[color] as f32;
            let white = raw.whitelevels[color] as f32;
            let range = (white - black).max(1.0);
            let v = (data[idx] as f32 - black) / range;
            out[idx] = (v * wb[color]).clamp(0.0, 1.0);
        }
    }
    out
}

/// Normalize an already-RGB sensor plane (cpp == 3).
fn normalize_rgb(raw: &RawImage, data: &[u16]) -> Vec<[f32; 3]> {
    let wb = wb_multipliers(raw);
    let mut out = vec![[0f32; 3]; raw.width * raw.height];
    for (i, px) in out.iter_mut().enumerate() {
        for c in 0..3 {
            let black = raw.blacklevels[c] as f32;
            let white = raw.whitelevels[c] as f32;
            let range = (white - black).max(1.0);
            let v = (data[i * 3 + c] as f32 - black) / range;
            px[c] = (v * wb[c]).clamp(0.0, 1.0);
        }
    }
    out
}

/// Gradient-corrected bilinear demosaic for 2x2 Bayer mosaics.
///
/// Greens at red/blue sites are interpolated along the axis with the
/// smaller gradient; red and blue are then reconstructed from smoothed
/// color differences against the green plane, which suppresses the zipper
/// artifacts plain bilinear produces at edges.
fn demosaic(mosaic: &[f32], raw: &RawImage) -> Vec<[f32; 3]> {
    let (w, h) = (raw.width, raw.height);
    let at = |row: isize, col: isize| -> f32 {
        let r = row.clamp(0, h as isize - 1) as usize;
        let c = col.clamp(0, w as isize - 1) as usize;
        mosaic[r * w + c]
    };
    // Treat the second green (CFA color 3) as green
    let color_at = |row: usize, col: usize| -> usize {
        let c = raw.cfa.color_at(row, col);
        if c == 3 {
            1
        } else {
            c
        }
    };

    // Pass 1: full green plane, edge-directed at non-green sites
    let mut green = vec![0f32; w * h];
    for row in 0..h {
        for col in 0..w {
            let idx = row * w + col;
            if color_at(row, col) == 1 {
                green[idx] = mosaic[idx];
                continue;
            }
            let (r, c) = (row as isize, col as isize);
            let horiz = (at(r, c - 1), at(r, c + 1));
            let vert = (at(r - 1, c), at(r + 1, c));
            let grad_h = (horiz.0 - horiz.1).abs();
            let grad_v = (vert.0 - vert.1).abs();
            green[idx] = if grad_h < grad_v {
                (horiz.0 + horiz.1) / 2.0
            } else if grad_v < grad_h {
                (vert.0 + vert.1) / 2.0
            } else {
                (horiz.0 + horiz.1 + vert.0 + vert.1) / 4.0
            };
        }
    }

    // Pass 2: red/blue from color differences against green
    let mut out = vec![[0f32; 3]; w * h];
    for row in 0..h {
        for col in 0..w {
            let idx = row * w + col;
            let g = green[idx];
            let mut px = [0f32; 3];
            px[1] = g;

            for channel in [0usize, 2] {
                if color_at(row, col) == channel {
                    px[channel] = mosaic[idx];
                    continue;
                }
                // Average the (C - G) difference over same-color neighbors
                let mut sum = 0f32;
                let mut count = 0u32;
                for dr in -1isize..=1 {
                    for dc in -1isize..=1 {
                        let nr = row as isize + dr;
                        let nc = col as isize + dc;
                        if nr < 0 || nc < 0 || nr >= h as isize || nc >= w as isize {
                            continue;
                        }
                        let (nru, ncu) = (nr as usize, nc as usize);
                        if color_at(nru, ncu) == channel {
                            sum += mosaic[nr as usize * w + ncu] - green[nru * w + ncu];
                            count += 1;
                        }
                    }
                }
                px[channel] = if count > 0 {
                    (g + sum / count as f32).clamp(0.0, 1.0)
                } else {
                    g
                };
            }
            out[idx] = px;
        }
    }
    out
}

/// Crop to the active area, apply brightness and the BT.709 transfer curve,
/// and quantize to 16 bits.
fn finish_rgb(
    rgb: &[[f32; 3]],
    sensor_width: usize,
    area: (usize, usize, usize, usize),
) -> ImageBuffer {
    let (left, top, width, height) = area;
    let mut pixels = Vec::with_capacity(width * height * 3);
    for row in 0..height {
        for col in 0..width {
            let idx = (top + row) * sensor_width + (left + col);
            for c in 0..3 {
                let v = gamma_encode((rgb[idx][c] * BRIGHTNESS).clamp(0.0, 1.0));
                pixels.push((v * 65535.0).round() as u16);
            }
        }
    }
    ImageBuffer::new_rgb16(width as u32, height as u32, pixels)
}

/// BT.709 opto-electronic transfer: linear toe, power curve above it.
fn gamma_encode(v: f32) -> f32 {
    if v < 0.018 {
        GAMMA_SLOPE * v
    } else {
        1.099 * v.powf(1.0 / GAMMA_POWER) - 0.099
    }
}

//! Pixel reordering for EXIF orientations.
//!
//! Tiled containers store pixels in sensor orientation and rely on the
//! orientation tag being re-applied on load. Cropping happens in display
//! orientation (what the user sees), so the persister must run the
//! *inverse* transform on the cropped buffer before re-encoding it with
//! the original tag. Getting one of the eight codes wrong silently rotates
//! the output, which is why the forward and reverse tables live next to
//! each other below.

use super::types::{ImageBuffer, Orientation, PixelData};

/// Primitive pixel rearrangement applied to a whole buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transform {
    Identity,
    FlipHorizontal,
    FlipVertical,
    Rotate90,
    Rotate180,
    Rotate270,
    /// Reflection along the main diagonal (self-inverse).
    Transpose,
    /// Reflection along the anti-diagonal (self-inverse).
    Transverse,
}

/// Sensor orientation -> display orientation.
fn forward_transform(orientation: Orientation) -> Transform {
    match orientation {
        Orientation::Normal => Transform::Identity,
        Orientation::FlipHorizontal => Transform::FlipHorizontal,
        Orientation::Rotate180 => Transform::Rotate180,
        Orientation::FlipVertical => Transform::FlipVertical,
        Orientation::Transpose => Transform::Transpose,
        Orientation::Rotate90CW => Transform::Rotate90,
        Orientation::Transverse => Transform::Transverse,
        Orientation::Rotate270CW => Transform::Rotate270,
    }
}

/// Display orientation -> sensor orientation: the exact inverse of each
/// forward transform. Flips, 180 rotation, and the two diagonal reflections
/// are their own inverses; only the quarter rotations swap.
fn reverse_transform(orientation: Orientation) -> Transform {
    match orientation {
        Orientation::Normal => Transform::Identity,
        Orientation::FlipHorizontal => Transform::FlipHorizontal,
        Orientation::Rotate180 => Transform::Rotate180,
        Orientation::FlipVertical => Transform::FlipVertical,
        Orientation::Transpose => Transform::Transpose,
        Orientation::Rotate90CW => Transform::Rotate270,
        Orientation::Transverse => Transform::Transverse,
        Orientation::Rotate270CW => Transform::Rotate90,
    }
}

/// Transform a sensor-oriented buffer into display orientation.
pub fn apply_orientation(buffer: &ImageBuffer, orientation: Orientation) -> ImageBuffer {
    run(buffer, forward_transform(orientation))
}

/// Undo the display transform, returning the buffer to sensor orientation.
pub fn reverse_orientation(buffer: &ImageBuffer, orientation: Orientation) -> ImageBuffer {
    run(buffer, reverse_transform(orientation))
}

fn run(buffer: &ImageBuffer, transform: Transform) -> ImageBuffer {
    if transform == Transform::Identity {
        return buffer.clone();
    }

    let (w, h) = (buffer.width as usize, buffer.height as usize);
    let swaps = matches!(
        transform,
        Transform::Rotate90 | Transform::Rotate270 | Transform::Transpose | Transform::Transverse
    );
    let (dst_w, dst_h) = if swaps { (h, w) } else { (w, h) };

    // Inverse mapping: for each destination pixel, the source pixel it reads.
    let source_of = |dx: usize, dy: usize| -> (usize, usize) {
        match transform {
            Transform::Identity => (dx, dy),
            Transform::FlipHorizontal => (w - 1 - dx, dy),
            Transform::FlipVertical => (dx, h - 1 - dy),
            Transform::Rotate90 => (dy, h - 1 - dx),
            Transform::Rotate180 => (w - 1 - dx, h - 1 - dy),
            Transform::Rotate270 => (w - 1 - dy, dx),
            Transform::Transpose => (dy, dx),
            Transform::Transverse => (w - 1 - dy, h - 1 - dx),
        }
    };

    let pixels = match &buffer.pixels {
        PixelData::Rgb8(p) => PixelData::Rgb8(remap(p, w, dst_w, dst_h, source_of)),
        PixelData::Rgb16(p) => PixelData::Rgb16(remap(p, w, dst_w, dst_h, source_of)),
    };

    ImageBuffer {
        width: dst_w as u32,
        height: dst_h as u32,
        pixels,
    }
}

/// Rebuild a row-major RGB plane by reading each destination pixel from the
/// source position given by `source_of`.
fn remap<T: Copy>(
    pixels: &[T],
    src_width: usize,
    dst_w: usize,
    dst_h: usize,
    source_of: impl Fn(usize, usize) -> (usize, usize),
) -> Vec<T> {
    let mut out = Vec::with_capacity(dst_w * dst_h * 3);
    for dy in 0..dst_h {
        for dx in 0..dst_w {
            let (sx, sy) = source_of(dx, dy);
            let idx = (sy * src_width + sx) * 3;
            out.extend_from_slice(&pixels[idx..idx + 3]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 3x2 test buffer where each pixel encodes its position.
    fn test_buffer() -> ImageBuffer {
        let mut pixels = Vec::new();
        for y in 0..2u8 {
            for x in 0..3u8 {
                pixels.extend_from_slice(&[x, y, 0]);
            }
        }
        ImageBuffer::new_rgb8(3, 2, pixels)
    }

    fn pixel_at(buf: &ImageBuffer, x: u32, y: u32) -> [u8; 3] {
        match &buf.pixels {
            PixelData::Rgb8(p) => {
                let idx = ((y * buf.width + x) * 3) as usize;
                [p[idx], p[idx + 1], p[idx + 2]]
            }
            _ => panic!("expected 8-bit pixels"),
        }
    }

    fn all_orientations() -> [Orientation; 8] {
        [
            Orientation::Normal,
            Orientation::FlipHorizontal,
            Orientation::Rotate180,
            Orientation::FlipVertical,
            Orientation::Transpose,
            Orientation::Rotate90CW,
            Orientation::Transverse,
            Orientation::Rotate270CW,
        ]
    }

    #[test]
    fn test_normal_is_identity() {
        let buf = test_buffer();
        assert_eq!(apply_orientation(&buf, Orientation::Normal), buf);
        assert_eq!(reverse_orientation(&buf, Orientation::Normal), buf);
    }

    #[test]
    fn test_rotate90_moves_corner() {
        let buf = test_buffer();
        let rotated = apply_orientation(&buf, Orientation::Rotate90CW);
        // Dimensions swap
        assert_eq!((rotated.width, rotated.height), (2, 3));
        // Source (0, 0) lands at the top-right corner after a CW rotation
        assert_eq!(pixel_at(&rotated, 1, 0), [0, 0, 0]);
        // Source (0, 1) (bottom-left) lands at top-left
        assert_eq!(pixel_at(&rotated, 0, 0), [0, 1, 0]);
    }

    #[test]
    fn test_flip_horizontal() {
        let buf = test_buffer();
        let flipped = apply_orientation(&buf, Orientation::FlipHorizontal);
        assert_eq!(pixel_at(&flipped, 0, 0), [2, 0, 0]);
        assert_eq!(pixel_at(&flipped, 2, 0), [0, 0, 0]);
    }

    #[test]
    fn test_transpose_is_self_inverse() {
        let buf = test_buffer();
        let once = apply_orientation(&buf, Orientation::Transpose);
        let twice = apply_orientation(&once, Orientation::Transpose);
        assert_eq!(twice, buf);
    }

    #[test]
    fn test_reverse_undoes_apply_for_all_codes() {
        let buf = test_buffer();
        for orientation in all_orientations() {
            let display = apply_orientation(&buf, orientation);
            let sensor = reverse_orientation(&display, orientation);
            assert_eq!(sensor, buf, "round-trip failed for {orientation:?}");
        }
    }

    #[test]
    fn test_apply_undoes_reverse_for_all_codes() {
        let buf = test_buffer();
        for orientation in all_orientations() {
            let sensor = reverse_orientation(&buf, orientation);
            let display = apply_orientation(&sensor, orientation);
            assert_eq!(display, buf, "round-trip failed for {orientation:?}");
        }
    }

    #[test]
    fn test_16bit_round_trip() {
        let pixels: Vec<u16> = (0..3 * 2 * 3).map(|v| v as u16 * 257).collect();
        let buf = ImageBuffer::new_rgb16(3, 2, pixels);
        let display = apply_orientation(&buf, Orientation::Transverse);
        assert_eq!(reverse_orientation(&display, Orientation::Transverse), buf);
    }
}

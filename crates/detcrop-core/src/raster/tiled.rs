//! Tiled-Oriented (HEIF family) crop support.
//!
//! The container library is an external collaborator behind the
//! [`TiledCodec`] trait: its decoder hands back pixels *already rotated
//! into display orientation* per the embedded orientation tag, and its
//! encoder re-applies that tag on load. Cropping therefore happens in
//! display coordinates (matching what the user sees), after which the
//! cropped buffer must be returned to sensor orientation before encoding —
//! otherwise every downstream viewer applies the tag a second time and the
//! output comes out rotated.

use std::path::Path;

use tracing::warn;

use crate::geometry::Rect;

use super::exif_edit::update_exif_dimensions;
use super::orient::reverse_orientation;
use super::types::{DecodeError, ImageBuffer, MetadataBundle};

/// A decoded tiled-container image: display-oriented pixels plus the
/// container metadata (with the orientation tag that was applied).
#[derive(Debug, Clone)]
pub struct TiledImage {
    /// Pixels in display orientation.
    pub buffer: ImageBuffer,
    /// Container metadata; `orientation` is the embedded tag.
    pub meta: MetadataBundle,
}

/// Contract for the tiled-container codec (e.g. a HEIF library binding).
///
/// Implementations own any process-wide library registration; [`init`]
/// must be safe to call more than once.
///
/// [`init`]: TiledCodec::init
pub trait TiledCodec {
    /// One-time, idempotent library initialization. Invoked by the host
    /// during startup; the default is a no-op.
    fn init(&self) {}

    /// Decode a container file into a display-oriented image.
    fn decode(&self, path: &Path) -> Result<TiledImage, DecodeError>;

    /// Encode sensor-oriented pixels with the given metadata.
    ///
    /// The metadata's orientation tag and all non-dimension fields must be
    /// written through unchanged.
    fn encode(
        &self,
        buffer: &ImageBuffer,
        meta: &MetadataBundle,
        path: &Path,
    ) -> Result<(), DecodeError>;
}

/// Crop a display-oriented tiled image and prepare it for re-encoding.
///
/// Returns the cropped buffer in *sensor* orientation together with the
/// metadata to encode: EXIF pixel dimensions rewritten to the encoded
/// (sensor-oriented) crop size, everything else byte-identical.
///
/// Returns `None` when `rect` does not intersect the image.
pub fn crop_for_encode(
    image: &TiledImage,
    rect: &Rect,
) -> Option<(ImageBuffer, MetadataBundle)> {
    let cropped = image.buffer.crop(rect)?;
    let sensor = reverse_orientation(&cropped, image.meta.orientation);

    let mut meta = image.meta.clone();
    if let Some(exif) = &meta.exif {
        match update_exif_dimensions(exif, sensor.width, sensor.height) {
            Ok(updated) => meta.exif = Some(updated),
            Err(e) => {
                // Carry the block through unchanged rather than dropping it
                warn!("tiled: could not rewrite EXIF dimensions: {e}");
            }
        }
    }

    Some((sensor, meta))
}


#[cfg(test)]
mod tests {
    use super::testing::MemoryCodec;
    use super::*;
    use crate::raster::orient::apply_orientation;
    use crate::raster::types::Orientation;
    use std::path::PathBuf;

    /// 4x3 sensor buffer with position-coded pixels.
    fn sensor_buffer() -> ImageBuffer {
        let mut pixels = Vec::new();
        for y in 0..3u8 {
            for x in 0..4u8 {
                pixels.extend_from_slice(&[x, y, 100]);
            }
        }
        ImageBuffer::new_rgb8(4, 3, pixels)
    }

    fn tiled_image(orientation: Orientation) -> TiledImage {
        let sensor = sensor_buffer();
        TiledImage {
            buffer: apply_orientation(&sensor, orientation),
            meta: MetadataBundle {
                orientation,
                chroma: Some("420".to_string()),
                bit_depth: 10,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_normal_orientation_crop_is_direct() {
        // Spec property: orientation 1 means the encoded bytes match a
        // direct crop of the display buffer
        let image = tiled_image(Orientation::Normal);
        let rect = Rect::new(1, 1, 2, 2);

        let (sensor, _) = crop_for_encode(&image, &rect).unwrap();
        let direct = image.buffer.crop(&rect).unwrap();
        assert_eq!(sensor, direct);
    }

    #[test]
    fn test_rotated_crop_round_trips_through_codec() {
        for orientation in [
            Orientation::FlipHorizontal,
            Orientation::Rotate90CW,
            Orientation::Rotate270CW,
            Orientation::Transverse,
        ] {
            let image = tiled_image(orientation);
            let rect = Rect::new(0, 0, 2, 2);

            let display_crop = image.buffer.crop(&rect).unwrap();
            let (sensor, meta) = crop_for_encode(&image, &rect).unwrap();

            // Store and re-decode through the codec double: the decoder
            // re-applies the tag, which must reproduce the display crop
            let codec = MemoryCodec::default();
            let path = PathBuf::from("mem://crop.heic");
            codec.encode(&sensor, &meta, &path).unwrap();
            let reloaded = codec.decode(&path).unwrap();
            assert_eq!(
                reloaded.buffer, display_crop,
                "viewer-visible crop mismatch for {orientation:?}"
            );
        }
    }

    #[test]
    fn test_metadata_carried_through() {
        let image = tiled_image(Orientation::Rotate90CW);
        let (_, meta) = crop_for_encode(&image, &Rect::new(0, 0, 2, 2)).unwrap();
        assert_eq!(meta.orientation, Orientation::Rotate90CW);
        assert_eq!(meta.chroma.as_deref(), Some("420"));
        assert_eq!(meta.bit_depth, 10);
    }

    #[test]
    fn test_crop_outside_image_is_none() {
        let image = tiled_image(Orientation::Normal);
        assert!(crop_for_encode(&image, &Rect::new(50, 50, 2, 2)).is_none());
    }

    #[test]
    fn test_init_is_callable_repeatedly() {
        let codec = MemoryCodec::default();
        codec.init();
        codec.init();
        assert_eq!(codec.init_calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }
}

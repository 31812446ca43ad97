//! The model contract and the caller-facing detection entry point.

use image::imageops::FilterType;
use tracing::debug;

use crate::detect::decode::{decode_output, DecodeContext};
use crate::detect::labels::ClassNames;
use crate::detect::types::{DetectError, Detection, ModelOutput};
use crate::raster::ImageBuffer;

/// Contract for the detection model collaborator.
///
/// Implementations wrap whatever inference runtime hosts the network; the
/// pipeline only needs the input geometry, the label table, and a way to
/// run a CHW-normalized `[1, 3, H, W]` tensor through it.
pub trait Model {
    /// Width of the model's input tensor, in pixels.
    fn input_width(&self) -> u32;

    /// Height of the model's input tensor, in pixels.
    fn input_height(&self) -> u32;

    /// The class-id → name table embedded in the model metadata.
    fn class_names(&self) -> &ClassNames;

    /// Run inference over a preprocessed input tensor.
    fn infer(&self, input: &[f32]) -> Result<ModelOutput, DetectError>;
}

/// Prepare an image for inference: reduce to 8-bit, resize to the model
/// input size, normalize to [0, 1], and reorder HWC → CHW with a leading
/// batch dimension.
pub fn preprocess(image: &ImageBuffer, model_width: u32, model_height: u32) -> Vec<f32> {
    let rgb = image.to_rgb8();
    let resized = match rgb.to_rgb_image() {
        Some(img) => image::imageops::resize(&img, model_width, model_height, FilterType::Triangle),
        None => image::RgbImage::new(model_width, model_height),
    };

    let (w, h) = (model_width as usize, model_height as usize);
    let plane = w * h;
    let mut tensor = vec![0.0f32; 3 * plane];
    for (i, pixel) in resized.pixels().enumerate() {
        for c in 0..3 {
            tensor[c * plane + i] = pixel.0[c] as f32 / 255.0;
        }
    }
    tensor
}

/// Run the full detection pipeline over an image: preprocess, infer, and
/// decode the output back into original-image pixel coordinates.
pub fn detect<M: Model + ?Sized>(
    model: &M,
    image: &ImageBuffer,
    confidence_threshold: f32,
    nms_threshold: f32,
) -> Result<Vec<Detection>, DetectError> {
    let input = preprocess(image, model.input_width(), model.input_height());
    let output = model.infer(&input)?;
    debug!(shape = ?output.shape, "detect: inference complete");

    let ctx = DecodeContext {
        model_width: model.input_width(),
        model_height: model.input_height(),
        image_width: image.width,
        image_height: image.height,
        class_names: model.class_names(),
    };
    decode_output(&output, &ctx, confidence_threshold, nms_threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;

    /// A model double that records its input and returns a fixed tensor.
    struct StubModel {
        names: ClassNames,
        output: ModelOutput,
    }

    impl Model for StubModel {
        fn input_width(&self) -> u32 {
            640
        }

        fn input_height(&self) -> u32 {
            640
        }

        fn class_names(&self) -> &ClassNames {
            &self.names
        }

        fn infer(&self, input: &[f32]) -> Result<ModelOutput, DetectError> {
            assert_eq!(input.len(), 3 * 640 * 640);
            Ok(self.output.clone())
        }
    }

    fn gradient_image(width: u32, height: u32) -> ImageBuffer {
        let mut pixels = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push((x % 256) as u8);
                pixels.push((y % 256) as u8);
                pixels.push(128);
            }
        }
        ImageBuffer::new_rgb8(width, height, pixels)
    }

    #[test]
    fn test_preprocess_shape_and_range() {
        let image = gradient_image(100, 80);
        let tensor = preprocess(&image, 640, 640);
        assert_eq!(tensor.len(), 3 * 640 * 640);
        assert!(tensor.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_preprocess_is_channel_planar() {
        // A solid-color image must produce three constant planes.
        let pixels = vec![255u8, 0, 128]
            .into_iter()
            .cycle()
            .take(10 * 10 * 3)
            .collect();
        let image = ImageBuffer::new_rgb8(10, 10, pixels);
        let tensor = preprocess(&image, 4, 4);

        let plane = 16;
        assert!(tensor[..plane].iter().all(|&v| (v - 1.0).abs() < 1e-6));
        assert!(tensor[plane..2 * plane].iter().all(|&v| v.abs() < 1e-6));
        assert!(tensor[2 * plane..]
            .iter()
            .all(|&v| (v - 128.0 / 255.0).abs() < 1e-2));
    }

    #[test]
    fn test_detect_end_to_end_with_stub() {
        // One proposal at model center, mapped back to a 1280x960 image.
        let proposals = 1;
        let mut data = vec![0.0f32; 5 * proposals];
        data[0] = 320.0; // cx
        data[proposals] = 320.0; // cy
        data[2 * proposals] = 100.0; // w
        data[3 * proposals] = 100.0; // h
        data[4 * proposals] = 0.9; // score, class 0

        let model = StubModel {
            names: ClassNames::parse("{0: 'Fish'}"),
            output: ModelOutput::new(vec![1, 5, proposals], data),
        };
        let image = gradient_image(1280, 960);

        let dets = detect(&model, &image, 0.5, 0.45).unwrap();
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].rect, Rect::new(540, 405, 200, 150));
        assert_eq!(dets[0].class_name, "Fish");
    }

    #[test]
    fn test_detect_propagates_infer_error() {
        struct FailingModel(ClassNames);
        impl Model for FailingModel {
            fn input_width(&self) -> u32 {
                64
            }
            fn input_height(&self) -> u32 {
                64
            }
            fn class_names(&self) -> &ClassNames {
                &self.0
            }
            fn infer(&self, _input: &[f32]) -> Result<ModelOutput, DetectError> {
                Err(DetectError::Infer("session died".to_string()))
            }
        }

        let model = FailingModel(ClassNames::empty());
        let image = gradient_image(32, 32);
        let err = detect(&model, &image, 0.5, 0.45).unwrap_err();
        assert!(matches!(err, DetectError::Infer(_)));
    }
}

//! Image/tensor conversion for segmentation inference
//!
//! Forward path: aspect-preserving resize onto a padded square canvas,
//! normalized into an NCHW tensor. Reverse path: map the mask tensor back to
//! the original resolution and apply it as the alpha channel.

use crate::error::{BgServeError, Result};
use crate::models::PreprocessingConfig;
use image::{DynamicImage, ImageBuffer, RgbImage, RgbaImage};
use ndarray::Array4;

/// Padding color for the canvas outside the resized image
const PADDING_COLOR: [u8; 3] = [255, 255, 255];

/// Mapping between original image coordinates and mask tensor coordinates
#[derive(Debug, Clone, Copy)]
struct CoordinateTransformation {
    scale: f32,
    offset_x: u32,
    offset_y: u32,
    mask_width: u32,
    mask_height: u32,
}

/// Convert an image into a normalized NCHW tensor for model input
///
/// # Errors
/// - Degenerate input dimensions (zero width or height)
pub fn image_to_tensor(
    image: &DynamicImage,
    config: &PreprocessingConfig,
) -> Result<Array4<f32>> {
    let target_size = config.target_size[0];

    let rgb_image = image.to_rgb8();
    let (orig_width, orig_height) = rgb_image.dimensions();
    if orig_width == 0 || orig_height == 0 {
        return Err(BgServeError::processing("input image has zero dimensions"));
    }

    let scale = scale_factor(target_size, orig_width, orig_height);
    let new_width = ((orig_width as f32) * scale).round() as u32;
    let new_height = ((orig_height as f32) * scale).round() as u32;

    let resized = image::imageops::resize(
        &rgb_image,
        new_width.max(1),
        new_height.max(1),
        image::imageops::FilterType::Triangle,
    );

    // Center the resized image on a padded square canvas
    let mut canvas = ImageBuffer::from_pixel(target_size, target_size, image::Rgb(PADDING_COLOR));
    let offset_x = (target_size - new_width.min(target_size)) / 2;
    let offset_y = (target_size - new_height.min(target_size)) / 2;
    for (x, y, pixel) in resized.enumerate_pixels() {
        let canvas_x = x + offset_x;
        let canvas_y = y + offset_y;
        if canvas_x < target_size && canvas_y < target_size {
            canvas.put_pixel(canvas_x, canvas_y, *pixel);
        }
    }

    Ok(canvas_to_tensor(&canvas, config, target_size as usize))
}

/// Convert a canvas to a normalized NCHW tensor
fn canvas_to_tensor(
    canvas: &RgbImage,
    config: &PreprocessingConfig,
    target_size: usize,
) -> Array4<f32> {
    let mut tensor = Array4::<f32>::zeros((1, 3, target_size, target_size));

    for (y, row) in canvas.rows().enumerate() {
        for (x, pixel) in row.enumerate() {
            for channel in 0..3 {
                let normalized = (f32::from(pixel[channel]) / 255.0
                    - config.normalization_mean[channel])
                    / config.normalization_std[channel];
                if let Some(elem) = tensor.get_mut([0, channel, y, x]) {
                    *elem = normalized;
                }
            }
        }
    }

    tensor
}

/// Apply a mask tensor as the alpha channel of the original image
///
/// The tensor is mapped back through the inverse of the preprocessing
/// transform, so the result has the original image's dimensions.
///
/// # Errors
/// - Mask tensor is not shaped `(1, 1, h, w)`
pub fn apply_alpha_mask(image: &DynamicImage, mask_tensor: &Array4<f32>) -> Result<RgbaImage> {
    validate_mask_shape(mask_tensor)?;

    let rgba_image = image.to_rgba8();
    let (width, height) = rgba_image.dimensions();
    let transformation = inverse_transformation(mask_tensor, (width, height));

    let mut result = ImageBuffer::new(width, height);
    for (x, y, pixel) in rgba_image.enumerate_pixels() {
        let mask_value = mask_value_at(mask_tensor, x, y, &transformation);
        let alpha = (mask_value.clamp(0.0, 1.0) * 255.0) as u8;
        if alpha > 0 {
            result.put_pixel(x, y, image::Rgba([pixel[0], pixel[1], pixel[2], alpha]));
        } else {
            result.put_pixel(x, y, image::Rgba([0, 0, 0, 0]));
        }
    }

    Ok(result)
}

fn validate_mask_shape(tensor: &Array4<f32>) -> Result<()> {
    let shape = tensor.shape();
    if shape.first().copied().unwrap_or(0) != 1 || shape.get(1).copied().unwrap_or(0) != 1 {
        return Err(BgServeError::processing(format!(
            "invalid mask tensor shape {shape:?}, expected (1, 1, h, w)"
        )));
    }
    Ok(())
}

/// Reproduce the preprocessing geometry to map original pixels to the mask
fn inverse_transformation(
    tensor: &Array4<f32>,
    original_dimensions: (u32, u32),
) -> CoordinateTransformation {
    let shape = tensor.shape();
    let mask_height = shape.get(2).copied().unwrap_or(0) as u32;
    let mask_width = shape.get(3).copied().unwrap_or(0) as u32;
    let (orig_width, orig_height) = original_dimensions;

    // Square tensor assumed, as produced by image_to_tensor
    let target_size = mask_width;
    let scale = scale_factor(target_size, orig_width, orig_height);
    let scaled_width = ((orig_width as f32) * scale).round() as u32;
    let scaled_height = ((orig_height as f32) * scale).round() as u32;

    CoordinateTransformation {
        scale,
        offset_x: (target_size - scaled_width.min(target_size)) / 2,
        offset_y: (target_size - scaled_height.min(target_size)) / 2,
        mask_width,
        mask_height,
    }
}

fn mask_value_at(
    tensor: &Array4<f32>,
    x: u32,
    y: u32,
    transformation: &CoordinateTransformation,
) -> f32 {
    let tensor_x = ((x as f32) * transformation.scale).round() as u32 + transformation.offset_x;
    let tensor_y = ((y as f32) * transformation.scale).round() as u32 + transformation.offset_y;

    if tensor_x < transformation.mask_width && tensor_y < transformation.mask_height {
        tensor
            .get([0, 0, tensor_y as usize, tensor_x as usize])
            .copied()
            .unwrap_or(0.0)
    } else {
        // Outside the model's prediction area
        0.0
    }
}

fn scale_factor(target_size: u32, orig_width: u32, orig_height: u32) -> f32 {
    let target = target_size as f32;
    (target / orig_width as f32).min(target / orig_height as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(target: u32) -> PreprocessingConfig {
        PreprocessingConfig {
            target_size: [target, target],
            normalization_mean: [0.5, 0.5, 0.5],
            normalization_std: [1.0, 1.0, 1.0],
        }
    }

    #[test]
    fn test_tensor_shape_matches_target() {
        let image = DynamicImage::new_rgb8(64, 32);
        let tensor = image_to_tensor(&image, &test_config(32)).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 32, 32]);
    }

    #[test]
    fn test_normalization_values() {
        // A solid white image normalized with mean 0.5 / std 1.0 is 0.5
        let white = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(
            16,
            16,
            image::Rgb([255u8, 255, 255]),
        ));
        let tensor = image_to_tensor(&white, &test_config(16)).unwrap();
        let value = tensor[[0, 0, 8, 8]];
        assert!((value - 0.5).abs() < 1e-6, "got {value}");
    }

    #[test]
    fn test_non_square_input_is_padded() {
        // A 64x32 black image on target 32: top and bottom rows are padding
        let black = DynamicImage::new_rgb8(64, 32);
        let tensor = image_to_tensor(&black, &test_config(32)).unwrap();
        // Padding row (white): 255/255 - 0.5 = 0.5
        assert!((tensor[[0, 0, 0, 0]] - 0.5).abs() < 1e-6);
        // Image row (black): 0 - 0.5 = -0.5
        assert!((tensor[[0, 0, 16, 16]] + 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_full_mask_keeps_every_pixel_opaque() {
        let image = DynamicImage::new_rgb8(24, 24);
        let mask = Array4::<f32>::ones((1, 1, 24, 24));
        let result = apply_alpha_mask(&image, &mask).unwrap();
        assert_eq!(result.dimensions(), (24, 24));
        assert!(result.pixels().all(|p| p[3] == 255));
    }

    #[test]
    fn test_zero_mask_clears_every_pixel() {
        let image = DynamicImage::new_rgb8(24, 16);
        let mask = Array4::<f32>::zeros((1, 1, 32, 32));
        let result = apply_alpha_mask(&image, &mask).unwrap();
        assert_eq!(result.dimensions(), (24, 16));
        assert!(result.pixels().all(|p| p[3] == 0));
    }

    #[test]
    fn test_result_keeps_original_dimensions() {
        let image = DynamicImage::new_rgb8(50, 70);
        let mask = Array4::<f32>::ones((1, 1, 32, 32));
        let result = apply_alpha_mask(&image, &mask).unwrap();
        assert_eq!(result.dimensions(), (50, 70));
    }

    #[test]
    fn test_bad_mask_shape_is_rejected() {
        let image = DynamicImage::new_rgb8(8, 8);
        let mask = Array4::<f32>::zeros((1, 3, 8, 8));
        assert!(apply_alpha_mask(&image, &mask).is_err());
    }
}

//! Image saving utilities.

use std::path::Path;

use image::{DynamicImage, ImageBuffer, Rgb, RgbImage};

use crate::error::{Error, Result};

use super::{ImageTensor, RGB_CHANNELS};

/// Save a normalized tensor as an image file.
///
/// The tensor is:
/// 1. Denormalized from [-1, 1] to [0, 255]
/// 2. Saved to the specified path (format inferred from extension)
///
/// # Arguments
///
/// * `tensor` - CHW tensor with values in [-1, 1]
/// * `path` - Output file path
/// * `quality` - JPEG quality (1-100), ignored for other formats
///
/// # Errors
///
/// Returns an error if the tensor is not 3-channel or the image cannot be saved.
pub fn save_image<P: AsRef<Path>>(tensor: &ImageTensor, path: P, quality: u8) -> Result<()> {
    let path = path.as_ref();

    let channels = tensor.shape()[0];
    if channels != RGB_CHANNELS {
        return Err(Error::InvalidParameter {
            name: "tensor".to_string(),
            reason: format!("expected {RGB_CHANNELS} channels, got {channels}"),
        });
    }

    let img = DynamicImage::ImageRgb8(tensor_to_image(tensor));

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("png")
        .to_lowercase();

    match extension.as_str() {
        "jpg" | "jpeg" => {
            let mut output = std::fs::File::create(path)?;
            let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut output, quality);
            img.write_with_encoder(encoder)
                .map_err(|source| Error::ImageSave {
                    path: path.to_path_buf(),
                    source,
                })?;
        }
        _ => {
            img.save(path).map_err(|source| Error::ImageSave {
                path: path.to_path_buf(),
                source,
            })?;
        }
    }

    Ok(())
}

/// Convert a normalized CHW tensor to an RGB image.
#[allow(clippy::cast_possible_truncation)]
fn tensor_to_image(tensor: &ImageTensor) -> RgbImage {
    let (_, height, width) = tensor.dim();

    // Safe: the tensor came from a u32-sized image
    ImageBuffer::from_fn(width as u32, height as u32, |x, y| {
        let (x, y) = (x as usize, y as usize);
        Rgb([
            denormalize(tensor[[0, y, x]]),
            denormalize(tensor[[1, y, x]]),
            denormalize(tensor[[2, y, x]]),
        ])
    })
}

/// Denormalize a value from [-1, 1] to [0, 255] with clamping.
#[inline]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn denormalize(value: f32) -> u8 {
    // Safe: clamped to [0, 255] range before casting
    let scaled = (value + 1.0) * 127.5;
    scaled.round().clamp(0.0, 255.0) as u8
}

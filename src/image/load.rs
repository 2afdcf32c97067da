//! Image loading utilities.

use std::io::ErrorKind;
use std::path::Path;

use image::{ImageError, RgbImage};
use ndarray::Array3;

use crate::error::{Error, Result};

use super::{ImageTensor, RGB_CHANNELS};

/// Load an image from disk and convert it to 8-bit RGB.
///
/// Grayscale, alpha and 16-bit inputs are all flattened to three 8-bit channels.
///
/// # Errors
///
/// Returns [`Error::ImageNotFound`] if the file does not exist and
/// [`Error::ImageLoad`] if it cannot be read or decoded.
pub fn load_rgb<P: AsRef<Path>>(path: P) -> Result<RgbImage> {
    let path = path.as_ref();

    let img = image::open(path).map_err(|source| match source {
        ImageError::IoError(ref err) if err.kind() == ErrorKind::NotFound => {
            Error::ImageNotFound {
                path: path.to_path_buf(),
            }
        }
        source => Error::ImageLoad {
            path: path.to_path_buf(),
            source,
        },
    })?;

    Ok(img.to_rgb8())
}

/// Convert an RGB image to a CHW tensor with values scaled to [0, 1].
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn rgb_to_tensor(img: &RgbImage) -> ImageTensor {
    let (width, height) = img.dimensions();

    // Safe: indices are bounded by the image dimensions, which are u32
    Array3::from_shape_fn(
        (RGB_CHANNELS, height as usize, width as usize),
        |(c, y, x)| f32::from(img.get_pixel(x as u32, y as u32)[c]) / 255.0,
    )
}

//! Image loading, preprocessing, and saving utilities.

mod load;
mod save;
pub mod transform;

pub use load::{load_rgb, rgb_to_tensor};
pub use save::save_image;
pub use transform::{Draw, Pipeline, PixelStage, TensorStage};

use ndarray::Array3;

/// Image tensor in CHW format (channels, height, width).
pub type ImageTensor = Array3<f32>;

/// Number of channels in RGB images.
pub const RGB_CHANNELS: usize = 3;

/// Extensions recognized as images, matched case-insensitively on the file name suffix.
pub const IMAGE_EXTENSIONS: [&str; 4] = [".png", ".jpg", ".jpeg", ".bmp"];

/// Whether `filename` looks like an image we can load.
///
/// Only the suffix is inspected; the file content is never sniffed.
#[must_use]
pub fn is_image_file(filename: &str) -> bool {
    let lower = filename.to_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

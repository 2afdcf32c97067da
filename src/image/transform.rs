//! Preprocessing pipelines applied to each half of a pair.
//!
//! A [`Pipeline`] is an ordered list of [`PixelStage`]s run on the decoded RGB
//! image, an implicit conversion to a `[0, 1]` CHW tensor, and an ordered list
//! of [`TensorStage`]s run on that tensor. Stochastic stages never touch an RNG
//! while transforming: their decisions are sampled up front into a [`Draw`],
//! so the same draw applied to two images transforms both identically.

use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::{s, Array3, Axis};
use rand::Rng;

use crate::dataset::{DatasetConfig, Mode};
use crate::error::{Error, Result};

use super::{rgb_to_tensor, ImageTensor};

/// Per-channel mean used by every mode, maps [0, 1] onto [-1, 1] together with [`NORMALIZE_STD`].
pub const NORMALIZE_MEAN: [f32; 3] = [0.5, 0.5, 0.5];

/// Per-channel standard deviation used by every mode.
pub const NORMALIZE_STD: [f32; 3] = [0.5, 0.5, 0.5];

/// A stage operating on 8-bit RGB pixels.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelStage {
    /// Bilinear resize to exactly `width` x `height`.
    Resize { width: u32, height: u32 },
    /// Mirror left/right with probability `p`.
    RandomHorizontalFlip { p: f64 },
}

impl PixelStage {
    /// Sample this stage's decision. Deterministic stages always yield `false`.
    fn draw<R: Rng>(&self, rng: &mut R) -> bool {
        match *self {
            Self::Resize { .. } => false,
            Self::RandomHorizontalFlip { p } => rng.random_bool(p),
        }
    }

    /// Apply the stage with an already sampled decision.
    #[must_use]
    pub fn apply(&self, img: RgbImage, fire: bool) -> RgbImage {
        match *self {
            Self::Resize { width, height } => {
                if img.dimensions() == (width, height) {
                    img
                } else {
                    // Triangle is the bilinear filter
                    imageops::resize(&img, width, height, FilterType::Triangle)
                }
            }
            Self::RandomHorizontalFlip { .. } => {
                if fire {
                    imageops::flip_horizontal(&img)
                } else {
                    img
                }
            }
        }
    }

    fn validate(&self) -> Result<()> {
        match *self {
            Self::Resize { width, height } if width == 0 || height == 0 => {
                Err(Error::InvalidParameter {
                    name: "resize".to_string(),
                    reason: format!("dimensions must be non-zero, got {width}x{height}"),
                })
            }
            Self::RandomHorizontalFlip { p } if !(0.0..=1.0).contains(&p) => {
                Err(Error::InvalidParameter {
                    name: "flip_probability".to_string(),
                    reason: "must be between 0.0 and 1.0".to_string(),
                })
            }
            _ => Ok(()),
        }
    }
}

/// A stage operating on a CHW float tensor.
#[derive(Debug, Clone, PartialEq)]
pub enum TensorStage {
    /// Crop a `size` x `size` window from the center, zero padding if the input is smaller.
    CenterCrop { size: u32 },
    /// `(v - mean[c]) / std[c]` for each channel `c`.
    Normalize { mean: [f32; 3], std: [f32; 3] },
}

impl TensorStage {
    /// Apply the stage.
    #[must_use]
    pub fn apply(&self, tensor: ImageTensor) -> ImageTensor {
        match self {
            Self::CenterCrop { size } => {
                let size = *size as usize;
                center_crop(tensor, size, size)
            }
            Self::Normalize { mean, std } => normalize(tensor, mean, std),
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            Self::CenterCrop { size: 0 } => Err(Error::InvalidParameter {
                name: "crop".to_string(),
                reason: "must be greater than 0".to_string(),
            }),
            Self::Normalize { std, .. } if std.iter().any(|&s| s == 0.0) => {
                Err(Error::InvalidParameter {
                    name: "std".to_string(),
                    reason: "must be non-zero for every channel".to_string(),
                })
            }
            _ => Ok(()),
        }
    }
}

/// Random decisions for one application of a [`Pipeline`], one per pixel stage.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Draw {
    decisions: Vec<bool>,
}

impl Draw {
    /// Whether the stage at `index` fires. Missing entries never fire.
    #[must_use]
    pub fn fires(&self, index: usize) -> bool {
        self.decisions.get(index).copied().unwrap_or(false)
    }
}

/// Ordered preprocessing stages shared by the source and target images.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    pixel_stages: Vec<PixelStage>,
    tensor_stages: Vec<TensorStage>,
}

impl Pipeline {
    /// Build a pipeline from explicit stages.
    ///
    /// # Errors
    ///
    /// Returns an error if any stage has an out-of-range parameter.
    pub fn new(pixel_stages: Vec<PixelStage>, tensor_stages: Vec<TensorStage>) -> Result<Self> {
        for stage in &pixel_stages {
            stage.validate()?;
        }
        for stage in &tensor_stages {
            stage.validate()?;
        }

        Ok(Self {
            pixel_stages,
            tensor_stages,
        })
    }

    /// The preprocessing used for `mode`:
    ///
    /// | mode  | stages |
    /// |-------|--------|
    /// | train | resize, random horizontal flip, to tensor, normalize |
    /// | valid | resize, to tensor, center crop, normalize |
    /// | test  | to tensor, normalize |
    ///
    /// # Errors
    ///
    /// Returns an error if the configured sizes or probability are out of range.
    pub fn for_mode(mode: Mode, config: &DatasetConfig) -> Result<Self> {
        let resize = PixelStage::Resize {
            width: config.resize,
            height: config.resize,
        };
        let normalize = TensorStage::Normalize {
            mean: NORMALIZE_MEAN,
            std: NORMALIZE_STD,
        };

        match mode {
            Mode::Train => Self::new(
                vec![
                    resize,
                    PixelStage::RandomHorizontalFlip {
                        p: config.flip_probability,
                    },
                ],
                vec![normalize],
            ),
            Mode::Valid => Self::new(
                vec![resize],
                vec![TensorStage::CenterCrop { size: config.crop }, normalize],
            ),
            Mode::Test => Self::new(Vec::new(), vec![normalize]),
        }
    }

    /// Stages applied before tensor conversion.
    #[must_use]
    pub fn pixel_stages(&self) -> &[PixelStage] {
        &self.pixel_stages
    }

    /// Stages applied after tensor conversion.
    #[must_use]
    pub fn tensor_stages(&self) -> &[TensorStage] {
        &self.tensor_stages
    }

    /// Whether any stage depends on a random decision.
    #[must_use]
    pub fn is_stochastic(&self) -> bool {
        self.pixel_stages
            .iter()
            .any(|stage| matches!(stage, PixelStage::RandomHorizontalFlip { .. }))
    }

    /// Sample the decisions for one application.
    pub fn draw<R: Rng>(&self, rng: &mut R) -> Draw {
        Draw {
            decisions: self.pixel_stages.iter().map(|stage| stage.draw(&mut *rng)).collect(),
        }
    }

    /// Run every stage in order. Pure: the same image and draw always give the same tensor.
    #[must_use]
    pub fn apply(&self, img: RgbImage, draw: &Draw) -> ImageTensor {
        let img = self
            .pixel_stages
            .iter()
            .enumerate()
            .fold(img, |img, (i, stage)| stage.apply(img, draw.fires(i)));

        self.tensor_stages
            .iter()
            .fold(rgb_to_tensor(&img), |tensor, stage| stage.apply(tensor))
    }

    /// Spatial `(height, width)` of the output for an input of `width` x `height`.
    #[must_use]
    pub fn output_dims(&self, width: u32, height: u32) -> (usize, usize) {
        let (mut h, mut w) = (height as usize, width as usize);
        for stage in &self.pixel_stages {
            if let PixelStage::Resize { width, height } = *stage {
                (h, w) = (height as usize, width as usize);
            }
        }
        for stage in &self.tensor_stages {
            if let TensorStage::CenterCrop { size } = *stage {
                (h, w) = (size as usize, size as usize);
            }
        }
        (h, w)
    }
}

/// Center crop with half-to-even rounded offsets; smaller inputs are zero padded first.
fn center_crop(tensor: ImageTensor, crop_h: usize, crop_w: usize) -> ImageTensor {
    let (_, h, w) = tensor.dim();
    if (h, w) == (crop_h, crop_w) {
        return tensor;
    }

    let tensor = if h < crop_h || w < crop_w {
        pad(tensor, crop_h.max(h), crop_w.max(w))
    } else {
        tensor
    };

    let (_, h, w) = tensor.dim();
    let top = crop_offset(h - crop_h);
    let left = crop_offset(w - crop_w);

    tensor
        .slice(s![.., top..top + crop_h, left..left + crop_w])
        .to_owned()
}

/// `round(excess / 2)` with ties going to the even neighbour.
fn crop_offset(excess: usize) -> usize {
    let half = excess / 2;
    if excess % 2 == 1 && half % 2 == 1 {
        half + 1
    } else {
        half
    }
}

/// Zero pad to `height` x `width`, putting any odd pixel on the bottom/right.
fn pad(tensor: ImageTensor, height: usize, width: usize) -> ImageTensor {
    let (c, h, w) = tensor.dim();
    let top = (height - h) / 2;
    let left = (width - w) / 2;

    let mut padded = Array3::<f32>::zeros((c, height, width));
    padded
        .slice_mut(s![.., top..top + h, left..left + w])
        .assign(&tensor);
    padded
}

fn normalize(mut tensor: ImageTensor, mean: &[f32; 3], std: &[f32; 3]) -> ImageTensor {
    for (mut plane, (&m, &s)) in tensor
        .axis_iter_mut(Axis(0))
        .zip(mean.iter().zip(std.iter()))
    {
        plane.mapv_inplace(|v| (v - m) / s);
    }
    tensor
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Left half black, right half white.
    fn split_image(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, _| {
            if x < width / 2 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        })
    }

    fn small_config() -> DatasetConfig {
        DatasetConfig {
            resize: 16,
            crop: 8,
            ..DatasetConfig::default()
        }
    }

    #[test]
    fn test_default_output_dims() {
        let config = DatasetConfig::default();

        let train = Pipeline::for_mode(Mode::Train, &config).unwrap();
        let valid = Pipeline::for_mode(Mode::Valid, &config).unwrap();
        let test = Pipeline::for_mode(Mode::Test, &config).unwrap();

        assert_eq!(train.output_dims(640, 480), (3840, 3840));
        assert_eq!(valid.output_dims(640, 480), (2048, 2048));
        assert_eq!(test.output_dims(640, 480), (480, 640));
    }

    #[test]
    fn test_mode_stage_order() {
        let config = DatasetConfig::default();

        let valid = Pipeline::for_mode(Mode::Valid, &config).unwrap();
        assert_eq!(
            valid.pixel_stages(),
            &[PixelStage::Resize {
                width: 3840,
                height: 3840
            }]
        );
        assert_eq!(valid.tensor_stages()[0], TensorStage::CenterCrop { size: 2048 });
        assert!(!valid.is_stochastic());

        let train = Pipeline::for_mode(Mode::Train, &config).unwrap();
        assert!(train.is_stochastic());
        assert_eq!(train.tensor_stages().len(), 1);

        let test = Pipeline::for_mode(Mode::Test, &config).unwrap();
        assert!(test.pixel_stages().is_empty());
    }

    #[test]
    fn test_shapes_match_output_dims() {
        let config = small_config();
        let mut rng = StdRng::seed_from_u64(7);

        for mode in [Mode::Train, Mode::Valid, Mode::Test] {
            let pipeline = Pipeline::for_mode(mode, &config).unwrap();
            let draw = pipeline.draw(&mut rng);
            let tensor = pipeline.apply(split_image(10, 6), &draw);
            let (h, w) = pipeline.output_dims(10, 6);

            assert_eq!(tensor.shape(), &[3, h, w], "mode {mode}");
        }
    }

    #[test]
    fn test_normalized_range() {
        let pipeline = Pipeline::for_mode(Mode::Test, &small_config()).unwrap();
        let tensor = pipeline.apply(split_image(4, 2), &Draw::default());

        let min = tensor.iter().copied().fold(f32::INFINITY, f32::min);
        let max = tensor.iter().copied().fold(f32::NEG_INFINITY, f32::max);

        assert!((min - (-1.0)).abs() < 1e-6);
        assert!((max - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_flip_always_and_never() {
        let config = DatasetConfig {
            flip_probability: 1.0,
            ..small_config()
        };
        let always = Pipeline::for_mode(Mode::Train, &config).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let flipped = always.apply(split_image(16, 16), &always.draw(&mut rng));
        // White moved to the left edge
        assert!((flipped[[0, 0, 0]] - 1.0).abs() < 1e-6);

        let config = DatasetConfig {
            flip_probability: 0.0,
            ..small_config()
        };
        let never = Pipeline::for_mode(Mode::Train, &config).unwrap();
        let kept = never.apply(split_image(16, 16), &never.draw(&mut rng));
        assert!((kept[[0, 0, 0]] - (-1.0)).abs() < 1e-6);
    }

    #[test]
    fn test_shared_draw_transforms_identically() {
        let pipeline = Pipeline::for_mode(Mode::Train, &small_config()).unwrap();
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..20 {
            let draw = pipeline.draw(&mut rng);
            let a = pipeline.apply(split_image(12, 9), &draw);
            let b = pipeline.apply(split_image(12, 9), &draw);
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_center_crop_offsets() {
        // 5 columns -> crop 2: excess 3, offset round(1.5) = 2
        let tensor = Array3::from_shape_fn((1, 1, 5), |(_, _, x)| x as f32);
        let cropped = center_crop(tensor, 1, 2);
        assert_eq!(cropped.iter().copied().collect::<Vec<_>>(), vec![2.0, 3.0]);

        // 7 columns -> crop 2: excess 5, offset round(2.5) = 2
        let tensor = Array3::from_shape_fn((1, 1, 7), |(_, _, x)| x as f32);
        let cropped = center_crop(tensor, 1, 2);
        assert_eq!(cropped.iter().copied().collect::<Vec<_>>(), vec![2.0, 3.0]);
    }

    #[test]
    fn test_center_crop_pads_small_input() {
        let tensor = Array3::<f32>::ones((3, 2, 2));
        let cropped = center_crop(tensor, 4, 5);

        assert_eq!(cropped.shape(), &[3, 4, 5]);
        assert_eq!(cropped[[0, 0, 0]], 0.0);
        assert_eq!(cropped[[0, 1, 1]], 1.0);
        assert_eq!(cropped[[2, 2, 2]], 1.0);
        assert_eq!(cropped[[0, 3, 4]], 0.0);
        assert!((cropped.sum() - 12.0).abs() < 1e-6);
    }

    #[test]
    fn test_crop_offset_ties_to_even() {
        assert_eq!(crop_offset(0), 0);
        assert_eq!(crop_offset(1), 0);
        assert_eq!(crop_offset(3), 2);
        assert_eq!(crop_offset(4), 2);
        assert_eq!(crop_offset(5), 2);
        assert_eq!(crop_offset(1792), 896);
    }

    #[test]
    fn test_invalid_stages_rejected() {
        assert!(Pipeline::new(vec![PixelStage::RandomHorizontalFlip { p: 1.5 }], vec![]).is_err());
        assert!(Pipeline::new(
            vec![PixelStage::Resize {
                width: 0,
                height: 4
            }],
            vec![]
        )
        .is_err());
        assert!(Pipeline::new(vec![], vec![TensorStage::CenterCrop { size: 0 }]).is_err());
    }
}

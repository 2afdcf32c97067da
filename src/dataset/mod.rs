//! Paired hazy/clean image dataset.
//!
//! Expects the layout
//!
//! ```text
//! <data_dir>/<sub_dir>/GT/<name>     clean targets
//! <data_dir>/<sub_dir>/hazy/<name>   degraded sources, same names
//! ```
//!
//! The file list is taken from `GT/` once at construction. Pairs are decoded
//! lazily on every [`PairedImageDataset::get`] and never cached.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::{Error, Result};
use crate::image::{self, is_image_file, Draw, ImageTensor, Pipeline};

/// Directory holding the clean ground-truth images.
pub const GT_DIR: &str = "GT";

/// Directory holding the degraded source images.
pub const HAZY_DIR: &str = "hazy";

/// Default value of the recorded output-size parameter.
pub const DEFAULT_SIZE: u32 = 256;

/// Square resize edge used by the train and valid pipelines.
pub const DEFAULT_RESIZE: u32 = 3840;

/// Center-crop edge used by the valid pipeline.
pub const DEFAULT_CROP: u32 = 2048;

/// Dataset phase, selects the preprocessing pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Resize, random flip, normalize.
    Train,
    /// Resize, center crop, normalize.
    Valid,
    /// Normalize only, original resolution.
    Test,
}

impl Mode {
    /// The tag accepted by [`Mode::from_str`].
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Valid => "valid",
            Self::Test => "test",
        }
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "train" => Ok(Self::Train),
            "valid" => Ok(Self::Valid),
            "test" => Ok(Self::Test),
            other => Err(Error::InvalidMode(other.to_string())),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for a [`PairedImageDataset`].
#[derive(Debug, Clone)]
pub struct DatasetConfig {
    /// Base data directory.
    pub data_dir: PathBuf,

    /// Sub-directory of `data_dir` holding `GT/` and `hazy/`.
    pub sub_dir: String,

    /// Dataset phase.
    pub mode: Mode,

    /// Output size parameter. Recorded only, the mode pipelines use `resize` and `crop`.
    pub size: u32,

    /// Square resize edge for train and valid.
    pub resize: u32,

    /// Center-crop edge for valid.
    pub crop: u32,

    /// Horizontal flip probability for train.
    pub flip_probability: f64,

    /// Random seed for flip decisions. None for OS entropy.
    pub seed: Option<u64>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            sub_dir: "train".to_string(),
            mode: Mode::Train,
            size: DEFAULT_SIZE,
            resize: DEFAULT_RESIZE,
            crop: DEFAULT_CROP,
            flip_probability: 0.5,
            seed: None,
        }
    }
}

impl DatasetConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any parameter is out of valid range.
    pub fn validate(&self) -> Result<()> {
        if self.resize == 0 {
            return Err(Error::InvalidParameter {
                name: "resize".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        if self.crop == 0 {
            return Err(Error::InvalidParameter {
                name: "crop".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        if !(0.0..=1.0).contains(&self.flip_probability) {
            return Err(Error::InvalidParameter {
                name: "flip_probability".to_string(),
                reason: "must be between 0.0 and 1.0".to_string(),
            });
        }

        Ok(())
    }
}

/// One preprocessed pair.
#[derive(Debug, Clone, PartialEq)]
pub struct PairedSample {
    /// Degraded image from `hazy/`, `[3, H, W]` in [-1, 1].
    pub source: ImageTensor,
    /// Clean image from `GT/`, `[3, H, W]` in [-1, 1].
    pub target: ImageTensor,
    /// File name shared by both halves.
    pub filename: String,
}

/// Indexed collection of hazy/clean pairs.
#[derive(Debug)]
pub struct PairedImageDataset {
    root: PathBuf,
    mode: Mode,
    size: u32,
    filenames: Vec<String>,
    pipeline: Pipeline,
    rng: Option<Mutex<StdRng>>,
}

impl PairedImageDataset {
    /// Open `<data_dir>/<sub_dir>` in the given mode with the default size parameter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidMode`] if `mode` is not `train`, `valid` or `test`,
    /// and [`Error::ReadDir`] if the `GT/` directory cannot be listed.
    pub fn new<P: AsRef<Path>>(data_dir: P, sub_dir: &str, mode: &str) -> Result<Self> {
        Self::with_size(data_dir, sub_dir, mode, DEFAULT_SIZE)
    }

    /// Like [`PairedImageDataset::new`] with an explicit size parameter.
    ///
    /// # Errors
    ///
    /// Same as [`PairedImageDataset::new`].
    pub fn with_size<P: AsRef<Path>>(
        data_dir: P,
        sub_dir: &str,
        mode: &str,
        size: u32,
    ) -> Result<Self> {
        let mode = mode.parse()?;

        Self::from_config(DatasetConfig {
            data_dir: data_dir.as_ref().to_path_buf(),
            sub_dir: sub_dir.to_string(),
            mode,
            size,
            ..DatasetConfig::default()
        })
    }

    /// Build a dataset from a full configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the `GT/` directory
    /// cannot be listed.
    pub fn from_config(config: DatasetConfig) -> Result<Self> {
        config.validate()?;

        let pipeline = Pipeline::for_mode(config.mode, &config)?;
        let root = config.data_dir.join(&config.sub_dir);
        let filenames = list_images(&root.join(GT_DIR))?;

        tracing::info!(
            "Loaded {} pairs from {} (mode: {})",
            filenames.len(),
            root.display(),
            config.mode
        );

        Ok(Self {
            root,
            mode: config.mode,
            size: config.size,
            filenames,
            pipeline,
            rng: config.seed.map(|seed| Mutex::new(StdRng::seed_from_u64(seed))),
        })
    }

    /// Number of pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.filenames.len()
    }

    /// Whether the dataset has no pairs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filenames.is_empty()
    }

    /// Load and preprocess the pair at `index`.
    ///
    /// Both images go through the same pipeline with the same random
    /// decisions, so a flip applies to the whole pair or to neither half.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndexOutOfRange`] for `index >= len()`, and
    /// [`Error::ImageNotFound`] or [`Error::ImageLoad`] if either file is
    /// missing or cannot be decoded.
    pub fn get(&self, index: usize) -> Result<PairedSample> {
        let filename = self
            .filenames
            .get(index)
            .ok_or(Error::IndexOutOfRange {
                index,
                len: self.len(),
            })?;

        tracing::debug!("Loading pair {index}: {filename}");

        let source = image::load_rgb(self.root.join(HAZY_DIR).join(filename))?;
        let target = image::load_rgb(self.root.join(GT_DIR).join(filename))?;

        let draw = self.draw();

        Ok(PairedSample {
            source: self.pipeline.apply(source, &draw),
            target: self.pipeline.apply(target, &draw),
            filename: filename.clone(),
        })
    }

    /// Lazily load every pair in order.
    pub fn iter(&self) -> impl Iterator<Item = Result<PairedSample>> + '_ {
        (0..self.len()).map(move |index| self.get(index))
    }

    /// Sorted image file names.
    #[must_use]
    pub fn filenames(&self) -> &[String] {
        &self.filenames
    }

    /// File name of the pair at `index`.
    #[must_use]
    pub fn filename(&self, index: usize) -> Option<&str> {
        self.filenames.get(index).map(String::as_str)
    }

    /// Path of the source image at `index`.
    #[must_use]
    pub fn source_path(&self, index: usize) -> Option<PathBuf> {
        self.filename(index)
            .map(|name| self.root.join(HAZY_DIR).join(name))
    }

    /// Path of the target image at `index`.
    #[must_use]
    pub fn target_path(&self, index: usize) -> Option<PathBuf> {
        self.filename(index).map(|name| self.root.join(GT_DIR).join(name))
    }

    /// Dataset phase.
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Recorded output-size parameter.
    #[must_use]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// `<data_dir>/<sub_dir>`.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Preprocessing applied to both halves of each pair.
    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    fn draw(&self) -> Draw {
        match &self.rng {
            Some(rng) => {
                let mut rng = rng.lock().unwrap_or_else(PoisonError::into_inner);
                self.pipeline.draw(&mut *rng)
            }
            None => self.pipeline.draw(&mut rand::rng()),
        }
    }
}

/// Sorted names of the image files directly inside `dir`.
fn list_images(dir: &Path) -> Result<Vec<String>> {
    let read_err = |source: std::io::Error| Error::ReadDir {
        path: dir.to_path_buf(),
        source,
    };

    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        match entry.file_name().to_str() {
            Some(name) if is_image_file(name) => names.push(name.to_string()),
            Some(_) => {}
            None => tracing::debug!("Skipping non UTF-8 file name {:?}", entry.file_name()),
        }
    }

    names.sort_unstable();
    Ok(names)
}

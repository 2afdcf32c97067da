//! # hazepair
//!
//! Paired-image dataset loading for supervised image restoration (dehazing).
//!
//! Given a directory with `GT/` (clean) and `hazy/` (degraded) images sharing
//! file names, [`PairedImageDataset`] yields both halves of each pair as
//! normalized `[3, H, W]` tensors, preprocessed per [`Mode`].
//!
//! ## Example
//!
//! ```no_run
//! use hazepair::PairedImageDataset;
//!
//! # fn main() -> hazepair::Result<()> {
//! let dataset = PairedImageDataset::new("data", "train", "train")?;
//!
//! for index in 0..dataset.len() {
//!     let sample = dataset.get(index)?;
//!     println!("{}: {:?}", sample.filename, sample.source.shape());
//! }
//! # Ok(())
//! # }
//! ```

pub mod dataset;
pub mod error;
pub mod image;

pub use dataset::{DatasetConfig, Mode, PairedImageDataset, PairedSample};
pub use error::{Error, Result};
pub use crate::image::{is_image_file, ImageTensor, Pipeline};

//! End-to-end checks against a dataset laid out on disk.

use std::fs;
use std::path::Path;

use image::{Rgb, RgbImage};
use tempfile::TempDir;

use hazepair::{DatasetConfig, Error, Mode, PairedImageDataset};

fn write_image(path: &Path, color: [u8; 3]) {
    RgbImage::from_pixel(12, 8, Rgb(color)).save(path).unwrap();
}

/// `data/train/{GT,hazy}/{a.png,b.jpg}`, hazy darker than GT.
fn scenario() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("data").join("train");

    for (sub, color) in [("GT", [200, 180, 160]), ("hazy", [90, 90, 90])] {
        fs::create_dir_all(root.join(sub)).unwrap();
        for name in ["b.jpg", "a.png"] {
            write_image(&root.join(sub).join(name), color);
        }
    }

    dir
}

#[test]
fn train_scenario_lists_both_pairs() {
    let dir = scenario();

    let dataset = PairedImageDataset::new(dir.path().join("data"), "train", "train").unwrap();

    assert_eq!(dataset.len(), 2);
    assert_eq!(dataset.filename(0), Some("a.png"));
    assert_eq!(dataset.filename(1), Some("b.jpg"));
    assert_eq!(dataset.size(), 256);
}

#[test]
fn train_scenario_first_sample() {
    let dir = scenario();
    let config = DatasetConfig {
        data_dir: dir.path().join("data"),
        sub_dir: "train".to_string(),
        mode: Mode::Train,
        resize: 32,
        seed: Some(0),
        ..DatasetConfig::default()
    };

    let dataset = PairedImageDataset::from_config(config).unwrap();
    let sample = dataset.get(0).unwrap();

    assert_eq!(sample.filename, "a.png");
    assert_eq!(sample.source.shape(), &[3, 32, 32]);
    assert_eq!(sample.target.shape(), &[3, 32, 32]);

    // Flat colors survive resize and flip: 90 -> 90/255*2-1, 200 -> 200/255*2-1
    let expect = |v: f32| v / 255.0 * 2.0 - 1.0;
    assert!((sample.source[[0, 5, 5]] - expect(90.0)).abs() < 1e-2);
    assert!((sample.target[[0, 5, 5]] - expect(200.0)).abs() < 1e-2);
    assert!((sample.target[[2, 31, 0]] - expect(160.0)).abs() < 1e-2);
}

#[test]
fn test_mode_keeps_original_resolution() {
    let dir = scenario();

    let dataset = PairedImageDataset::new(dir.path().join("data"), "train", "test").unwrap();

    for sample in dataset.iter() {
        let sample = sample.unwrap();
        assert_eq!(sample.source.shape(), &[3, 8, 12]);
        assert_eq!(sample.target.shape(), &[3, 8, 12]);
    }
}

#[test]
fn bogus_mode_is_rejected() {
    let dir = scenario();

    let err = PairedImageDataset::new(dir.path().join("data"), "train", "bogus").unwrap_err();
    assert!(matches!(err, Error::InvalidMode(_)));
}

#[test]
fn missing_sub_dir_is_a_filesystem_error() {
    let dir = scenario();

    let err = PairedImageDataset::new(dir.path().join("data"), "valid", "valid").unwrap_err();
    assert!(matches!(err, Error::ReadDir { .. }));
}

#[test]
fn out_of_range_index() {
    let dir = scenario();

    let dataset = PairedImageDataset::new(dir.path().join("data"), "train", "valid").unwrap();
    assert!(matches!(
        dataset.get(dataset.len()),
        Err(Error::IndexOutOfRange { index: 2, len: 2 })
    ));
}

#![allow(dead_code)]

use std::fs;
use std::path::Path;

use image::{Rgb, RgbImage};

pub fn write_png(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    RgbImage::from_pixel(width, height, Rgb([255, 255, 255]))
        .save(path)
        .expect("write png file");
}

/// Creates `<data>/images/<id>.png` for each `(id, width, height)`.
pub fn data_dir_with_pages(pages: &[(&str, u32, u32)]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("create temp dir");
    for (id, width, height) in pages {
        write_png(
            &dir.path().join("images").join(format!("{}.png", id)),
            *width,
            *height,
        );
    }
    dir
}

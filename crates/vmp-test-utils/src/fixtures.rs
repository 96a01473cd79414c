//! Image and file fixtures

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::ops::Range;
use vmp_core::{FileHandle, Rect};

fn encode_png(image: RgbImage) -> Vec<u8> {
    let mut out = Vec::new();
    DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .expect("PNG encoding of an in-memory buffer");
    out
}

/// PNG of the given size filled with a colour gradient
#[must_use]
pub fn png_fixture(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, y| {
        #[allow(clippy::cast_possible_truncation)]
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    encode_png(image)
}

/// Studio-style PNG: white background with a dark subject spanning `rows`
/// across the middle half of the width. An empty range yields a blank frame.
#[must_use]
pub fn studio_shot_png(width: u32, height: u32, rows: Range<u32>) -> Vec<u8> {
    let columns = width / 4..width - width / 4;
    let image = RgbImage::from_fn(width, height, |x, y| {
        if rows.contains(&y) && columns.contains(&x) {
            Rgb([40, 40, 48])
        } else {
            Rgb([255, 255, 255])
        }
    });
    encode_png(image)
}

/// In-memory file of `size` zero bytes
#[must_use]
pub fn file(name: &str, size: usize) -> FileHandle {
    FileHandle::from_bytes(name, vec![0u8; size])
}

/// Viewport used across scheduler and loader tests
#[must_use]
pub fn viewport() -> Rect {
    Rect::new(0.0, 0.0, 1000.0, 800.0)
}

/// Element bounds at a vertical offset, 200x150
#[must_use]
pub fn element_at(y: f64) -> Rect {
    Rect::new(100.0, y, 200.0, 150.0)
}

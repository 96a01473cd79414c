//! Image transforms executed by pool workers
//!
//! [`ImageTransformer`] is the seam; [`ImageResizer`] is the default
//! implementation backed by the `image` crate. Output is always JPEG.
//!
//! Besides plain fitting, the resizer knows three listing-photo layouts:
//! extending a studio shot to a fixed height, cropping a region onto a
//! fixed-size black canvas, and matting a photo onto a coloured canvas.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, RgbImage};
use vmp_core::{Dimensions, TransformError};

/// Lower/upper clamp of the automatically sampled background threshold
const AUTO_THRESHOLD_RANGE: (u8, u8) = (180, 250);
/// Size of the stripes sampled for the automatic threshold
const SAMPLE_STRIPE: (u32, u32) = (40, 20);

/// Output canvas of a crop when none is given (portrait story format)
pub const DEFAULT_CROP_OUTPUT: Dimensions = Dimensions {
    width: 1080,
    height: 1920,
};
/// Canvas of a matte when none is given
pub const DEFAULT_MATTE_CANVAS: Dimensions = Dimensions {
    width: 1920,
    height: 1080,
};

/// Source region of a crop.
///
/// A zero `width` or `height` stands for the full image width or height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRegion {
    /// The whole image
    #[must_use]
    pub fn full() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }
}

/// Operation applied before re-encoding
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum TransformOp {
    /// Scale down to fit within the target dimensions, keeping aspect ratio
    #[default]
    Fit,
    /// Re-frame a studio shot to a given height.
    ///
    /// The subject is found by scanning for rows darker than the background
    /// threshold, padded by `padding_pct` of its height, then either centre
    /// cropped (already tall enough) or extended with the stretched
    /// background above and below it (white when there is none).
    ExtendCanvas {
        /// Output height in pixels
        desired_height: u32,
        /// Padding around the subject, as a fraction of its height
        padding_pct: f32,
        /// Fixed background threshold; sampled from the image when `None`
        white_threshold: Option<u8>,
    },
    /// Cut a region out, scale it by `scale`, shrink it further if it still
    /// exceeds `output`, and centre it on a black canvas of `output` size
    Crop {
        region: CropRegion,
        /// Applied to the cut region before fitting; must be positive
        scale: f32,
        output: Dimensions,
    },
    /// Fit the whole image inside `canvas` minus a margin of
    /// `padding_percent` on every side, centred on a `background` fill
    Matte {
        canvas: Dimensions,
        /// Margin per side as a percentage of the canvas, in `0..50`
        padding_percent: f32,
        background: [u8; 3],
    },
}

/// Parameters of one transform call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformOptions {
    pub op: TransformOp,
    /// Bounding box for the output; `None` keeps the size
    pub target_dimensions: Option<Dimensions>,
    /// JPEG quality 1..=100
    pub quality: u8,
}

impl TransformOptions {
    /// Fit within dimensions at the given quality
    #[must_use]
    pub fn fit(target_dimensions: Option<Dimensions>, quality: u8) -> Self {
        Self {
            op: TransformOp::Fit,
            target_dimensions,
            quality,
        }
    }

    /// Extend canvas to a height with the usual 5% subject padding
    #[must_use]
    pub fn extend_canvas(desired_height: u32, quality: u8) -> Self {
        Self {
            op: TransformOp::ExtendCanvas {
                desired_height,
                padding_pct: 0.05,
                white_threshold: None,
            },
            target_dimensions: None,
            quality,
        }
    }

    /// Crop `region` onto an `output` canvas after scaling by `scale`
    #[must_use]
    pub fn crop(region: CropRegion, scale: f32, output: Dimensions, quality: u8) -> Self {
        Self {
            op: TransformOp::Crop { region, scale, output },
            target_dimensions: None,
            quality,
        }
    }

    /// Matte onto a `canvas` filled with `background`
    #[must_use]
    pub fn matte(canvas: Dimensions, padding_percent: f32, background: [u8; 3], quality: u8) -> Self {
        Self {
            op: TransformOp::Matte {
                canvas,
                padding_percent,
                background,
            },
            target_dimensions: None,
            quality,
        }
    }
}

/// Parse an `RRGGBB` colour, with or without a leading `#`
///
/// # Errors
/// `TransformError::InvalidOptions` for anything else.
pub fn parse_hex_color(value: &str) -> Result<[u8; 3], TransformError> {
    let hex = value.strip_prefix('#').unwrap_or(value);
    let invalid = || TransformError::InvalidOptions(format!("invalid colour {value:?}, expected #RRGGBB"));
    if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
    Ok([channel(0)?, channel(2)?, channel(4)?])
}

/// CPU-bound transform of encoded image bytes
pub trait ImageTransformer: Send + Sync {
    /// Transform encoded input into encoded output
    ///
    /// # Errors
    /// Any [`TransformError`]; callers treat all of them as non-fatal.
    fn transform(&self, input: &[u8], options: &TransformOptions) -> Result<Vec<u8>, TransformError>;
}

/// Default transformer: decode, reshape, re-encode as JPEG
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageResizer;

impl ImageTransformer for ImageResizer {
    fn transform(&self, input: &[u8], options: &TransformOptions) -> Result<Vec<u8>, TransformError> {
        if !(1..=100).contains(&options.quality) {
            return Err(TransformError::InvalidOptions(format!(
                "quality {} outside 1..=100",
                options.quality
            )));
        }
        let image =
            image::load_from_memory(input).map_err(|e| TransformError::Decode(e.to_string()))?;

        let image = match options.op {
            TransformOp::Fit => image,
            TransformOp::ExtendCanvas {
                desired_height,
                padding_pct,
                white_threshold,
            } => DynamicImage::ImageRgb8(extend_canvas(
                &image.to_rgb8(),
                desired_height,
                padding_pct,
                white_threshold,
            )?),
            TransformOp::Crop { region, scale, output } => {
                DynamicImage::ImageRgb8(crop_onto_canvas(&image.to_rgb8(), region, scale, output)?)
            }
            TransformOp::Matte {
                canvas,
                padding_percent,
                background,
            } => DynamicImage::ImageRgb8(matte(&image.to_rgb8(), canvas, padding_percent, background)?),
        };

        let image = match options.target_dimensions {
            Some(target) => fit_within(image, target)?,
            None => image,
        };

        encode_jpeg(&image.to_rgb8(), options.quality)
    }
}

/// Scale down (never up) to fit inside `target`, preserving aspect ratio
fn fit_within(image: DynamicImage, target: Dimensions) -> Result<DynamicImage, TransformError> {
    if target.width == 0 || target.height == 0 {
        return Err(TransformError::InvalidOptions(
            "target dimensions must be non-zero".to_string(),
        ));
    }
    if image.width() <= target.width && image.height() <= target.height {
        return Ok(image);
    }
    Ok(image.resize(target.width, target.height, FilterType::Lanczos3))
}

fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, TransformError> {
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode_image(image)
        .map_err(|e| TransformError::Encode(e.to_string()))?;
    Ok(out)
}

fn extend_canvas(
    image: &RgbImage,
    desired_height: u32,
    padding_pct: f32,
    white_threshold: Option<u8>,
) -> Result<RgbImage, TransformError> {
    if desired_height == 0 {
        return Err(TransformError::InvalidOptions(
            "desired height must be non-zero".to_string(),
        ));
    }
    let (width, height) = image.dimensions();
    let threshold = white_threshold.unwrap_or_else(|| sample_threshold(image));
    let (fg_top, fg_bottom) = foreground_rows(image, threshold).ok_or_else(|| {
        TransformError::InvalidOptions(format!("no foreground below threshold {threshold}"))
    })?;

    let subject_height = fg_bottom - fg_top + 1;
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let pad = (subject_height as f32 * padding_pct.max(0.0)).round() as u32;
    let crop_top = fg_top.saturating_sub(pad);
    let crop_bottom = (fg_bottom + pad).min(height - 1);
    let crop_height = crop_bottom - crop_top + 1;

    if desired_height <= crop_height {
        let offset = crop_top + (crop_height - desired_height) / 2;
        return Ok(imageops::crop_imm(image, 0, offset, width, desired_height).to_image());
    }

    let extra = desired_height - crop_height;
    let top_height = extra / 2;
    let bottom_height = extra - top_height;

    let above = (crop_top > 0).then(|| imageops::crop_imm(image, 0, 0, width, crop_top).to_image());
    let below_start = crop_bottom + 1;
    let below = (below_start < height)
        .then(|| imageops::crop_imm(image, 0, below_start, width, height - below_start).to_image());
    let subject = imageops::crop_imm(image, 0, crop_top, width, crop_height).to_image();

    let mut canvas = RgbImage::new(width, desired_height);
    let top_strip = make_strip(above.as_ref(), width, top_height);
    let bottom_strip = make_strip(below.as_ref(), width, bottom_height);
    imageops::replace(&mut canvas, &top_strip, 0, 0);
    imageops::replace(&mut canvas, &subject, 0, i64::from(top_height));
    imageops::replace(
        &mut canvas,
        &bottom_strip,
        0,
        i64::from(top_height + crop_height),
    );
    Ok(canvas)
}

fn invalid(message: &str) -> TransformError {
    TransformError::InvalidOptions(message.to_string())
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn scaled(length: u32, factor: f64) -> u32 {
    (f64::from(length) * factor).round().max(1.0) as u32
}

fn crop_onto_canvas(
    image: &RgbImage,
    region: CropRegion,
    scale: f32,
    output: Dimensions,
) -> Result<RgbImage, TransformError> {
    if output.width == 0 || output.height == 0 {
        return Err(invalid("output dimensions must be non-zero"));
    }
    if !(scale.is_finite() && scale > 0.0) {
        return Err(invalid("scale must be positive"));
    }
    let (image_width, image_height) = image.dimensions();
    let width = if region.width == 0 { image_width } else { region.width };
    let height = if region.height == 0 { image_height } else { region.height };
    if u64::from(region.x) + u64::from(width) > u64::from(image_width)
        || u64::from(region.y) + u64::from(height) > u64::from(image_height)
    {
        return Err(TransformError::InvalidOptions(format!(
            "crop {width}x{height} at ({}, {}) exceeds {image_width}x{image_height} image",
            region.x, region.y
        )));
    }

    let mut cropped = imageops::crop_imm(image, region.x, region.y, width, height).to_image();
    if (scale - 1.0).abs() > f32::EPSILON {
        let factor = f64::from(scale);
        cropped = imageops::resize(
            &cropped,
            scaled(width, factor),
            scaled(height, factor),
            FilterType::Lanczos3,
        );
    }

    let (width, height) = cropped.dimensions();
    if width > output.width || height > output.height {
        let factor = (f64::from(output.width) / f64::from(width))
            .min(f64::from(output.height) / f64::from(height));
        cropped = imageops::resize(
            &cropped,
            scaled(width, factor).min(output.width),
            scaled(height, factor).min(output.height),
            FilterType::Lanczos3,
        );
    }

    let mut canvas = RgbImage::new(output.width, output.height);
    let (width, height) = cropped.dimensions();
    imageops::replace(
        &mut canvas,
        &cropped,
        i64::from((output.width - width) / 2),
        i64::from((output.height - height) / 2),
    );
    Ok(canvas)
}

fn matte(
    image: &RgbImage,
    canvas: Dimensions,
    padding_percent: f32,
    background: [u8; 3],
) -> Result<RgbImage, TransformError> {
    if canvas.width == 0 || canvas.height == 0 {
        return Err(invalid("canvas dimensions must be non-zero"));
    }
    if !(0.0..50.0).contains(&padding_percent) {
        return Err(invalid("padding must be at least 0% and below 50%"));
    }
    let fraction = f64::from(padding_percent) / 100.0;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let (pad_x, pad_y) = (
        (f64::from(canvas.width) * fraction) as u32,
        (f64::from(canvas.height) * fraction) as u32,
    );
    let content_width = canvas.width.saturating_sub(2 * pad_x);
    let content_height = canvas.height.saturating_sub(2 * pad_y);
    if content_width == 0 || content_height == 0 {
        return Err(invalid("padding too large for the canvas"));
    }

    let (image_width, image_height) = image.dimensions();
    let ratio = f64::from(image_width) / f64::from(image_height);
    let content_ratio = f64::from(content_width) / f64::from(content_height);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let (width, height) = if ratio > content_ratio {
        (content_width, (f64::from(content_width) / ratio) as u32)
    } else {
        ((f64::from(content_height) * ratio) as u32, content_height)
    };
    let (width, height) = (width.clamp(1, canvas.width), height.clamp(1, canvas.height));

    let fitted = imageops::resize(image, width, height, FilterType::Triangle);
    let mut out = RgbImage::from_pixel(canvas.width, canvas.height, image::Rgb(background));
    imageops::replace(
        &mut out,
        &fitted,
        i64::from((canvas.width - width) / 2),
        i64::from((canvas.height - height) / 2),
    );
    Ok(out)
}

/// Stretch a background region to `height` rows, or fill white
fn make_strip(source: Option<&RgbImage>, width: u32, height: u32) -> RgbImage {
    match source {
        _ if height == 0 => RgbImage::new(width, 0),
        Some(src) => imageops::resize(src, width, height, FilterType::Triangle),
        None => RgbImage::from_pixel(width, height, image::Rgb([255, 255, 255])),
    }
}

/// First and last rows containing a pixel darker than the threshold
fn foreground_rows(image: &RgbImage, threshold: u8) -> Option<(u32, u32)> {
    let mut rows = (0..image.height()).filter(|&y| {
        (0..image.width()).any(|x| image.get_pixel(x, y).0.iter().any(|&c| c < threshold))
    });
    let top = rows.next()?;
    let bottom = rows.last().unwrap_or(top);
    Some((top, bottom))
}

/// Background threshold from the centre of the top and bottom edges.
///
/// Soft-box lighting makes "white" vary from shoot to shoot, so the darker
/// of the two stripe means, minus a small cushion, is used.
fn sample_threshold(image: &RgbImage) -> u8 {
    let (width, height) = image.dimensions();
    if width < 3 || height < 10 {
        return AUTO_THRESHOLD_RANGE.1;
    }
    let cx = width / 2;
    let half = SAMPLE_STRIPE.0.min(cx - 1).min(width - cx - 1);
    let stripe_height = SAMPLE_STRIPE.1.min(height / 10).max(1);
    let stripe_width = 2 * half + 1;

    let top = mean_luma(image, cx - half, 0, stripe_width, stripe_height);
    let bottom = mean_luma(image, cx - half, height - stripe_height, stripe_width, stripe_height);

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let threshold = (top.min(bottom) - 5.0).clamp(
        f64::from(AUTO_THRESHOLD_RANGE.0),
        f64::from(AUTO_THRESHOLD_RANGE.1),
    ) as u8;
    threshold
}

fn mean_luma(image: &RgbImage, x: u32, y: u32, width: u32, height: u32) -> f64 {
    let region = imageops::crop_imm(image, x, y, width, height);
    let (sum, count) = region
        .pixels()
        .fold((0.0f64, 0u64), |(sum, count), (_, _, px)| {
            let [r, g, b] = px.0;
            let luma = 0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b);
            (sum + luma, count + 1)
        });
    if count == 0 {
        return 255.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let mean = sum / count as f64;
    mean
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmp_test_utils::fixtures::{png_fixture, studio_shot_png};

    fn decode(bytes: &[u8]) -> DynamicImage {
        image::load_from_memory(bytes).unwrap()
    }

    /// Channel-wise comparison with room for JPEG noise
    fn near(image: &DynamicImage, x: u32, y: u32, expected: [u8; 3]) -> bool {
        let [r, g, b, _] = image.get_pixel(x, y).0;
        [r, g, b]
            .iter()
            .zip(expected)
            .all(|(&actual, want)| actual.abs_diff(want) <= 24)
    }

    #[test]
    fn fit_preserves_aspect_ratio() {
        let input = png_fixture(400, 200);
        let out = ImageResizer
            .transform(&input, &TransformOptions::fit(Some(Dimensions::new(100, 100)), 80))
            .unwrap();
        let image = decode(&out);
        assert_eq!((image.width(), image.height()), (100, 50));
    }

    #[test]
    fn fit_never_upscales() {
        let input = png_fixture(40, 30);
        let out = ImageResizer
            .transform(&input, &TransformOptions::fit(Some(Dimensions::new(400, 300)), 80))
            .unwrap();
        let image = decode(&out);
        assert_eq!((image.width(), image.height()), (40, 30));
    }

    #[test]
    fn quality_only_reencodes_as_jpeg() {
        let input = png_fixture(32, 32);
        let out = ImageResizer
            .transform(&input, &TransformOptions::fit(None, 60))
            .unwrap();
        assert_eq!(&out[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn garbage_input_is_a_decode_error() {
        let err = ImageResizer
            .transform(b"not an image", &TransformOptions::fit(None, 80))
            .unwrap_err();
        assert!(matches!(err, TransformError::Decode(_)));
    }

    #[test]
    fn invalid_options_are_rejected() {
        let input = png_fixture(8, 8);
        let err = ImageResizer
            .transform(&input, &TransformOptions::fit(Some(Dimensions::new(0, 10)), 80))
            .unwrap_err();
        assert!(matches!(err, TransformError::InvalidOptions(_)));

        let err = ImageResizer
            .transform(&input, &TransformOptions::fit(None, 0))
            .unwrap_err();
        assert!(matches!(err, TransformError::InvalidOptions(_)));
    }

    #[test]
    fn extend_canvas_grows_to_desired_height() {
        // 100x100 white frame with a dark subject in rows 40..60.
        let input = studio_shot_png(100, 100, 40..60);
        let out = ImageResizer
            .transform(&input, &TransformOptions::extend_canvas(240, 90))
            .unwrap();
        let image = decode(&out);
        assert_eq!((image.width(), image.height()), (100, 240));
    }

    #[test]
    fn extend_canvas_centre_crops_when_tall_enough() {
        let input = studio_shot_png(100, 100, 10..90);
        let out = ImageResizer
            .transform(&input, &TransformOptions::extend_canvas(50, 90))
            .unwrap();
        let image = decode(&out);
        assert_eq!((image.width(), image.height()), (100, 50));
    }

    #[test]
    fn extend_canvas_without_subject_fails() {
        let input = studio_shot_png(60, 60, 0..0);
        let err = ImageResizer
            .transform(&input, &TransformOptions::extend_canvas(120, 90))
            .unwrap_err();
        assert!(matches!(err, TransformError::InvalidOptions(_)));
    }

    #[test]
    fn foreground_detection() {
        let mut image = RgbImage::from_pixel(10, 10, image::Rgb([255, 255, 255]));
        image.put_pixel(3, 2, image::Rgb([10, 10, 10]));
        image.put_pixel(7, 6, image::Rgb([10, 10, 10]));
        assert_eq!(foreground_rows(&image, 200), Some((2, 6)));

        let blank = RgbImage::from_pixel(10, 10, image::Rgb([255, 255, 255]));
        assert_eq!(foreground_rows(&blank, 200), None);
    }

    #[test]
    fn sampled_threshold_is_clamped() {
        let white = RgbImage::from_pixel(100, 100, image::Rgb([255, 255, 255]));
        assert_eq!(sample_threshold(&white), 250);
        let grey = RgbImage::from_pixel(100, 100, image::Rgb([100, 100, 100]));
        assert_eq!(sample_threshold(&grey), 180);
    }

    #[test]
    fn crop_centres_region_on_black_canvas() {
        let input = png_fixture(100, 80);
        let options = TransformOptions::crop(CropRegion::new(10, 10, 40, 20), 1.0, Dimensions::new(60, 40), 95);
        let image = decode(&ImageResizer.transform(&input, &options).unwrap());

        assert_eq!((image.width(), image.height()), (60, 40));
        // Region occupies x 10..50, y 10..30 of the canvas.
        assert!(near(&image, 2, 2, [0, 0, 0]));
        assert!(near(&image, 57, 37, [0, 0, 0]));
        assert!(image.get_pixel(30, 20).0[2] > 96);
    }

    #[test]
    fn scaled_crop_is_shrunk_to_fit_the_output() {
        let input = png_fixture(50, 50);
        let options = TransformOptions::crop(CropRegion::full(), 2.0, Dimensions::new(40, 80), 95);
        let image = decode(&ImageResizer.transform(&input, &options).unwrap());

        // 100x100 after scaling, fitted to 40x40 and centred vertically.
        assert_eq!((image.width(), image.height()), (40, 80));
        assert!(near(&image, 20, 5, [0, 0, 0]));
        assert!(image.get_pixel(20, 40).0[2] > 96);
        assert!(near(&image, 20, 75, [0, 0, 0]));
    }

    #[test]
    fn crop_rejects_bad_geometry() {
        let input = png_fixture(100, 80);
        for options in [
            TransformOptions::crop(CropRegion::new(90, 0, 20, 10), 1.0, DEFAULT_CROP_OUTPUT, 90),
            TransformOptions::crop(CropRegion::new(0, 1, 0, 0), 1.0, DEFAULT_CROP_OUTPUT, 90),
            TransformOptions::crop(CropRegion::full(), 0.0, DEFAULT_CROP_OUTPUT, 90),
            TransformOptions::crop(CropRegion::full(), f32::NAN, DEFAULT_CROP_OUTPUT, 90),
            TransformOptions::crop(CropRegion::full(), 1.0, Dimensions::new(0, 10), 90),
        ] {
            let err = ImageResizer.transform(&input, &options).unwrap_err();
            assert!(matches!(err, TransformError::InvalidOptions(_)), "{options:?}");
        }
    }

    #[test]
    fn matte_letterboxes_inside_padding() {
        let input = png_fixture(200, 100);
        let background = [200, 0, 0];
        let options = TransformOptions::matte(Dimensions::new(100, 100), 10.0, background, 95);
        let image = decode(&ImageResizer.transform(&input, &options).unwrap());

        // Content area is 80x80; the 2:1 photo becomes 80x40 at (10, 30).
        assert_eq!((image.width(), image.height()), (100, 100));
        assert!(near(&image, 2, 50, background));
        assert!(near(&image, 50, 15, background));
        assert!(near(&image, 50, 85, background));
        assert!(image.get_pixel(50, 50).0[2] > 96);
    }

    #[test]
    fn matte_rejects_bad_padding_and_canvas() {
        let input = png_fixture(20, 20);
        for options in [
            TransformOptions::matte(DEFAULT_MATTE_CANVAS, 50.0, [0, 0, 0], 90),
            TransformOptions::matte(DEFAULT_MATTE_CANVAS, -1.0, [0, 0, 0], 90),
            TransformOptions::matte(Dimensions::new(0, 100), 0.0, [0, 0, 0], 90),
        ] {
            let err = ImageResizer.transform(&input, &options).unwrap_err();
            assert!(matches!(err, TransformError::InvalidOptions(_)), "{options:?}");
        }
    }

    #[test]
    fn hex_colours() {
        assert_eq!(parse_hex_color("#1a2B3c").unwrap(), [0x1a, 0x2b, 0x3c]);
        assert_eq!(parse_hex_color("ffffff").unwrap(), [255, 255, 255]);
        assert!(parse_hex_color("#fff").is_err());
        assert!(parse_hex_color("#gg0000").is_err());
        assert!(parse_hex_color("#ff00001").is_err());
    }
}

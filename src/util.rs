use image::{GenericImageView, GrayImage, Luma};
use tracing::instrument;

/// Fraction of pixels that are ink, assuming the ink-high convention
/// (0 is background, 255 is full ink).
pub fn ink_density<I>(image: &I) -> f32
where
    I: GenericImageView<Pixel = Luma<u8>>,
{
    let (width, height) = image.dimensions();
    let count = width as u64 * height as u64;
    if count == 0 {
        return 0.0;
    }
    let sum: u64 = image.pixels().map(|(_, _, p)| p.0[0] as u64).sum();
    sum as f32 / (255.0 * count as f32)
}

/// Ink density of a rectangular window of `image`.
pub(crate) fn region_density(image: &GrayImage, x: u32, y: u32, width: u32, height: u32) -> f32 {
    ink_density(&*image::imageops::crop_imm(image, x, y, width, height))
}

/// Flip the image so that ink is the high-intensity class. Scanners hand us
/// dark marks on bright paper, so a page whose mean intensity is above the
/// midpoint gets inverted; input that is already ink-high passes through.
#[instrument(level = "trace", skip(image))]
pub(crate) fn normalize_polarity(image: &GrayImage) -> GrayImage {
    let mut image = image.clone();
    let density = ink_density(&image);
    if density > 0.5 {
        log::debug!("inverting polarity (raw ink density {density:.3})");
        image::imageops::invert(&mut image);
    }
    image
}

pub(crate) fn transpose(image: &GrayImage) -> GrayImage {
    GrayImage::from_fn(image.height(), image.width(), |x, y| *image.get_pixel(y, x))
}

/// `count` evenly spaced values over `[lo, hi]`, endpoints included.
pub(crate) fn linspace(lo: f32, hi: f32, count: usize) -> Vec<f32> {
    if count < 2 {
        return vec![lo];
    }
    let step = (hi - lo) / (count - 1) as f32;
    (0..count).map(|i| lo + step * i as f32).collect()
}

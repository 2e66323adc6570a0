//! Reads hand-marked digit identifiers (UINs) off scanned coversheet pages.
//!
//! A page is cropped to the configured identifier window, the ruled digit
//! grid inside it is located, deskewed and cropped, and each digit column
//! is classified by ink density. Reads that fail the confidence gate come
//! back as errors for manual review instead of silent guesses.

use image::GrayImage;
use tracing::instrument;

mod classify;
pub mod extract;
pub mod hough;
mod result;
pub mod util;

pub use classify::ReadOptions;
pub use extract::{Align, BoxExtractOptions, BoxExtractor, Sides};
pub use result::*;

const DIGIT_CHARS: &str = "0123456789";
const DEFAULT_DIGIT_COUNT: usize = 9;

/// Pixel window of the page that holds the identifier box. The default
/// models the 400 dpi coversheet layout this reader was tuned for; page
/// orientation is the rasterizer's responsibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for CropRegion {
    fn default() -> Self {
        Self {
            x: 1700,
            y: 720,
            width: 1600,
            height: 1680,
        }
    }
}

pub struct UinReaderBuilder {
    digit_count: usize,
    chars: String,
    crop: CropRegion,
    options: ReadOptions,
}

impl UinReaderBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn digit_count(mut self, digit_count: usize) -> Self {
        self.digit_count = digit_count;
        self
    }

    /// The digit alphabet, one character per grid row, top to bottom.
    pub fn chars(mut self, chars: impl Into<String>) -> Self {
        self.chars = chars.into();
        self
    }

    pub fn crop_region(mut self, crop: CropRegion) -> Self {
        self.crop = crop;
        self
    }

    pub fn read_options(mut self, options: ReadOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> Result<UinReader> {
        if self.digit_count == 0 {
            return Err(ScanError::Config(
                "identifier length must be at least 1".into(),
            ));
        }
        let chars: Vec<char> = self.chars.chars().collect();
        if chars.len() < 2 {
            return Err(ScanError::Config(
                "digit alphabet needs at least two characters".into(),
            ));
        }
        if self.crop.width == 0 || self.crop.height == 0 {
            return Err(ScanError::Config("crop region must not be empty".into()));
        }
        Ok(UinReader {
            digit_count: self.digit_count,
            chars,
            crop: self.crop,
            options: self.options,
            extractor: BoxExtractor::new(BoxExtractOptions {
                align: Align::Vertical,
                ..Default::default()
            }),
        })
    }
}

impl Default for UinReaderBuilder {
    fn default() -> Self {
        Self {
            digit_count: DEFAULT_DIGIT_COUNT,
            chars: DIGIT_CHARS.to_string(),
            crop: CropRegion::default(),
            options: ReadOptions::default(),
        }
    }
}

pub struct UinReader {
    digit_count: usize,
    chars: Vec<char>,
    crop: CropRegion,
    options: ReadOptions,
    extractor: BoxExtractor,
}

impl UinReader {
    /// Reads the identifier off a full page image.
    #[instrument(skip(self, page))]
    pub fn read(&self, page: &GrayImage) -> Result<Reading> {
        let CropRegion {
            x,
            y,
            width,
            height,
        } = self.crop;
        if x as u64 + width as u64 > page.width() as u64
            || y as u64 + height as u64 > page.height() as u64
        {
            return Err(ScanError::CropOutOfBounds {
                x,
                y,
                width,
                height,
            });
        }
        let cropped = image::imageops::crop_imm(page, x, y, width, height).to_image();
        let box_image = self.extractor.extract(&cropped)?;
        log::debug!(
            "extracted {}x{} identifier box",
            box_image.width(),
            box_image.height()
        );
        classify::classify(&box_image, &self.chars, self.digit_count, &self.options)
    }
}

use std::f32::consts::FRAC_PI_2;

use image::{GrayImage, Luma};
use imageproc::{
    distance_transform::Norm,
    geometric_transformations::{rotate_about_center, Interpolation},
    morphology::erode,
};
use tracing::instrument;

use crate::{
    hough::{HoughLineDetector, LineDetector},
    result::{BoxBounds, Result, ScanError},
    util::{linspace, normalize_polarity, transpose},
};

/// Half-width of the angle window searched when straightening the dominant
/// line, radians.
const DESKEW_ANGLE_WINDOW: f32 = 0.17;
const DESKEW_ANGLE_SAMPLES: usize = 100;
/// Half-width of the angle band searched around each edge's target axis.
const EDGE_ANGLE_BAND: f32 = 0.02;
const EDGE_ANGLE_SAMPLES: usize = 30;
/// Line hypotheses required per border strip.
const EDGE_PEAKS: usize = 2;

/// Which axis the dominant line is rotated onto before edge finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    #[default]
    Horizontal,
    Vertical,
}

/// The subset of box edges to localize. Edges left out fall back to the
/// image's own extent, i.e. no crop on that side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sides {
    pub north: bool,
    pub east: bool,
    pub south: bool,
    pub west: bool,
}

impl Sides {
    pub const ALL: Sides = Sides {
        north: true,
        east: true,
        south: true,
        west: true,
    };
}

impl Default for Sides {
    fn default() -> Self {
        Self::ALL
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BoxExtractOptions {
    pub sides: Sides,
    pub align: Align,
    /// Fraction of the image inspected from each requested side when
    /// looking for that side's edge.
    pub percent: f32,
}

impl Default for BoxExtractOptions {
    fn default() -> Self {
        Self {
            sides: Sides::ALL,
            align: Align::Horizontal,
            percent: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Side {
    North,
    East,
    South,
    West,
}

impl Side {
    fn context(self) -> &'static str {
        match self {
            Side::North => "the north edge",
            Side::East => "the east edge",
            Side::South => "the south edge",
            Side::West => "the west edge",
        }
    }
}

/// Locates and crops the dominant ruled box in a grayscale image.
///
/// Polarity is normalized so ink is the high class, the image is deskewed
/// onto the configured axis, and each requested edge is localized from a
/// border strip of the eroded image. The returned crop is taken from the
/// deskewed, pre-erosion image and keeps the ink-high convention.
pub struct BoxExtractor<D = HoughLineDetector> {
    detector: D,
    options: BoxExtractOptions,
}

impl BoxExtractor {
    pub fn new(options: BoxExtractOptions) -> Self {
        Self {
            detector: HoughLineDetector::default(),
            options,
        }
    }
}

impl<D: LineDetector> BoxExtractor<D> {
    /// Extractor backed by a caller-supplied line detection capability.
    pub fn with_detector(detector: D, options: BoxExtractOptions) -> Self {
        Self { detector, options }
    }

    /// Box bounds in deskewed image coordinates.
    pub fn locate(&self, image: &GrayImage) -> Result<BoxBounds> {
        Ok(self.prepare(image)?.1)
    }

    /// The cropped box, deskewed and ink-high.
    #[instrument(level = "debug", skip(self, image))]
    pub fn extract(&self, image: &GrayImage) -> Result<GrayImage> {
        let (deskewed, bounds) = self.prepare(image)?;
        log::debug!("cropping to {bounds:?}");
        Ok(image::imageops::crop_imm(
            &deskewed,
            bounds.west,
            bounds.north,
            bounds.width(),
            bounds.height(),
        )
        .to_image())
    }

    fn prepare(&self, image: &GrayImage) -> Result<(GrayImage, BoxBounds)> {
        let image = normalize_polarity(image);
        let image = self.deskew(&image)?;
        // One erosion pass sharpens the line peaks more than smoothing does.
        let smoothed = erode(&image, Norm::L1, 1);
        let (width, height) = image.dimensions();

        let sides = self.options.sides;
        let mut north = 0;
        let mut south = height as i64;
        let mut west = 0;
        let mut east = width as i64;
        if sides.north {
            north = self.find_edge(&smoothed, Side::North)?;
        }
        if sides.south {
            south = self.find_edge(&smoothed, Side::South)?;
        }
        if sides.west {
            west = self.find_edge(&smoothed, Side::West)?;
        }
        if sides.east {
            east = self.find_edge(&smoothed, Side::East)?;
        }

        let north = north.clamp(0, height as i64);
        let south = south.clamp(0, height as i64);
        let west = west.clamp(0, width as i64);
        let east = east.clamp(0, width as i64);
        if north >= south || west >= east {
            return Err(ScanError::GeometryDetection {
                context: "a coherent box outline",
            });
        }
        let bounds = BoxBounds {
            north: north as u32,
            south: south as u32,
            west: west as u32,
            east: east as u32,
        };
        Ok((image, bounds))
    }

    fn deskew(&self, image: &GrayImage) -> Result<GrayImage> {
        match self.options.align {
            Align::Vertical => self.deskew_vertical(image),
            Align::Horizontal => Ok(transpose(&self.deskew_vertical(&transpose(image))?)),
        }
    }

    /// Rotates the image so the strongest near-vertical line becomes
    /// exactly vertical.
    #[instrument(level = "trace", skip(self, image))]
    fn deskew_vertical(&self, image: &GrayImage) -> Result<GrayImage> {
        let angles = linspace(-DESKEW_ANGLE_WINDOW, DESKEW_ANGLE_WINDOW, DESKEW_ANGLE_SAMPLES);
        let peaks = self.detector.detect(image, &angles, 1);
        let Some(peak) = peaks.first() else {
            return Err(ScanError::GeometryDetection {
                context: "the dominant line",
            });
        };
        log::debug!(
            "dominant line at {:.4} rad (strength {:.1})",
            peak.angle,
            peak.strength
        );
        // rotate_about_center turns clockwise for positive theta, so the
        // detected normal angle rotates back with its sign flipped.
        Ok(rotate_about_center(
            image,
            -peak.angle,
            Interpolation::Bilinear,
            Luma([0]),
        ))
    }

    /// One edge coordinate in full-image space, from the two strongest
    /// near-orthogonal lines inside that side's border strip.
    #[instrument(level = "trace", skip(self, smoothed))]
    fn find_edge(&self, smoothed: &GrayImage, side: Side) -> Result<i64> {
        let (width, height) = smoothed.dimensions();
        let strip_height = ((self.options.percent * height as f32) as u32).clamp(1, height);
        let strip_width = ((self.options.percent * width as f32) as u32).clamp(1, width);

        let strip = match side {
            Side::North => image::imageops::crop_imm(smoothed, 0, 0, width, strip_height),
            Side::South => image::imageops::crop_imm(
                smoothed,
                0,
                height - strip_height,
                width,
                strip_height,
            ),
            Side::West => image::imageops::crop_imm(smoothed, 0, 0, strip_width, height),
            Side::East => {
                image::imageops::crop_imm(smoothed, width - strip_width, 0, strip_width, height)
            }
        }
        .to_image();

        let angles = match side {
            // Near pi/2, i.e. almost horizontal lines.
            Side::North | Side::South => linspace(
                FRAC_PI_2 - EDGE_ANGLE_BAND,
                FRAC_PI_2 + EDGE_ANGLE_BAND,
                EDGE_ANGLE_SAMPLES,
            ),
            // Near 0, i.e. almost vertical lines.
            Side::West | Side::East => {
                linspace(-EDGE_ANGLE_BAND, EDGE_ANGLE_BAND, EDGE_ANGLE_SAMPLES)
            }
        };

        let peaks = self.detector.detect(&strip, &angles, EDGE_PEAKS);
        if peaks.len() < EDGE_PEAKS {
            return Err(ScanError::GeometryDetection {
                context: side.context(),
            });
        }
        let distances = peaks.iter().map(|peak| peak.distance);
        // The outermost of the two strongest lines is the box edge: nearest
        // for the near sides, farthest (translated back to full-image
        // coordinates) for the far sides.
        let coordinate = match side {
            Side::North | Side::West => distances.fold(f32::INFINITY, f32::min) as i64,
            Side::South => {
                let max = distances.fold(f32::NEG_INFINITY, f32::max) as i64;
                height as i64 + max - strip_height as i64
            }
            Side::East => {
                let max = distances.fold(f32::NEG_INFINITY, f32::max) as i64;
                width as i64 + max - strip_width as i64
            }
        };
        log::trace!("{side:?} edge at {coordinate}");
        Ok(coordinate)
    }
}

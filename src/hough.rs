use image::GrayImage;
use ndarray::Array2;
use tracing::instrument;

/// One candidate straight line: the angle of its normal (radians, measured
/// from the x axis), its perpendicular distance from the image origin in
/// pixels, and the accumulated vote strength behind it.
#[derive(Debug, Clone, Copy)]
pub struct LineHypothesis {
    pub angle: f32,
    pub distance: f32,
    pub strength: f32,
}

/// Ranked straight-line detection over a caller-supplied set of candidate
/// angles. The narrow angle bands the extraction pipeline works with
/// (fractions of a degree) rule out detectors that quantize angles, which
/// is why the crate carries its own default implementation.
pub trait LineDetector {
    /// Up to `max_peaks` line hypotheses, strongest first. A pixel at
    /// `(x, y)` lies on the hypothesis `(angle, distance)` when
    /// `x * cos(angle) + y * sin(angle) == distance`.
    fn detect(&self, image: &GrayImage, angles: &[f32], max_peaks: usize) -> Vec<LineHypothesis>;
}

/// Peaks closer than this many distance bins collapse into one hypothesis.
const PEAK_MIN_DISTANCE: usize = 9;
/// Peaks closer than this many angle bins collapse into one hypothesis.
const PEAK_MIN_ANGLE: usize = 10;
/// Accumulator cells below this fraction of the global maximum never peak.
const PEAK_THRESHOLD_RATIO: f32 = 0.5;

/// Hough transform over an explicit angle set, with intensity-weighted
/// votes and non-maximum suppression on the accumulator.
///
/// Ties in strength resolve deterministically by scan order: the smaller
/// distance wins, then the earlier candidate angle.
#[derive(Debug, Clone, Copy)]
pub struct HoughLineDetector {
    pub min_distance: usize,
    pub min_angle: usize,
    pub threshold_ratio: f32,
}

impl Default for HoughLineDetector {
    fn default() -> Self {
        Self {
            min_distance: PEAK_MIN_DISTANCE,
            min_angle: PEAK_MIN_ANGLE,
            threshold_ratio: PEAK_THRESHOLD_RATIO,
        }
    }
}

impl HoughLineDetector {
    fn accumulate(&self, image: &GrayImage, angles: &[f32], offset: i64) -> Array2<f32> {
        let bins = 2 * offset as usize + 1;
        let mut accumulator = Array2::<f32>::zeros((bins, angles.len()));
        let trig: Vec<(f32, f32)> = angles.iter().map(|a| (a.cos(), a.sin())).collect();
        for (x, y, pixel) in image.enumerate_pixels() {
            let value = pixel.0[0];
            if value == 0 {
                continue;
            }
            let weight = value as f32 / 255.0;
            for (angle_idx, (cos, sin)) in trig.iter().enumerate() {
                let rho = x as f32 * cos + y as f32 * sin;
                let bin = (rho.round() as i64 + offset) as usize;
                accumulator[[bin, angle_idx]] += weight;
            }
        }
        accumulator
    }
}

impl LineDetector for HoughLineDetector {
    #[instrument(level = "trace", skip(self, image, angles))]
    fn detect(&self, image: &GrayImage, angles: &[f32], max_peaks: usize) -> Vec<LineHypothesis> {
        if angles.is_empty() || max_peaks == 0 {
            return Vec::new();
        }
        let (width, height) = image.dimensions();
        // Largest possible |rho| for any in-image pixel.
        let offset = ((width as f64).hypot(height as f64)).ceil() as i64;
        let mut accumulator = self.accumulate(image, angles, offset);

        let strongest = accumulator.iter().cloned().fold(0.0_f32, f32::max);
        if strongest <= 0.0 {
            return Vec::new();
        }
        let threshold = self.threshold_ratio * strongest;

        let (bins, angle_count) = accumulator.dim();
        let mut peaks = Vec::with_capacity(max_peaks);
        while peaks.len() < max_peaks {
            let mut best: Option<((usize, usize), f32)> = None;
            for (index, &value) in accumulator.indexed_iter() {
                if value >= threshold && best.map_or(true, |(_, top)| value > top) {
                    best = Some((index, value));
                }
            }
            let Some(((bin, angle_idx), strength)) = best else {
                break;
            };
            peaks.push(LineHypothesis {
                angle: angles[angle_idx],
                distance: (bin as i64 - offset) as f32,
                strength,
            });
            // Suppress the neighborhood so nearby bins of the same physical
            // line cannot peak again.
            let bin_lo = bin.saturating_sub(self.min_distance);
            let bin_hi = (bin + self.min_distance).min(bins - 1);
            let angle_lo = angle_idx.saturating_sub(self.min_angle);
            let angle_hi = (angle_idx + self.min_angle).min(angle_count - 1);
            for b in bin_lo..=bin_hi {
                for a in angle_lo..=angle_hi {
                    accumulator[[b, a]] = 0.0;
                }
            }
        }
        log::trace!("{} peak(s) over {} angles", peaks.len(), angle_count);
        peaks
    }
}

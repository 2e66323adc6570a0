use float_ord::FloatOrd;
use image::GrayImage;
use tracing::instrument;

use crate::{
    result::{ColumnScore, Reading, Result, ScanError},
    util::region_density,
};

/// Margin rows the box carries beyond the digit rows: a quarter-row header
/// strip above and a half-row footer below.
const ROW_MARGIN_FRACTION: f32 = 0.75;
const ROW_DIVIDER_OFFSET: f32 = 0.25;
const COLUMN_DIVIDER_OFFSET: f32 = 0.5;
/// Rows thinner than this fraction of the column width mean the grid was
/// struck through instead of filled in.
const STRUCK_ROW_RATIO: f32 = 0.95;
/// Rows taller than this fraction of the column width mean edge finding
/// captured a spurious header strip above the grid.
const HEADER_ROW_RATIO: f32 = 1.1;

const MIN_SEPARATION: f32 = 1.1;
const FAINT_DENSITY: f32 = 0.10;
const FAINT_SEPARATION: f32 = 2.0;

/// Confidence gate thresholds. The defaults are the empirically tuned
/// production values.
#[derive(Debug, Clone, Copy)]
pub struct ReadOptions {
    /// Reject the read when even the best column separates its top cell
    /// from the runner-up by less than this ratio.
    pub min_separation: f32,
    /// Winning marks fainter than this density are only trusted when the
    /// best column separation also clears `faint_separation`.
    pub faint_density: f32,
    pub faint_separation: f32,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            min_separation: MIN_SEPARATION,
            faint_density: FAINT_DENSITY,
            faint_separation: FAINT_SEPARATION,
        }
    }
}

/// Reads the digit grid out of an extracted, ink-high box image.
///
/// The box is partitioned into `digit_count` columns (plus a leading
/// half-width label column and trailing margin) and one row per character
/// of `chars`; each cell scores by ink density and every column's ranking
/// must pass the confidence gate before the identifier is returned.
#[instrument(level = "debug", skip(box_image, chars, options))]
pub(crate) fn classify(
    box_image: &GrayImage,
    chars: &[char],
    digit_count: usize,
    options: &ReadOptions,
) -> Result<Reading> {
    let rows = chars.len();
    let (box_width, box_height) = box_image.dimensions();
    let width = box_width as f32;
    let mut height = box_height as f32;
    let mut dy = height / (rows as f32 + ROW_MARGIN_FRACTION);
    let dx = width / (digit_count as f32 + 1.0);

    if dy < STRUCK_ROW_RATIO * dx {
        // Careless strike-through of an unused sheet rather than a response.
        log::debug!("rows {dy:.1}px against columns {dx:.1}px: struck-through grid");
        return Ok(Reading {
            text: chars[0].to_string().repeat(digit_count),
            columns: Vec::new(),
        });
    }

    let mut y_offset = 0;
    if dy > HEADER_ROW_RATIO * dx {
        // Edge finding most likely latched onto the top of a header strip;
        // assume square cells and keep the bottom of the box.
        dy = dx;
        let truncated = (((rows as f32 + ROW_MARGIN_FRACTION) * dy) as u32).min(box_height);
        y_offset = box_height - truncated;
        height = truncated as f32;
        log::debug!("header strip suspected, keeping the bottom {truncated} rows");
    }

    let column_dividers = dividers(COLUMN_DIVIDER_OFFSET * dx, dx, width);
    let row_dividers = dividers(ROW_DIVIDER_OFFSET * dy, dy, height);
    let column_spans = interior_spans(&column_dividers);
    let row_spans = interior_spans(&row_dividers);
    if column_spans.len() != digit_count || row_spans.len() != rows {
        return Err(ScanError::GeometryDetection {
            context: "the digit grid partition",
        });
    }

    let mut columns = Vec::with_capacity(digit_count);
    for &(x0, x1) in &column_spans {
        let mut scored: Vec<(f32, char)> = row_spans
            .iter()
            .zip(chars)
            .map(|(&(y0, y1), &ch)| {
                let density = region_density(box_image, x0, y_offset + y0, x1 - x0, y1 - y0);
                (density, ch)
            })
            .collect();
        scored.sort_unstable_by_key(|&(density, ch)| std::cmp::Reverse((FloatOrd(density), ch)));
        columns.push(ColumnScore {
            digit: scored[0].1,
            top_density: scored[0].0,
            second_density: scored[1].0,
        });
    }

    let reading = Reading {
        text: columns.iter().map(|column| column.digit).collect(),
        columns,
    };
    let worst_ratio = reading.worst_ratio();
    let lightest = reading.lightest();
    log::debug!(
        "candidate {:?} (worst_ratio {worst_ratio:.2}, lightest {lightest:.3})",
        reading.text
    );
    if worst_ratio < options.min_separation
        || (lightest < options.faint_density && worst_ratio < options.faint_separation)
    {
        return Err(ScanError::AmbiguousRead {
            worst_ratio,
            lightest,
        });
    }
    Ok(reading)
}

fn dividers(start: f32, step: f32, limit: f32) -> Vec<u32> {
    let mut positions = Vec::new();
    let mut value = start;
    while value < limit {
        positions.push(value as u32);
        value += step;
    }
    positions
}

/// Spans between consecutive dividers. The fragments before the first and
/// after the last divider are the grid margins and fall away here.
fn interior_spans(dividers: &[u32]) -> Vec<(u32, u32)> {
    dividers.windows(2).map(|pair| (pair[0], pair[1])).collect()
}

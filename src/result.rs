use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScanError>;

#[derive(Debug, Error)]
pub enum ScanError {
    /// The confidence gate rejected the read. Pages hitting this are meant
    /// for manual review; retrying reproduces the same result.
    #[error("ambiguous identifier read (worst_ratio {worst_ratio:.3}, lightest {lightest:.3})")]
    AmbiguousRead { worst_ratio: f32, lightest: f32 },

    /// Line detection produced fewer hypotheses than the geometry step
    /// needs, i.e. there is not enough straight-line evidence in the image.
    #[error("not enough line evidence to locate {context}")]
    GeometryDetection { context: &'static str },

    #[error("crop region ({x}, {y}) {width}x{height} exceeds the page bounds")]
    CropOutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Pixel bounds of an extracted box in deskewed image coordinates.
/// `north < south` and `west < east` always hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoxBounds {
    pub north: u32,
    pub south: u32,
    pub west: u32,
    pub east: u32,
}

impl BoxBounds {
    pub fn width(&self) -> u32 {
        self.east - self.west
    }

    pub fn height(&self) -> u32 {
        self.south - self.north
    }
}

/// Top two density candidates for one digit column.
#[derive(Debug, Clone, Copy)]
pub struct ColumnScore {
    pub digit: char,
    pub top_density: f32,
    pub second_density: f32,
}

impl ColumnScore {
    /// Ratio of the strongest cell over the runner-up. A blank column is
    /// fully ambiguous (1.0); a column where only one cell holds ink is
    /// perfectly separated (infinity).
    pub fn separation(&self) -> f32 {
        if self.second_density > 0.0 {
            self.top_density / self.second_density
        } else if self.top_density > 0.0 {
            f32::INFINITY
        } else {
            1.0
        }
    }
}

/// A validated identifier read together with its per-column evidence.
///
/// `columns` is empty when the struck-through sentinel fired, since no
/// cells were scored in that case.
#[derive(Debug, Clone)]
pub struct Reading {
    pub text: String,
    pub columns: Vec<ColumnScore>,
}

impl Reading {
    /// Best column separation across the grid (the gate's `worst_ratio`).
    pub fn worst_ratio(&self) -> f32 {
        if self.columns.is_empty() {
            return f32::INFINITY;
        }
        self.columns
            .iter()
            .map(ColumnScore::separation)
            .fold(0.0_f32, f32::max)
    }

    /// Faintest winning mark across all columns.
    pub fn lightest(&self) -> f32 {
        self.columns
            .iter()
            .map(|column| column.top_density)
            .fold(1.0_f32, f32::min)
    }
}

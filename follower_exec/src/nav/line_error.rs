//! # Line error extraction
//!
//! Reduces a camera frame to the lateral (`rho`) and heading (`theta`) errors of the line. The
//! frame is first binarised into a mask where line pixels are 255, then the centroid of the line
//! pixels is found for each row.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use image::{GrayImage, Luma, RgbImage};
use serde::Serialize;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Value of line pixels in a binarised mask.
pub const LINE_PIXEL: u8 = 255;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Errors of the line relative to the centre of the frame.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
pub struct LineError {
    /// Mean line centroid minus half the frame width, in pixels. Positive to the right.
    pub rho_err: f64,

    /// Angle of the line between the first and last rows containing it, in radians.
    pub theta_err: f64,

    /// False if no row contains a line pixel.
    pub found: bool,
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Binarise a frame, marking pixels darker than `threshold` as line.
pub fn binarise(frame: &RgbImage, threshold: u8) -> GrayImage {
    let threshold = threshold as f64;

    GrayImage::from_fn(frame.width(), frame.height(), |x, y| {
        let p = frame.get_pixel(x, y).0;
        let gray = 0.299 * p[0] as f64 + 0.587 * p[1] as f64 + 0.114 * p[2] as f64;

        if gray < threshold {
            Luma([LINE_PIXEL])
        } else {
            Luma([0])
        }
    })
}

/// Extract the line error from a binarised mask. Any non-zero pixel counts as line.
pub fn extract(mask: &GrayImage) -> LineError {
    // (row, centroid) of every row containing the line
    let mut rows: Vec<(f64, f64)> = Vec::new();

    for (y, row) in mask.rows().enumerate() {
        let mut sum = 0u64;
        let mut count = 0u64;

        for (x, p) in row.enumerate() {
            if p.0[0] != 0 {
                sum += x as u64;
                count += 1;
            }
        }

        if count > 0 {
            rows.push((y as f64, sum as f64 / count as f64));
        }
    }

    let mean_centroid = match util::maths::mean(rows.iter().map(|r| r.1)) {
        Some(m) => m,
        None => return LineError::default(),
    };

    let theta_err = match (rows.first(), rows.last()) {
        (Some(first), Some(last)) if rows.len() > 1 => {
            (last.0 - first.0).atan2(last.1 - first.1)
        }
        _ => 0.0,
    };

    LineError {
        rho_err: mean_centroid - mask.width() as f64 / 2.0,
        theta_err,
        found: true,
    }
}

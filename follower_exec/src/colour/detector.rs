//! # Colour detection
//!
//! Measures how much of a frame is covered by a target colour. Pixels are converted to HSV with
//! hue in half-degrees (`0..180`) and saturation and value in `0..=255`, then tested against the
//! colour's range.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::tc::Colour;
use image::{Rgb, RgbImage};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Something which can measure colour coverage in a frame.
pub trait ColourDetector {
    /// Percentage of the frame's pixels which are `colour`, between 0 and 100.
    fn coverage_percent(&self, frame: &RgbImage, colour: Colour) -> f64;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Detects colours by thresholding in HSV space.
#[derive(Debug, Clone, Copy, Default)]
pub struct HsvColourDetector;

/// An inclusive HSV box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HsvRange {
    pub h_min: u8,
    pub h_max: u8,
    pub s_min: u8,
    pub v_min: u8,
}

/// A pixel in HSV space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsv {
    /// Hue in half-degrees, `0..180`
    pub h: u8,
    pub s: u8,
    pub v: u8,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ColourDetector for HsvColourDetector {
    fn coverage_percent(&self, frame: &RgbImage, colour: Colour) -> f64 {
        let num_pixels = frame.width() as u64 * frame.height() as u64;
        if num_pixels == 0 {
            return 0.0;
        }

        let ranges = colour_ranges(colour);
        let matching = frame
            .pixels()
            .filter(|p| {
                let hsv = Hsv::from(**p);
                ranges.iter().any(|r| r.contains(hsv))
            })
            .count();

        matching as f64 / num_pixels as f64 * 100.0
    }
}

impl HsvRange {
    const fn new(h_min: u8, h_max: u8, s_min: u8, v_min: u8) -> Self {
        Self {
            h_min,
            h_max,
            s_min,
            v_min,
        }
    }

    pub fn contains(&self, hsv: Hsv) -> bool {
        hsv.h >= self.h_min && hsv.h <= self.h_max && hsv.s >= self.s_min && hsv.v >= self.v_min
    }
}

impl From<Rgb<u8>> for Hsv {
    fn from(rgb: Rgb<u8>) -> Self {
        let [r, g, b] = rgb.0;
        let (rf, gf, bf) = (r as f64, g as f64, b as f64);

        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let delta = (max - min) as f64;
        let v = max as f64;

        let s = if max == 0 { 0.0 } else { 255.0 * delta / v };

        let mut h_deg = if delta == 0.0 {
            0.0
        } else if max == r {
            60.0 * (gf - bf) / delta
        } else if max == g {
            120.0 + 60.0 * (bf - rf) / delta
        } else {
            240.0 + 60.0 * (rf - gf) / delta
        };
        if h_deg < 0.0 {
            h_deg += 360.0;
        }

        // 360 degrees wraps back to a hue of 0
        let h = ((h_deg / 2.0).round() as u16 % 180) as u8;

        Hsv {
            h,
            s: s.round() as u8,
            v: max,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// HSV ranges for each colour. Red straddles hue 0 so has two.
pub fn colour_ranges(colour: Colour) -> &'static [HsvRange] {
    static RED: [HsvRange; 2] = [HsvRange::new(0, 10, 100, 100), HsvRange::new(170, 179, 100, 100)];
    static YELLOW: [HsvRange; 1] = [HsvRange::new(20, 30, 100, 100)];
    static BLUE: [HsvRange; 1] = [HsvRange::new(110, 120, 100, 100)];
    static GREEN: [HsvRange; 1] = [HsvRange::new(34, 85, 25, 25)];
    static PURPLE: [HsvRange; 1] = [HsvRange::new(130, 170, 43, 64)];

    match colour {
        Colour::Red => &RED,
        Colour::Yellow => &YELLOW,
        Colour::Blue => &BLUE,
        Colour::Green => &GREEN,
        Colour::Purple => &PURPLE,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_hsv_conversion() {
        assert_eq!(Hsv::from(Rgb([255, 0, 0])), Hsv { h: 0, s: 255, v: 255 });
        assert_eq!(Hsv::from(Rgb([0, 255, 0])), Hsv { h: 60, s: 255, v: 255 });
        assert_eq!(Hsv::from(Rgb([0, 0, 255])), Hsv { h: 120, s: 255, v: 255 });
        assert_eq!(Hsv::from(Rgb([255, 255, 0])), Hsv { h: 30, s: 255, v: 255 });
        assert_eq!(Hsv::from(Rgb([0, 0, 0])), Hsv { h: 0, s: 0, v: 0 });
        assert_eq!(Hsv::from(Rgb([128, 128, 128])), Hsv { h: 0, s: 0, v: 128 });

        // Just short of red going the other way round the wheel
        assert_eq!(Hsv::from(Rgb([255, 0, 20])).h, 178);
    }

    #[test]
    fn test_pure_colours_detected() {
        let det = HsvColourDetector;
        let cases = [
            (Rgb([255, 0, 0]), Colour::Red),
            (Rgb([255, 0, 20]), Colour::Red),
            (Rgb([255, 230, 0]), Colour::Yellow),
            (Rgb([0, 40, 255]), Colour::Blue),
            (Rgb([0, 200, 0]), Colour::Green),
            (Rgb([160, 0, 255]), Colour::Purple),
        ];

        for (rgb, colour) in cases.iter() {
            let frame = RgbImage::from_pixel(10, 10, *rgb);
            assert_eq!(
                det.coverage_percent(&frame, *colour),
                100.0,
                "{:?} not detected as {:?}",
                rgb,
                colour
            );
        }

        let white = RgbImage::from_pixel(10, 10, Rgb([255, 255, 255]));
        for colour in [Colour::Red, Colour::Yellow, Colour::Blue, Colour::Green, Colour::Purple]
            .iter()
        {
            assert_eq!(det.coverage_percent(&white, *colour), 0.0);
        }
    }

    #[test]
    fn test_coverage() {
        let mut frame = RgbImage::from_pixel(10, 10, Rgb([255, 255, 255]));
        for x in 0..10 {
            for y in 0..3 {
                frame.put_pixel(x, y, Rgb([0, 0, 255]));
            }
        }

        let det = HsvColourDetector;
        assert!((det.coverage_percent(&frame, Colour::Blue) - 30.0).abs() < 1e-9);
        assert_eq!(det.coverage_percent(&frame, Colour::Red), 0.0);
        assert_eq!(det.coverage_percent(&RgbImage::new(0, 0), Colour::Red), 0.0);
    }
}

//! # Colour detection task
//!
//! While a target colour is armed, each cycle captures a frame and tells the actuator controller
//! whether the colour covers enough of it. Once found the target is disarmed. Unarmed cycles do
//! nothing.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod detector;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, info, warn};
use serde::Deserialize;
use std::{sync::atomic::AtomicBool, time::Duration};
use thiserror::Error;

use crate::{
    actuator_client::CommandSink, cam_client::FrameSource, shared::TargetColourCell,
    task::run_periodic,
};

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use detector::{ColourDetector, HsvColourDetector};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Colour detection parameters, loaded from `colour_det.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct Params {
    /// Percentage of the frame the colour must cover to count as found
    pub detection_threshold_percent: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ParamsError {
    #[error("The detection threshold must be in (0, 100], found {0}")]
    InvalidThreshold(f64),
}

/// The outcome of a colour detection cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColourOutcome {
    /// No colour armed
    Idle,

    /// No frame could be acquired
    NoFrame,

    /// The target was checked
    Checked { coverage_percent: f64, found: bool },
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Params {
    /// Determines if the parameters are valid.
    pub fn are_valid(&self) -> Result<(), ParamsError> {
        let t = self.detection_threshold_percent;
        if t > 0.0 && t <= 100.0 {
            Ok(())
        } else {
            Err(ParamsError::InvalidThreshold(t))
        }
    }
}

impl Default for Params {
    fn default() -> Self {
        Self {
            detection_threshold_percent: 25.0,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Perform a single colour detection cycle.
pub fn colour_cycle<D, F, C>(
    params: &Params,
    target: &TargetColourCell,
    detector: &D,
    frames: &mut F,
    sink: &mut C,
) -> ColourOutcome
where
    D: ColourDetector,
    F: FrameSource,
    C: CommandSink,
{
    let colour = match target.get() {
        Some(c) => c,
        None => return ColourOutcome::Idle,
    };

    let frame = match frames.capture() {
        Ok(f) => f,
        Err(e) => {
            warn!("Could not acquire a colour detection frame: {}", e);
            return ColourOutcome::NoFrame;
        }
    };

    let coverage_percent = detector.coverage_percent(&frame, colour);
    let found = coverage_percent >= params.detection_threshold_percent;

    debug!("{:?} covers {:.1} % of the frame", colour, coverage_percent);

    if let Err(e) = sink.send_colour(found) {
        warn!("Could not send the colour trigger: {}", e);
    }

    if found {
        info!("Target colour {:?} found", colour);

        if !target.clear_if(colour) {
            info!("Target colour changed while detecting, keeping the new target armed");
        }
    }

    ColourOutcome::Checked {
        coverage_percent,
        found,
    }
}

/// Run the colour detection task until `running` is cleared.
pub fn run_colour_task<D, F, C>(
    params: Params,
    target: &TargetColourCell,
    detector: D,
    mut frames: F,
    mut sink: C,
    period: Duration,
    running: &AtomicBool,
) where
    D: ColourDetector,
    F: FrameSource,
    C: CommandSink,
{
    run_periodic("Colour", period, running, || {
        colour_cycle(&params, target, &detector, &mut frames, &mut sink);
    });
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fakes::{FakeFrames, RecordingSink};
    use comms_if::tc::Colour;
    use image::{Rgb, RgbImage};

    /// 10x10 white frame with the top `rows` rows blue.
    fn blue_rows(rows: u32) -> RgbImage {
        let mut frame = RgbImage::from_pixel(10, 10, Rgb([255, 255, 255]));
        for y in 0..rows {
            for x in 0..10 {
                frame.put_pixel(x, y, Rgb([0, 0, 255]));
            }
        }
        frame
    }

    #[test]
    fn test_param_file() {
        let p: Params =
            util::params::from_str(include_str!("../../../params/colour_det.toml")).unwrap();

        assert!(p.are_valid().is_ok());
        assert!((p.detection_threshold_percent - 25.0).abs() < 1e-12);
    }

    #[test]
    fn test_idle_when_unarmed() {
        let target = TargetColourCell::new();
        let mut frames = FakeFrames::new(vec![blue_rows(10)]);
        let mut sink = RecordingSink::default();

        let outcome = colour_cycle(
            &Params::default(),
            &target,
            &HsvColourDetector,
            &mut frames,
            &mut sink,
        );

        assert_eq!(outcome, ColourOutcome::Idle);
        assert_eq!(frames.captures, 0);
        assert!(sink.colour.is_empty());
    }

    #[test]
    fn test_found_disarms() {
        let target = TargetColourCell::new();
        target.set(Colour::Blue);

        let mut frames = FakeFrames::new(vec![
            blue_rows(0),
            blue_rows(1),
            blue_rows(2),
            blue_rows(3),
        ]);
        let mut sink = RecordingSink::default();
        let params = Params::default();

        for _ in 0..3 {
            colour_cycle(&params, &target, &HsvColourDetector, &mut frames, &mut sink);
        }
        assert_eq!(sink.colour, vec![false, false, false]);
        assert_eq!(target.get(), Some(Colour::Blue));

        // 30 % covered, above the 25 % threshold
        let outcome = colour_cycle(&params, &target, &HsvColourDetector, &mut frames, &mut sink);
        match outcome {
            ColourOutcome::Checked {
                coverage_percent,
                found,
            } => {
                assert!(found);
                assert!((coverage_percent - 30.0).abs() < 1e-9);
            }
            o => panic!("Unexpected outcome {:?}", o),
        }
        assert_eq!(sink.colour, vec![false, false, false, true]);
        assert_eq!(target.get(), None);

        // Disarmed, nothing more is sent
        colour_cycle(&params, &target, &HsvColourDetector, &mut frames, &mut sink);
        assert_eq!(sink.colour.len(), 4);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let target = TargetColourCell::new();
        target.set(Colour::Blue);

        let params = Params {
            detection_threshold_percent: 20.0,
        };
        let mut frames = FakeFrames::new(vec![blue_rows(2)]);
        let mut sink = RecordingSink::default();

        colour_cycle(&params, &target, &HsvColourDetector, &mut frames, &mut sink);
        assert_eq!(sink.colour, vec![true]);
    }

    #[test]
    fn test_no_frame() {
        let target = TargetColourCell::new();
        target.set(Colour::Red);
        let mut sink = RecordingSink::default();

        let outcome = colour_cycle(
            &Params::default(),
            &target,
            &HsvColourDetector,
            &mut FakeFrames::default(),
            &mut sink,
        );

        assert_eq!(outcome, ColourOutcome::NoFrame);
        assert!(sink.colour.is_empty());
        assert_eq!(target.get(), Some(Colour::Red));
    }

    #[test]
    fn test_params() {
        assert!(Params::default().are_valid().is_ok());
        assert!(Params {
            detection_threshold_percent: 0.0
        }
        .are_valid()
        .is_err());
    }
}

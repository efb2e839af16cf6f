//! # Navigation
//!
//! Follows the line. Each cycle a frame is reduced to the line's lateral and heading errors,
//! which NavCtrl turns into a command for the actuator controller.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod line_error;
pub mod nav_ctrl;
mod params;
pub mod pid;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::actuator::NavCmd;
use log::warn;
use std::{sync::atomic::AtomicBool, time::Duration};
use util::{archive::Archiver, module::State};

use crate::{actuator_client::CommandSink, cam_client::FrameSource, task::run_periodic};

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use line_error::LineError;
pub use nav_ctrl::{InputData, NavCtrl, NavCtrlError, NavState, StatusReport};
pub use params::{Params, ParamsError};
pub use pid::PidController;

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Perform a single navigation cycle.
///
/// Returns the command sent, or `None` if no frame could be acquired. Failing to deliver the
/// command is logged and not retried.
pub fn nav_cycle<F, C>(
    nav_ctrl: &mut NavCtrl,
    frames: &mut F,
    sink: &mut C,
) -> Option<(NavCmd, StatusReport)>
where
    F: FrameSource,
    C: CommandSink,
{
    let frame = match frames.capture() {
        Ok(f) => f,
        Err(e) => {
            warn!("Could not acquire a navigation frame: {}", e);
            return None;
        }
    };

    let input = InputData {
        line_error: nav_ctrl.line_error(&frame),
    };

    let (cmd, report) = match nav_ctrl.proc(&input) {
        Ok(o) => o,
        Err(e) => {
            warn!("Error during NavCtrl processing: {}", e);
            return None;
        }
    };

    if let Err(e) = sink.send_nav(cmd) {
        warn!("Could not send {:?} to the actuator controller: {}", cmd, e);
    }

    Some((cmd, report))
}

/// Run the navigation task until `running` is cleared.
pub fn run_nav_task<F, C>(
    mut nav_ctrl: NavCtrl,
    mut frames: F,
    mut sink: C,
    period: Duration,
    running: &AtomicBool,
    mut archiver: Option<Archiver>,
) where
    F: FrameSource,
    C: CommandSink,
{
    run_periodic("Navigation", period, running, || {
        let report = match nav_cycle(&mut nav_ctrl, &mut frames, &mut sink) {
            Some((_, r)) => r,
            None => return,
        };

        if let Some(ref mut arch) = archiver {
            if let Err(e) = arch.serialise(&report) {
                warn!("Could not archive the NavCtrl report: {}", e);
            }
        }
    });
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        actuator_client::ActuatorClientError,
        fakes::{FakeFrames, RecordingSink},
    };
    use image::{Rgb, RgbImage};
    use std::sync::atomic::Ordering;

    fn line_at(x: u32) -> RgbImage {
        let mut frame = RgbImage::from_pixel(100, 40, Rgb([230, 230, 230]));
        for y in 0..40 {
            frame.put_pixel(x, y, Rgb([5, 5, 5]));
        }
        frame
    }

    #[test]
    fn test_nav_cycles() {
        let mut nav = NavCtrl::default();
        let mut frames = FakeFrames::new(vec![
            RgbImage::from_pixel(100, 40, Rgb([230, 230, 230])),
            line_at(80),
            line_at(51),
        ]);
        let mut sink = RecordingSink::default();

        let (cmd, report) = nav_cycle(&mut nav, &mut frames, &mut sink).unwrap();
        assert_eq!(cmd, NavCmd::NoLine);
        assert_eq!(report.state, NavState::Searching);

        let (cmd, report) = nav_cycle(&mut nav, &mut frames, &mut sink).unwrap();
        assert!(matches!(cmd, NavCmd::Move { .. }));
        assert_eq!(report.rho_err, 30.0);

        let (cmd, _) = nav_cycle(&mut nav, &mut frames, &mut sink).unwrap();
        assert_eq!(cmd, NavCmd::Stop);

        assert_eq!(sink.nav.len(), 3);
        assert_eq!(sink.nav[0], NavCmd::NoLine);
        assert_eq!(sink.nav[2], NavCmd::Stop);
    }

    #[test]
    fn test_failures_do_not_stop_the_cycle() {
        let mut nav = NavCtrl::default();
        let mut sink = RecordingSink {
            fail: true,
            ..Default::default()
        };

        // No frame available
        let mut frames = FakeFrames::default();
        assert!(nav_cycle(&mut nav, &mut frames, &mut sink).is_none());

        // Command not delivered, still produced
        let mut frames = FakeFrames::new(vec![line_at(90)]);
        assert!(nav_cycle(&mut nav, &mut frames, &mut sink).is_some());
        assert!(sink.nav.is_empty());
    }

    /// Clears the running flag once enough commands have been sent.
    struct StopAfter<'a> {
        running: &'a AtomicBool,
        remaining: usize,
    }

    impl<'a> CommandSink for StopAfter<'a> {
        fn send_nav(&mut self, _cmd: NavCmd) -> Result<(), ActuatorClientError> {
            self.remaining -= 1;
            if self.remaining == 0 {
                self.running.store(false, Ordering::Relaxed);
            }
            Ok(())
        }

        fn send_colour(&mut self, _found: bool) -> Result<(), ActuatorClientError> {
            Ok(())
        }
    }

    #[test]
    fn test_nav_task_runs_until_cancelled() {
        let running = AtomicBool::new(true);
        let mut frames = FakeFrames::new(vec![line_at(90)]);

        run_nav_task(
            NavCtrl::default(),
            &mut frames,
            StopAfter {
                running: &running,
                remaining: 4,
            },
            Duration::from_millis(1),
            &running,
            None,
        );

        assert_eq!(frames.captures, 4);
    }
}

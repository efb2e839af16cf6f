//! Deterministic stand-ins for the executive's external collaborators.

use comms_if::eqpt::actuator::NavCmd;
use image::RgbImage;
use std::collections::VecDeque;

use crate::{
    actuator_client::{ActuatorClientError, CommandSink},
    cam_client::{CamClientError, FrameSource},
};

/// Returns queued frames, then a repeat of the last one. Errors when nothing was queued.
#[derive(Default)]
pub struct FakeFrames {
    pub frames: VecDeque<RgbImage>,
    pub last: Option<RgbImage>,
    pub captures: usize,
}

impl FakeFrames {
    pub fn new(frames: Vec<RgbImage>) -> Self {
        Self {
            frames: frames.into(),
            ..Default::default()
        }
    }
}

impl FrameSource for FakeFrames {
    fn capture(&mut self) -> Result<RgbImage, CamClientError> {
        self.captures += 1;

        if let Some(f) = self.frames.pop_front() {
            self.last = Some(f);
        }

        self.last.clone().ok_or(CamClientError::NotConnected)
    }
}

/// Records everything sent, optionally failing every send.
#[derive(Default)]
pub struct RecordingSink {
    pub nav: Vec<NavCmd>,
    pub colour: Vec<bool>,
    pub fail: bool,
}

impl CommandSink for RecordingSink {
    fn send_nav(&mut self, cmd: NavCmd) -> Result<(), ActuatorClientError> {
        if self.fail {
            return Err(ActuatorClientError::NotConnected);
        }
        self.nav.push(cmd);
        Ok(())
    }

    fn send_colour(&mut self, found: bool) -> Result<(), ActuatorClientError> {
        if self.fail {
            return Err(ActuatorClientError::NotConnected);
        }
        self.colour.push(found);
        Ok(())
    }
}

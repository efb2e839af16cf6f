//! # Shared state
//!
//! State shared between the executive's tasks. Each value has a single writer:
//!
//! - [`SnapshotCell`] holds the latest battery snapshot, written by the power task and read by
//!   the telecommand handler.
//! - [`TargetColourCell`] holds the armed target colour, written by the telecommand handler and
//!   cleared by the colour task once the colour is found.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::tc::Colour;
use std::sync::{
    atomic::{AtomicU8, Ordering},
    Arc, PoisonError, RwLock,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Holds the most recently published value.
///
/// Values are published whole behind an `Arc`, so a reader always sees one complete value and
/// only holds the lock long enough to clone the pointer.
#[derive(Debug)]
pub struct SnapshotCell<T> {
    latest: RwLock<Option<Arc<T>>>,
}

/// The colour the colour detection task is looking for, if any.
#[derive(Debug, Default)]
pub struct TargetColourCell(AtomicU8);

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<T> SnapshotCell<T> {
    pub fn new() -> Self {
        Self {
            latest: RwLock::new(None),
        }
    }

    /// Replace the current value.
    pub fn publish(&self, value: T) -> Arc<T> {
        let value = Arc::new(value);

        // A panicking writer cannot leave a partial value behind, so poisoning is ignored
        let mut latest = self.latest.write().unwrap_or_else(PoisonError::into_inner);
        *latest = Some(value.clone());

        value
    }

    /// Get the current value, `None` if nothing has been published yet.
    pub fn latest(&self) -> Option<Arc<T>> {
        self.latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl<T> Default for SnapshotCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl TargetColourCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm detection for `colour`, replacing any previous target.
    pub fn set(&self, colour: Colour) {
        self.0.store(encode(Some(colour)), Ordering::Release);
    }

    /// Disarm detection.
    pub fn clear(&self) {
        self.0.store(encode(None), Ordering::Release);
    }

    /// Disarm detection only if `colour` is still the target.
    ///
    /// Returns `false` if the target was changed in the meantime, in which case the new target
    /// stays armed.
    pub fn clear_if(&self, colour: Colour) -> bool {
        self.0
            .compare_exchange(
                encode(Some(colour)),
                encode(None),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub fn get(&self) -> Option<Colour> {
        decode(self.0.load(Ordering::Acquire))
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn encode(colour: Option<Colour>) -> u8 {
    match colour {
        None => 0,
        Some(Colour::Red) => 1,
        Some(Colour::Yellow) => 2,
        Some(Colour::Blue) => 3,
        Some(Colour::Green) => 4,
        Some(Colour::Purple) => 5,
    }
}

fn decode(value: u8) -> Option<Colour> {
    match value {
        1 => Some(Colour::Red),
        2 => Some(Colour::Yellow),
        3 => Some(Colour::Blue),
        4 => Some(Colour::Green),
        5 => Some(Colour::Purple),
        _ => None,
    }
}

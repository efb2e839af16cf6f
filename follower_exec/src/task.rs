//! # Periodic tasks
//!
//! Every task in the executive runs a fixed-period cycle. The runner measures each cycle, sleeps
//! for the remainder of the period, and warns when a cycle overruns.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{info, warn};
use std::{
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::{Duration, Instant},
};

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Run `cycle` once per `period` until `running` is cleared.
///
/// The flag is checked at the start of every cycle. Returns the number of cycles run.
pub fn run_periodic<F>(name: &str, period: Duration, running: &AtomicBool, mut cycle: F) -> u64
where
    F: FnMut(),
{
    let mut num_cycles = 0u64;

    info!("{} task started with a {:.03} s period", name, period.as_secs_f64());

    while running.load(Ordering::Relaxed) {
        let cycle_start_instant = Instant::now();

        cycle();
        num_cycles += 1;

        let cycle_dur = Instant::now() - cycle_start_instant;

        match period.checked_sub(cycle_dur) {
            Some(d) => thread::sleep(d),
            None => warn!(
                "{} cycle overran by {:.06} s",
                name,
                cycle_dur.as_secs_f64() - period.as_secs_f64()
            ),
        }
    }

    info!("{} task stopped after {} cycles", name, num_cycles);

    num_cycles
}

//! # Power monitoring
//!
//! Estimates the battery's state of charge by fusing Coulomb counting with a voltage lookup
//! curve. The accumulated charge survives restarts through a [`ChargeStore`].

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod accumulator;
pub mod adc;
pub mod estimator;
mod params;
pub mod soc_curve;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::Utc;
use comms_if::tc::BatteryReset;
use log::warn;
use std::{
    sync::{atomic::AtomicBool, mpsc::Receiver},
    time::Duration,
};
use util::archive::Archiver;

use crate::task::run_periodic;

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use accumulator::{ChargeAccumulator, ChargeStore, FileChargeStore, PersistenceError};
pub use adc::{SensorError, SimVoltageSource, VoltageSource};
pub use estimator::{ElecSample, PowerError, PowerEstimator};
pub use params::{Params, ParamsError};
pub use soc_curve::{SocCurve, SocCurveError};

#[cfg(target_arch = "arm")]
pub use adc::Mcp3208;

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Run the power monitoring task until `running` is cleared.
///
/// Waits for a battery to be detected, then ticks the estimator once per `period`. Resets
/// received on `resets` are applied at the start of the next tick. The accumulator is flushed
/// before returning.
pub fn run_power_task<V, S>(
    mut estimator: PowerEstimator<V, S>,
    period: Duration,
    resets: Receiver<BatteryReset>,
    running: &AtomicBool,
    mut archiver: Option<Archiver>,
) where
    V: VoltageSource,
    S: ChargeStore,
{
    if estimator.wait_for_battery(running) {
        run_periodic("Power", period, running, || {
            let now = Utc::now();

            while let Ok(reset) = resets.try_recv() {
                estimator.apply_reset(reset, now);
            }

            estimator.tick(now);

            if let (Some(arch), Some(sample)) = (archiver.as_mut(), estimator.last_sample()) {
                if let Err(e) = arch.serialise(sample) {
                    warn!("Could not archive the power sample: {}", e);
                }
            }
        });
    }

    estimator.shutdown();
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::shared::SnapshotCell;
    use super::accumulator::test::MemStore;
    use std::{
        sync::{atomic::Ordering, mpsc, Arc},
        thread,
    };

    #[test]
    fn test_power_task() {
        let store = MemStore::with(1500.0);
        let cell = Arc::new(SnapshotCell::new());
        let running = Arc::new(AtomicBool::new(true));
        let (reset_tx, reset_rx) = mpsc::channel();

        let estimator = PowerEstimator::new(
            Params::default(),
            SimVoltageSource::new(&[4.2, 0.5, 0.2, 2.5]),
            store.clone(),
            cell.clone(),
        )
        .unwrap();

        reset_tx.send(BatteryReset::ToFull).unwrap();

        let handle = {
            let running = running.clone();
            thread::spawn(move || {
                run_power_task(
                    estimator,
                    Duration::from_millis(5),
                    reset_rx,
                    &running,
                    None,
                )
            })
        };

        thread::sleep(Duration::from_millis(50));
        running.store(false, Ordering::Relaxed);
        handle.join().unwrap();

        // Reset applied, then a few ms of roughly 0.56 A drawn
        let stored = store.value.lock().unwrap().unwrap();
        assert!(stored >= 0.0 && stored < 1.0);
        assert!(cell.latest().unwrap().charge_soc_percent > 99.9);
        assert!(*store.saves.lock().unwrap() >= 3);
    }
}

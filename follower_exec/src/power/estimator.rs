//! # Power estimator
//!
//! Each tick the estimator samples the ADC, derives the motor and logic rail currents, voltages
//! and powers, integrates the battery current into the charge accumulator and publishes a new
//! battery snapshot.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use comms_if::{eqpt::power::BatteryTm, tc::BatteryReset};
use log::{debug, info, trace, warn};
use serde::Serialize;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};
use thiserror::Error;

use super::{
    accumulator::{ChargeAccumulator, ChargeStore},
    adc::{VoltageSource, NUM_ADC_CHANNELS},
    params::{Params, ParamsError},
    soc_curve::SocCurve,
};
use crate::shared::SnapshotCell;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Estimates the battery state from ADC measurements.
pub struct PowerEstimator<V: VoltageSource, S: ChargeStore> {
    params: Params,

    source: V,

    curve: SocCurve,

    accumulator: ChargeAccumulator<S>,

    /// Last successful reading of each channel, in ADC Volts
    last_good_v: [f64; NUM_ADC_CHANNELS],

    last_sample: Option<ElecSample>,

    snapshot: Arc<SnapshotCell<BatteryTm>>,
}

/// Electrical quantities derived from one set of ADC readings.
///
/// This is also the record written to the power archive, so it stays flat.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct ElecSample {
    /// Seconds since the session epoch
    pub time_s: f64,
    pub battery_voltage_v: f64,
    pub motor_current_a: f64,
    pub motor_voltage_v: f64,
    pub motor_power_w: f64,
    pub logic_current_a: f64,
    pub logic_voltage_v: f64,
    pub logic_power_w: f64,
    /// Current drawn from the battery
    pub battery_current_ma: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PowerError {
    #[error("Invalid power estimation parameters: {0}")]
    InvalidParams(ParamsError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<V: VoltageSource, S: ChargeStore> PowerEstimator<V, S> {
    /// Create a new estimator, loading the accumulated charge from `store`.
    pub fn new(
        params: Params,
        source: V,
        store: S,
        snapshot: Arc<SnapshotCell<BatteryTm>>,
    ) -> Result<Self, PowerError> {
        params.are_valid().map_err(PowerError::InvalidParams)?;
        let curve = params.soc_curve().map_err(PowerError::InvalidParams)?;

        let accumulator = ChargeAccumulator::load(params.capacity_mah, store);
        info!(
            "Loaded accumulated charge of {:.1} mAh ({:.1} %)",
            accumulator.accumulated_mah(),
            accumulator.charge_based_soc()
        );

        Ok(Self {
            params,
            source,
            curve,
            accumulator,
            last_good_v: [0.0; NUM_ADC_CHANNELS],
            last_sample: None,
            snapshot,
        })
    }

    /// Block until a battery is detected or `running` is cleared.
    ///
    /// Returns `true` if a battery was detected.
    pub fn wait_for_battery(&mut self, running: &AtomicBool) -> bool {
        while running.load(Ordering::Relaxed) {
            let vb = self.read_channel(self.params.battery_voltage_channel)
                * self.params.battery_voltage_divider;

            if vb > self.params.detect_voltage_v {
                info!("Battery detected at {:.2} V", vb);
                return true;
            }

            warn!("Voltage not detected or low battery ({:.2} V)", vb);
            thread::sleep(Duration::from_secs_f64(self.params.detect_retry_s));
        }

        false
    }

    /// Sample the ADC and derive the electrical quantities.
    pub fn sample(&mut self) -> ElecSample {
        let p = &self.params;
        let (vb_ch, vom_ch, vol_ch, vl_ch) = (
            p.battery_voltage_channel,
            p.motor_current_channel,
            p.logic_current_channel,
            p.logic_voltage_channel,
        );

        let vb = self.read_channel(vb_ch) * self.params.battery_voltage_divider;
        let vom = self.read_channel(vom_ch);
        let vol = self.read_channel(vol_ch);
        let vl = self.read_channel(vl_ch) * self.params.logic_voltage_divider;

        let p = &self.params;
        let im = vom * p.motor_vtoi;
        let vm = vb - p.shunt_resistance_ohm * im;
        let il = vol * p.logic_vtoi;

        // Logic rail current as seen by the battery, through the converter
        let il_bat = if vb > 0.0 {
            il * (vl / vb) * p.converter_efficiency
        } else {
            0.0
        };

        let sample = ElecSample {
            time_s: util::session::get_elapsed_seconds(),
            battery_voltage_v: vb,
            motor_current_a: im,
            motor_voltage_v: vm,
            motor_power_w: im * vm,
            logic_current_a: il,
            logic_voltage_v: vl,
            logic_power_w: il * vl,
            battery_current_ma: (im + il_bat) * 1000.0,
        };

        trace!("Power sample: {:?}", sample);

        self.last_sample = Some(sample);
        sample
    }

    /// Perform one estimation tick.
    ///
    /// The accumulator is persisted before the new snapshot is published.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Arc<BatteryTm> {
        let sample = self.sample();

        self.accumulator.tick_to(sample.battery_current_ma, now);
        self.persist();

        let snapshot = self.publish(&sample, now);

        debug!(
            "Battery {:.2} V, charge SOC {:.1} %, voltage SOC {:.1} %, motor {:.2} W, logic {:.2} W",
            snapshot.battery_voltage_v,
            snapshot.charge_soc_percent,
            snapshot.voltage_soc_percent,
            snapshot.motor_power_w,
            snapshot.logic_power_w
        );

        snapshot
    }

    /// Apply a reset of the accumulator, then persist and republish.
    pub fn apply_reset(&mut self, reset: BatteryReset, now: DateTime<Utc>) -> Arc<BatteryTm> {
        let sample = self.sample();

        match reset {
            BatteryReset::ToFull => self.accumulator.reset_to_full(),
            BatteryReset::BasedOnVoltage => {
                let soc = self.voltage_soc(sample.battery_voltage_v);
                self.accumulator.reset_to_voltage_estimate(soc);
            }
        }

        // Charge drawn before the reset is already accounted for by the reset
        self.accumulator.tick_to(0.0, now);

        info!(
            "Battery reset ({:?}), charge SOC now {:.1} %",
            reset,
            self.accumulator.charge_based_soc()
        );

        self.persist();
        self.publish(&sample, now)
    }

    /// Flush the accumulator on shutdown.
    ///
    /// Nothing is written if no tick or reset ran, so a value which could not be read at startup
    /// is not overwritten by the default.
    pub fn shutdown(&mut self) {
        if self.accumulator.is_modified() {
            self.persist();
        } else {
            debug!("Accumulated charge unchanged since startup, not flushing");
        }
        info!(
            "Power estimator stopped with {:.1} mAh accumulated",
            self.accumulator.accumulated_mah()
        );
    }

    /// Voltage based state of charge for the given battery voltage.
    pub fn voltage_soc(&self, battery_voltage_v: f64) -> f64 {
        100.0 - self.curve.lookup(battery_voltage_v)
    }

    pub fn accumulator(&self) -> &ChargeAccumulator<S> {
        &self.accumulator
    }

    pub fn last_sample(&self) -> Option<&ElecSample> {
        self.last_sample.as_ref()
    }

    /// Read a channel, falling back to its last good value on failure.
    fn read_channel(&mut self, channel: u8) -> f64 {
        match self.source.read(channel) {
            Ok(v) => {
                if let Some(last) = self.last_good_v.get_mut(channel as usize) {
                    *last = v;
                }
                v
            }
            Err(e) => {
                let fallback = self
                    .last_good_v
                    .get(channel as usize)
                    .copied()
                    .unwrap_or(0.0);
                warn!("{}, using last good value {:.3} V", e, fallback);
                fallback
            }
        }
    }

    fn persist(&mut self) {
        if let Err(e) = self.accumulator.persist() {
            warn!("Could not persist the battery charge: {}", e);
        }
    }

    fn publish(&self, sample: &ElecSample, now: DateTime<Utc>) -> Arc<BatteryTm> {
        self.snapshot.publish(BatteryTm {
            charge_soc_percent: self.accumulator.charge_based_soc(),
            voltage_soc_percent: self.voltage_soc(sample.battery_voltage_v),
            motor_power_w: sample.motor_power_w,
            logic_power_w: sample.logic_power_w,
            battery_voltage_v: sample.battery_voltage_v,
            timestamp: now,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::power::{
        accumulator::test::MemStore,
        adc::{SensorError, SimVoltageSource},
    };

    /// Battery at 16.8 V, 0.5 A motors, 0.2 A logic rail at 5 V.
    fn nominal_source() -> SimVoltageSource {
        SimVoltageSource::new(&[4.2, 0.5, 0.2, 2.5])
    }

    fn estimator<V: VoltageSource>(
        source: V,
        store: MemStore,
    ) -> (PowerEstimator<V, MemStore>, Arc<SnapshotCell<BatteryTm>>) {
        let cell = Arc::new(SnapshotCell::new());
        let est = PowerEstimator::new(Params::default(), source, store, cell.clone()).unwrap();
        (est, cell)
    }

    /// Source whose motor current channel fails after the first read.
    struct FlakySource {
        inner: SimVoltageSource,
        motor_reads: usize,
    }

    impl VoltageSource for FlakySource {
        fn read(&mut self, channel: u8) -> Result<f64, SensorError> {
            if channel == 1 {
                self.motor_reads += 1;
                if self.motor_reads > 1 {
                    return Err(SensorError::BusError("timeout".into()));
                }
            }
            self.inner.read(channel)
        }
    }

    /// Source whose battery voltage steps down on every read.
    struct RampSource {
        vb: f64,
    }

    impl VoltageSource for RampSource {
        fn read(&mut self, channel: u8) -> Result<f64, SensorError> {
            match channel {
                0 => {
                    self.vb -= 0.0001;
                    if self.vb < 2.5 {
                        self.vb = 4.2;
                    }
                    Ok(self.vb)
                }
                1 => Ok(self.vb / 10.0),
                _ => Ok(0.0),
            }
        }
    }

    #[test]
    fn test_electrical_model() {
        let (mut est, _) = estimator(nominal_source(), MemStore::default());
        let s = est.sample();

        // Readings are quantised to the ADC's resolution
        let tol = 0.01;
        assert!((s.battery_voltage_v - 16.8).abs() < tol);
        assert!((s.motor_current_a - 0.5).abs() < tol);
        assert!((s.motor_voltage_v - (s.battery_voltage_v - 0.01 * s.motor_current_a)).abs() < 1e-9);
        assert!((s.motor_power_w - s.motor_current_a * s.motor_voltage_v).abs() < 1e-9);
        assert!((s.motor_power_w - 0.5 * 16.795).abs() < 0.05);
        assert!((s.logic_voltage_v - 5.0).abs() < tol);
        assert!((s.logic_power_w - 1.0).abs() < tol);

        let expected_ma = (0.5 + 0.2 * (5.0 / 16.8) * 0.93) * 1000.0;
        assert!((s.battery_current_ma - expected_ma).abs() < 2.0);
    }

    #[test]
    fn test_no_battery_voltage() {
        let (mut est, _) = estimator(
            SimVoltageSource::new(&[0.0, 0.0, 0.2, 2.5]),
            MemStore::default(),
        );
        let s = est.sample();

        assert_eq!(s.battery_voltage_v, 0.0);
        assert_eq!(s.battery_current_ma, 0.0);
    }

    #[test]
    fn test_tick_publishes_and_persists() {
        let store = MemStore::with(0.0);
        let (mut est, cell) = estimator(nominal_source(), store.clone());
        assert!(cell.latest().is_none());

        let t0 = Utc::now();
        let first = est.tick(t0);
        assert_eq!(first.charge_soc_percent, 100.0);
        assert!(first.voltage_soc_percent > 99.0);
        assert_eq!(*store.saves.lock().unwrap(), 1);

        let second = est.tick(t0 + chrono::Duration::hours(1));
        let drawn = est.accumulator().accumulated_mah();
        assert!(drawn > 500.0 && drawn < 600.0);
        assert_eq!(*store.value.lock().unwrap(), Some(drawn));
        assert_eq!(*store.saves.lock().unwrap(), 2);

        assert_eq!(*cell.latest().unwrap(), *second);
        assert!(second.charge_soc_percent < first.charge_soc_percent);
    }

    #[test]
    fn test_shutdown_only_flushes_changes() {
        // Nothing loaded, the accumulator holds the default
        let store = MemStore::default();
        let (mut est, _) = estimator(nominal_source(), store.clone());

        est.shutdown();
        assert_eq!(*store.saves.lock().unwrap(), 0);
        assert_eq!(*store.value.lock().unwrap(), None);

        let (mut est, _) = estimator(nominal_source(), store.clone());
        est.tick(Utc::now());
        let saves = *store.saves.lock().unwrap();

        est.shutdown();
        assert_eq!(*store.saves.lock().unwrap(), saves + 1);
    }

    #[test]
    fn test_persist_failure_is_not_fatal() {
        let store = MemStore {
            fail: true,
            ..MemStore::with(100.0)
        };
        let (mut est, cell) = estimator(nominal_source(), store);

        let t0 = Utc::now();
        est.tick(t0);
        est.tick(t0 + chrono::Duration::hours(1));

        assert!(est.accumulator().accumulated_mah() > 600.0);
        assert!(cell.latest().is_some());
    }

    #[test]
    fn test_resets() {
        let store = MemStore::default();
        let (mut est, cell) = estimator(
            SimVoltageSource::new(&[14.775 / 4.0, 0.5, 0.2, 2.5]),
            store.clone(),
        );

        let now = Utc::now();
        let tm = est.tick(now);
        assert_eq!(tm.charge_soc_percent, 0.0);

        let tm = est.apply_reset(BatteryReset::ToFull, now);
        assert_eq!(tm.charge_soc_percent, 100.0);
        assert_eq!(*store.value.lock().unwrap(), Some(0.0));
        assert_eq!(cell.latest().unwrap().charge_soc_percent, 100.0);

        // 14.775 V is half way down the discharge curve
        let tm = est.apply_reset(BatteryReset::BasedOnVoltage, now);
        assert!((tm.charge_soc_percent - 50.0).abs() < 0.5);
        assert!((tm.charge_soc_percent - tm.voltage_soc_percent).abs() < 1e-9);
    }

    #[test]
    fn test_sensor_failure_uses_last_good_value() {
        let source = FlakySource {
            inner: nominal_source(),
            motor_reads: 0,
        };
        let (mut est, _) = estimator(source, MemStore::default());

        let first = est.sample();
        let second = est.sample();

        assert_eq!(first.motor_current_a, second.motor_current_a);
        assert!((second.motor_current_a - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_wait_for_battery() {
        let running = AtomicBool::new(true);

        let (mut est, _) = estimator(nominal_source(), MemStore::default());
        assert!(est.wait_for_battery(&running));

        let mut params = Params::default();
        params.detect_retry_s = 0.001;
        let mut est = PowerEstimator::new(
            params,
            SimVoltageSource::new(&[2.0]),
            MemStore::default(),
            Arc::new(SnapshotCell::new()),
        )
        .unwrap();

        running.store(false, Ordering::Relaxed);
        assert!(!est.wait_for_battery(&running));
    }

    #[test]
    fn test_snapshots_never_mix_ticks() {
        let cell = Arc::new(SnapshotCell::new());
        let curve = Params::default().soc_curve().unwrap();
        let done = Arc::new(AtomicBool::new(false));

        let writer = {
            let cell = cell.clone();
            let done = done.clone();
            thread::spawn(move || {
                let mut est = PowerEstimator::new(
                    Params::default(),
                    RampSource { vb: 4.2 },
                    MemStore::default(),
                    cell,
                )
                .unwrap();

                let t0 = Utc::now();
                for i in 0..5000 {
                    est.tick(t0 + chrono::Duration::milliseconds(i));
                }
                done.store(true, Ordering::Relaxed);
            })
        };

        let readers: Vec<_> = (0..3)
            .map(|_| {
                let cell = cell.clone();
                let done = done.clone();
                let curve = curve.clone();
                thread::spawn(move || {
                    let mut checked = 0usize;
                    while !done.load(Ordering::Relaxed) || checked == 0 {
                        if let Some(tm) = cell.latest() {
                            let vb = tm.battery_voltage_v;
                            let im = vb / 40.0;
                            assert!(
                                (tm.voltage_soc_percent - (100.0 - curve.lookup(vb))).abs()
                                    < 1e-9
                            );
                            assert!((tm.motor_power_w - im * (vb - 0.01 * im)).abs() < 1e-9);
                            checked += 1;
                        }
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for r in readers {
            r.join().unwrap();
        }
    }
}

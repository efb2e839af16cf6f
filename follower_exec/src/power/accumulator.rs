//! # Charge accumulator
//!
//! Coulomb counter which integrates the battery current over wall-clock time. The accumulated
//! value is the charge drawn from the battery since it was last full, in mAh, so that `0` means a
//! full battery and `capacity_mah` an empty one.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use log::warn;
use std::{
    fs::{self, File},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};
use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Extension appended to the charge file's name while a new value is written.
const TMP_EXTENSION: &str = "tmp";

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Durable storage for a single accumulated charge value.
pub trait ChargeStore {
    /// Load the stored charge. `Ok(None)` if nothing has been stored yet.
    fn load(&mut self) -> Result<Option<f64>, PersistenceError>;

    /// Overwrite the stored charge.
    fn save(&mut self, charge_mah: f64) -> Result<(), PersistenceError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Coulomb counter.
pub struct ChargeAccumulator<S: ChargeStore> {
    accumulated_mah: f64,

    capacity_mah: f64,

    last_update: Option<DateTime<Utc>>,

    /// Set once a tick or reset has run, the value then differs from what was loaded
    modified: bool,

    store: S,
}

/// Stores the charge as a decimal number in a text file.
///
/// A new value is written to a sibling `.tmp` file and renamed over the charge file, so a power
/// loss part way through a save leaves the previous value in place.
#[derive(Debug, Clone)]
pub struct FileChargeStore {
    path: PathBuf,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Could not read the charge file: {0}")]
    ReadError(std::io::Error),

    #[error("Could not write the charge file: {0}")]
    WriteError(std::io::Error),

    #[error("The charge file does not contain a number: \"{0}\"")]
    Corrupt(String),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<S: ChargeStore> ChargeAccumulator<S> {
    /// Create the accumulator from the value held in `store`.
    ///
    /// If the store is empty or unreadable the accumulator starts at `capacity_mah`.
    pub fn load(capacity_mah: f64, mut store: S) -> Self {
        let accumulated_mah = match store.load() {
            Ok(Some(c)) if c.is_finite() => c,
            Ok(Some(c)) => {
                warn!("Stored charge {} is not finite, using {} mAh", c, capacity_mah);
                capacity_mah
            }
            Ok(None) => capacity_mah,
            Err(e) => {
                warn!("{}, using {} mAh", e, capacity_mah);
                capacity_mah
            }
        };

        Self {
            accumulated_mah,
            capacity_mah,
            last_update: None,
            modified: false,
            store,
        }
    }

    /// Integrate `current_ma` over `elapsed_s`. Non-positive durations add nothing.
    pub fn tick(&mut self, current_ma: f64, elapsed_s: f64) {
        if elapsed_s > 0.0 && current_ma.is_finite() {
            self.accumulated_mah += current_ma * elapsed_s / SECONDS_PER_HOUR;
        }

        self.modified = true;
    }

    /// Integrate `current_ma` over the time since the previous call.
    ///
    /// The first call only records `now`.
    pub fn tick_to(&mut self, current_ma: f64, now: DateTime<Utc>) {
        if let Some(prev) = self.last_update {
            let elapsed_s = util::time::duration_to_seconds(now - prev).unwrap_or(0.0);
            self.tick(current_ma, elapsed_s);
        }

        self.last_update = Some(now);
        self.modified = true;
    }

    /// The battery has just been fully charged.
    pub fn reset_to_full(&mut self) {
        self.accumulated_mah = 0.0;
        self.modified = true;
    }

    /// Set the accumulated charge to match the given state of charge.
    pub fn reset_to_voltage_estimate(&mut self, soc_percent: f64) {
        self.accumulated_mah = (1.0 - soc_percent / 100.0) * self.capacity_mah;
        self.modified = true;
    }

    /// Write the accumulated charge to the store.
    pub fn persist(&mut self) -> Result<(), PersistenceError> {
        self.store.save(self.accumulated_mah)
    }

    /// State of charge in percent. Not clamped, so may go below 0 or above 100.
    pub fn charge_based_soc(&self) -> f64 {
        100.0 - self.accumulated_mah / self.capacity_mah * 100.0
    }

    /// True once a tick or reset has run since the value was loaded.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn accumulated_mah(&self) -> f64 {
        self.accumulated_mah
    }

    pub fn capacity_mah(&self) -> f64 {
        self.capacity_mah
    }
}

impl FileChargeStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".");
        name.push(TMP_EXTENSION);
        self.path.with_file_name(name)
    }
}

impl ChargeStore for FileChargeStore {
    fn load(&mut self) -> Result<Option<f64>, PersistenceError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(PersistenceError::ReadError(e)),
        };

        content
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| PersistenceError::Corrupt(content.trim().into()))
    }

    fn save(&mut self, charge_mah: f64) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(PersistenceError::WriteError)?;
            }
        }

        let tmp_path = self.tmp_path();

        let mut file = File::create(&tmp_path).map_err(PersistenceError::WriteError)?;
        write!(file, "{}\n", charge_mah).map_err(PersistenceError::WriteError)?;
        file.sync_all().map_err(PersistenceError::WriteError)?;
        drop(file);

        fs::rename(&tmp_path, &self.path).map_err(PersistenceError::WriteError)
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// In-memory store which records every save.
    #[derive(Clone, Default)]
    pub(crate) struct MemStore {
        pub value: Arc<Mutex<Option<f64>>>,
        pub saves: Arc<Mutex<usize>>,
        pub fail: bool,
    }

    impl MemStore {
        pub fn with(value: f64) -> Self {
            let s = Self::default();
            *s.value.lock().unwrap() = Some(value);
            s
        }
    }

    impl ChargeStore for MemStore {
        fn load(&mut self) -> Result<Option<f64>, PersistenceError> {
            Ok(*self.value.lock().unwrap())
        }

        fn save(&mut self, charge_mah: f64) -> Result<(), PersistenceError> {
            if self.fail {
                return Err(PersistenceError::WriteError(std::io::Error::new(
                    ErrorKind::Other,
                    "disk full",
                )));
            }
            *self.value.lock().unwrap() = Some(charge_mah);
            *self.saves.lock().unwrap() += 1;
            Ok(())
        }
    }

    #[test]
    fn test_load_defaults_to_capacity() {
        let acc = ChargeAccumulator::load(2000.0, MemStore::default());
        assert_eq!(acc.accumulated_mah(), 2000.0);
        assert_eq!(acc.charge_based_soc(), 0.0);

        let acc = ChargeAccumulator::load(2000.0, MemStore::with(500.0));
        assert_eq!(acc.accumulated_mah(), 500.0);
        assert_eq!(acc.charge_based_soc(), 75.0);
    }

    #[test]
    fn test_tick() {
        let mut acc = ChargeAccumulator::load(2000.0, MemStore::with(0.0));

        acc.tick(1000.0, 3600.0);
        assert_eq!(acc.accumulated_mah(), 1000.0);
        assert_eq!(acc.charge_based_soc(), 50.0);

        acc.tick(1000.0, 0.0);
        acc.tick(1000.0, -5.0);
        assert_eq!(acc.accumulated_mah(), 1000.0);

        // Over-discharge is reported, not clamped
        acc.tick(3000.0, 3600.0);
        assert_eq!(acc.charge_based_soc(), -100.0);
    }

    #[test]
    fn test_tick_to() {
        let mut acc = ChargeAccumulator::load(2000.0, MemStore::with(0.0));
        let t0 = Utc::now();

        acc.tick_to(1000.0, t0);
        assert_eq!(acc.accumulated_mah(), 0.0);

        acc.tick_to(1000.0, t0 + chrono::Duration::minutes(30));
        assert!((acc.accumulated_mah() - 500.0).abs() < 1e-9);

        // Clock going backwards adds nothing
        acc.tick_to(1000.0, t0);
        assert!((acc.accumulated_mah() - 500.0).abs() < 1e-9);
    }

    #[test]
    fn test_resets() {
        let mut acc = ChargeAccumulator::load(2000.0, MemStore::default());

        acc.reset_to_full();
        assert_eq!(acc.charge_based_soc(), 100.0);

        acc.reset_to_voltage_estimate(30.0);
        assert!((acc.charge_based_soc() - 30.0).abs() < 1e-9);
        assert!((acc.accumulated_mah() - 1400.0).abs() < 1e-9);
    }

    #[test]
    fn test_persist() {
        let store = MemStore::default();
        let mut acc = ChargeAccumulator::load(2000.0, store.clone());

        acc.reset_to_voltage_estimate(75.0);
        acc.persist().unwrap();
        assert_eq!(*store.value.lock().unwrap(), Some(500.0));

        let failing = MemStore {
            fail: true,
            ..MemStore::default()
        };
        let mut acc = ChargeAccumulator::load(2000.0, failing);
        acc.reset_to_full();
        assert!(acc.persist().is_err());
        assert_eq!(acc.accumulated_mah(), 0.0);
    }

    #[test]
    fn test_file_store() {
        let dir = std::env::temp_dir().join(format!("charge_store_test_{}", std::process::id()));
        let path = dir.join("capacity.txt");
        let _ = fs::remove_dir_all(&dir);

        let mut store = FileChargeStore::new(&path);
        assert!(store.load().unwrap().is_none());

        store.save(1234.5).unwrap();
        assert_eq!(store.load().unwrap(), Some(1234.5));

        fs::write(&path, "not a number").unwrap();
        assert!(matches!(store.load(), Err(PersistenceError::Corrupt(_))));

        // A corrupt file falls back to full capacity discharged
        let acc = ChargeAccumulator::load(2000.0, FileChargeStore::new(&path));
        assert_eq!(acc.accumulated_mah(), 2000.0);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_file_store_keeps_old_value_on_failed_save() {
        let dir =
            std::env::temp_dir().join(format!("charge_store_tmp_test_{}", std::process::id()));
        let path = dir.join("capacity.txt");
        let tmp_path = dir.join("capacity.txt.tmp");
        let _ = fs::remove_dir_all(&dir);

        let mut store = FileChargeStore::new(&path);
        store.save(100.0).unwrap();
        assert!(!tmp_path.exists());

        // An interrupted save leaves a partial temp file behind, which load ignores
        fs::write(&tmp_path, "").unwrap();
        assert_eq!(store.load().unwrap(), Some(100.0));
        let acc = ChargeAccumulator::load(2000.0, FileChargeStore::new(&path));
        assert_eq!(acc.accumulated_mah(), 100.0);

        // The temp file cannot be created, the stored value is untouched
        fs::remove_file(&tmp_path).unwrap();
        fs::create_dir(&tmp_path).unwrap();
        assert!(matches!(
            store.save(250.0),
            Err(PersistenceError::WriteError(_))
        ));
        assert_eq!(store.load().unwrap(), Some(100.0));

        // Once the obstruction is gone saves go through again
        fs::remove_dir(&tmp_path).unwrap();
        store.save(250.0).unwrap();
        assert_eq!(store.load().unwrap(), Some(250.0));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_modified() {
        let mut acc = ChargeAccumulator::load(2000.0, MemStore::with(500.0));
        assert!(!acc.is_modified());

        acc.tick_to(1000.0, Utc::now());
        assert!(acc.is_modified());

        let mut acc = ChargeAccumulator::load(2000.0, MemStore::with(500.0));
        acc.reset_to_full();
        assert!(acc.is_modified());
    }
}

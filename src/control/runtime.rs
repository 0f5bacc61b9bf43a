//! Durable heating-time accounting.
//!
//! The start of every heating period is persisted the moment the relay
//! closes, so a reboot mid-period still counts the time spent heating
//! before the reset. The cumulative total is persisted on every stop.

use log::{info, warn};

use crate::app::keys;
use crate::app::ports::{StorageError, StorageExt, StoragePort};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RuntimeAccumulator {
    runtime_secs: u32,
    /// `Some(start)` while heating.
    started_at: Option<i64>,
}

impl RuntimeAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore from storage. An interrupted heating period resumes with its
    /// persisted start time.
    pub fn load(storage: &impl StoragePort) -> Self {
        let runtime_secs = read_or(storage, keys::RUNTIME, StorageExt::read_u32, 0);
        let heating = read_or(storage, keys::HEATING, StorageExt::read_u8, 0) != 0;
        let started_at = if heating {
            match storage.read_i64(keys::NAMESPACE, keys::HEAT_START) {
                Ok(start) => Some(start),
                Err(e) => {
                    warn!("Runtime: heating flag set but start unreadable ({}), discarding", e);
                    None
                }
            }
        } else {
            None
        };
        info!(
            "Runtime: {}s total, heating={}",
            runtime_secs,
            started_at.is_some()
        );
        Self {
            runtime_secs,
            started_at,
        }
    }

    pub fn is_heating(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn runtime_secs(&self) -> u32 {
        self.runtime_secs
    }

    pub fn started_at(&self) -> Option<i64> {
        self.started_at
    }

    /// Begin a heating period at `now`.
    pub fn start(&mut self, now: i64, storage: &mut impl StoragePort) {
        self.started_at = Some(now);
        persist(storage.write_i64(keys::NAMESPACE, keys::HEAT_START, now), keys::HEAT_START);
        persist(storage.write_u8(keys::NAMESPACE, keys::HEATING, 1), keys::HEATING);
    }

    /// End the heating period at `now` and return the new total.
    ///
    /// The persisted start is used unless it predates the in-memory one,
    /// which means the write in [`start`](Self::start) never landed and the
    /// stored value belongs to an earlier period.
    pub fn stop(&mut self, now: i64, storage: &mut impl StoragePort) -> u32 {
        let persisted = storage.read_i64(keys::NAMESPACE, keys::HEAT_START).ok();
        let start = match (persisted, self.started_at) {
            (Some(p), Some(m)) if p < m => {
                warn!("Runtime: stored start {} older than current period {}, ignoring", p, m);
                m
            }
            (Some(p), _) => p,
            (None, Some(m)) => m,
            (None, None) => now,
        };
        let delta = now.saturating_sub(start).clamp(0, i64::from(u32::MAX)) as u32;
        self.runtime_secs = self.runtime_secs.saturating_add(delta);
        self.started_at = None;

        persist(
            storage.write_u32(keys::NAMESPACE, keys::RUNTIME, self.runtime_secs),
            keys::RUNTIME,
        );
        persist(storage.write_u8(keys::NAMESPACE, keys::HEATING, 0), keys::HEATING);
        info!("Runtime: +{}s, total {}s", delta, self.runtime_secs);
        self.runtime_secs
    }

    /// Overwrite the cumulative total (e.g. reset from the network).
    pub fn set_runtime(&mut self, secs: u32, storage: &mut impl StoragePort) {
        self.runtime_secs = secs;
        persist(storage.write_u32(keys::NAMESPACE, keys::RUNTIME, secs), keys::RUNTIME);
    }
}

fn read_or<S: StoragePort + ?Sized, T>(
    storage: &S,
    key: &str,
    read: fn(&S, &str, &str) -> Result<T, StorageError>,
    default: T,
) -> T {
    match read(storage, keys::NAMESPACE, key) {
        Ok(v) => v,
        Err(StorageError::NotFound) => default,
        Err(e) => {
            warn!("Runtime: {} unreadable ({}), using default", key, e);
            default
        }
    }
}

fn persist(result: Result<(), StorageError>, key: &str) {
    if let Err(e) = result {
        warn!("Runtime: persisting {} failed: {}", key, e);
    }
}

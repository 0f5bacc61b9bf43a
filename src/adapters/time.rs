//! ESP32 wall-clock adapter.
//!
//! Implements [`ClockPort`] for the thermostat.
//!
//! - **`target_os = "espidf"`** — reads and sets the system clock with
//!   `gettimeofday()` / `settimeofday()`. The RTC starts at the epoch after
//!   a cold boot, so the engine keeps waiting until the network pushes a
//!   time.
//! - **`not(target_os = "espidf")`** — `std::time::SystemTime` plus a skew
//!   that [`ClockPort::set_utc`] adjusts, for host-side simulation.
//!
//! Sync requests are latched in a [`SyncRequests`] flag shared with the
//! network side, which drains it and issues the time-cluster read.

use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{info, warn};

use crate::app::ports::ClockPort;

/// Latched "please fetch the network time" flag.
#[derive(Debug, Clone, Default)]
pub struct SyncRequests(Arc<AtomicBool>);

impl SyncRequests {
    /// `true` once per pending request.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }

    fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }
}

/// System wall clock.
pub struct SystemClock {
    #[cfg(not(target_os = "espidf"))]
    skew_secs: i64,
    sync_requested: SyncRequests,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            skew_secs: 0,
            sync_requested: SyncRequests::default(),
        }
    }

    /// Handle on the sync latch for the thread that talks to the network.
    pub fn sync_requests(&self) -> SyncRequests {
        self.sync_requested.clone()
    }

    #[cfg(target_os = "espidf")]
    fn raw_now() -> i64 {
        let mut tv = esp_idf_svc::sys::timeval {
            tv_sec: 0,
            tv_usec: 0,
        };
        // SAFETY: `tv` is a valid out-pointer; a null timezone is allowed.
        if unsafe { esp_idf_svc::sys::gettimeofday(&mut tv, core::ptr::null_mut()) } != 0 {
            return 0;
        }
        tv.tv_sec as i64
    }

    #[cfg(not(target_os = "espidf"))]
    fn raw_now() -> i64 {
        match std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH) {
            Ok(d) => d.as_secs() as i64,
            Err(e) => -(e.duration().as_secs() as i64),
        }
    }
}

impl ClockPort for SystemClock {
    #[cfg(target_os = "espidf")]
    fn now_epoch_secs(&self) -> i64 {
        Self::raw_now()
    }

    #[cfg(not(target_os = "espidf"))]
    fn now_epoch_secs(&self) -> i64 {
        Self::raw_now().saturating_add(self.skew_secs)
    }

    #[cfg(target_os = "espidf")]
    fn set_utc(&mut self, epoch_secs: i64) {
        let tv = esp_idf_svc::sys::timeval {
            tv_sec: epoch_secs as _,
            tv_usec: 0,
        };
        // SAFETY: `tv` outlives the call; a null timezone is allowed.
        if unsafe { esp_idf_svc::sys::settimeofday(&tv, core::ptr::null()) } != 0 {
            warn!("Clock: settimeofday({}) failed", epoch_secs);
            return;
        }
        info!("Clock: set to {}", epoch_secs);
    }

    #[cfg(not(target_os = "espidf"))]
    fn set_utc(&mut self, epoch_secs: i64) {
        self.skew_secs = epoch_secs.saturating_sub(Self::raw_now());
        if self.skew_secs.abs() > 86_400 {
            warn!("Clock: host clock off by {}s", self.skew_secs);
        }
        info!("Clock: set to {}", epoch_secs);
    }

    fn request_sync(&mut self) {
        self.sync_requested.raise();
    }
}

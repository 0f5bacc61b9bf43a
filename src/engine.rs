//! Schedule engine — drives the service on a clock-aligned tick and applies
//! inbound events between ticks.
//!
//! ```text
//!  ┌──────────────────────────────────────────────────────────────┐
//!  │  futures_lite::future::block_on                              │
//!  │  ┌────────────────────────────────────────────────────────┐  │
//!  │  │  edge_executor::LocalExecutor                          │  │
//!  │  │  ┌────────────────────┐   ┌──────────────────────────┐ │  │
//!  │  │  │ tick loop          │   │ dispatcher               │ │  │
//!  │  │  │ poll() → Timer ⏱   │   │ inbound.receive().await  │ │  │
//!  │  │  └─────────┬──────────┘   └────────────┬─────────────┘ │  │
//!  │  └────────────┼───────────────────────────┼───────────────┘  │
//!  │               ▼                           ▼                  │
//!  │        Arc<Mutex<ThermostatService>>  (single aggregate lock)│
//!  │               │                                              │
//!  │               ▼ outbox, after unlock                         │
//!  │        Arc<Mutex<AttributeBus>>                              │
//!  └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Bus callbacks and sensor readings reach the engine through an
//! [`EngineHandle`], which only `try_send`s into a bounded channel and never
//! blocks on the aggregate lock.

use core::time::Duration;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, TrySendError};
use log::{debug, info, warn};

use crate::adapters::zcl;
use crate::app::commands::ThermostatCommand;
use crate::app::events::Outbox;
use crate::app::ports::{AttributeBus, AttributeValue, ClockPort, RelayPort, StoragePort};
use crate::app::service::ThermostatService;
use crate::error::Result;
use crate::sensors::TemperatureObserver;

/// Depth of the inbound event queue.
pub const INBOUND_DEPTH: usize = 16;

type Inbound = Channel<CriticalSectionRawMutex, ThermostatCommand, INBOUND_DEPTH>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Wall clock not yet plausible; nothing is evaluated.
    WaitingForClock,
    /// One evaluation per tick, aligned to the tick period.
    Running,
}

// ── Shared core ───────────────────────────────────────────────

/// The aggregate and the bus, each behind its own lock.
struct EngineCore<S, R, C, B> {
    service: Arc<Mutex<ThermostatService<S, R, C>>>,
    bus: Arc<Mutex<B>>,
}

impl<S, R, C, B> Clone for EngineCore<S, R, C, B> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            bus: Arc::clone(&self.bus),
        }
    }
}

impl<S, R, C, B> EngineCore<S, R, C, B>
where
    S: StoragePort,
    R: RelayPort,
    C: ClockPort,
    B: AttributeBus,
{
    fn lock(&self) -> MutexGuard<'_, ThermostatService<S, R, C>> {
        self.service.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply one command under the aggregate lock, then publish.
    fn apply(&self, cmd: ThermostatCommand) -> Result<()> {
        let mut outbox = Outbox::new();
        let result = self.lock().handle_command(cmd, &mut outbox);
        self.publish(&mut outbox);
        result
    }

    /// Send every pending publication, taking the bus lock per publish.
    fn publish(&self, outbox: &mut Outbox) {
        for publication in outbox.drain() {
            let (cluster, attribute, value) = zcl::encode_publication(&publication);
            let sent = self
                .bus
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .publish(cluster, attribute, value);
            if let Err(e) = sent {
                warn!(
                    "Engine: publish 0x{:04X}/0x{:04X} failed: {}",
                    cluster, attribute, e
                );
            }
        }
    }
}

// ── Engine ────────────────────────────────────────────────────

pub struct ScheduleEngine<S, R, C, B> {
    core: EngineCore<S, R, C, B>,
    inbound: Arc<Inbound>,
    state: EngineState,
}

impl<S, R, C, B> ScheduleEngine<S, R, C, B>
where
    S: StoragePort,
    R: RelayPort,
    C: ClockPort,
    B: AttributeBus,
{
    /// Take ownership of the service and the bus, release the relay and
    /// announce the restored state.
    pub fn new(mut service: ThermostatService<S, R, C>, bus: B) -> Self {
        let mut outbox = Outbox::new();
        service.start(&mut outbox);

        let core = EngineCore {
            service: Arc::new(Mutex::new(service)),
            bus: Arc::new(Mutex::new(bus)),
        };
        core.publish(&mut outbox);

        Self {
            core,
            inbound: Arc::new(Channel::new()),
            state: EngineState::WaitingForClock,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Handle for bus callbacks and sensor observers.
    pub fn handle(&self) -> EngineHandle<S, R, C, B> {
        EngineHandle {
            core: self.core.clone(),
            inbound: Arc::clone(&self.inbound),
        }
    }

    /// Run `f` against the service under the aggregate lock.
    pub fn with_service<T>(&self, f: impl FnOnce(&ThermostatService<S, R, C>) -> T) -> T {
        f(&self.core.lock())
    }

    /// Run `f` against the bus under its lock.
    pub fn with_bus<T>(&self, f: impl FnOnce(&B) -> T) -> T {
        f(&self.core.bus.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Apply a command synchronously, bypassing the inbound queue.
    pub fn apply(&self, cmd: ThermostatCommand) -> Result<()> {
        self.core.apply(cmd)
    }

    /// Apply every queued inbound command; returns how many were taken.
    pub fn process_pending(&self) -> usize {
        let mut taken = 0;
        while let Ok(cmd) = self.inbound.try_receive() {
            dispatch(&self.core, cmd);
            taken += 1;
        }
        taken
    }

    /// One step of the state machine. Returns how long to wait before the
    /// next step.
    pub fn poll(&mut self) -> Duration {
        let mut outbox = Outbox::new();
        let (delay, state) = {
            let mut svc = self.core.lock();
            let poll_secs = svc.config().clock_poll_secs;
            let period = svc.config().tick_period_secs;
            svc.maintain_time_sync();

            if !svc.clock_valid() {
                if self.state == EngineState::Running {
                    warn!("Engine: wall clock lost, waiting for sync");
                } else {
                    debug!("Engine: waiting for clock");
                }
                (
                    Duration::from_secs(u64::from(poll_secs)),
                    EngineState::WaitingForClock,
                )
            } else {
                if self.state == EngineState::WaitingForClock {
                    info!("Engine: clock valid, running");
                }
                let decision = svc.tick(&mut outbox);
                debug!("Engine: tick {} -> {:?}", svc.tick_count(), decision);
                let now = svc.clock().now_epoch_secs();
                (
                    Duration::from_secs(next_tick_delay(now, period)),
                    EngineState::Running,
                )
            }
        };
        self.state = state;
        self.core.publish(&mut outbox);
        delay
    }
}

impl<S, R, C, B> ScheduleEngine<S, R, C, B>
where
    S: StoragePort + 'static,
    R: RelayPort + 'static,
    C: ClockPort + 'static,
    B: AttributeBus + 'static,
{
    /// Drive the tick loop and the inbound dispatcher on the calling
    /// thread. Never returns.
    pub fn run(mut self) {
        let executor: edge_executor::LocalExecutor<'_, 4> = edge_executor::LocalExecutor::new();

        let dispatcher = Dispatcher {
            core: self.core.clone(),
            inbound: Arc::clone(&self.inbound),
        };
        executor.spawn(dispatcher.run()).detach();
        executor
            .spawn(async move {
                loop {
                    let delay = self.poll();
                    async_io_mini::Timer::after(delay).await;
                }
            })
            .detach();

        info!("Engine started");
        futures_lite::future::block_on(executor.run(core::future::pending::<()>()));
    }
}

/// Seconds until the next multiple of `period` after `now`.
fn next_tick_delay(now: i64, period: u32) -> u64 {
    let period = i64::from(period.max(1));
    (period - now.rem_euclid(period)) as u64
}

fn dispatch<S, R, C, B>(core: &EngineCore<S, R, C, B>, cmd: ThermostatCommand)
where
    S: StoragePort,
    R: RelayPort,
    C: ClockPort,
    B: AttributeBus,
{
    if let Err(e) = core.apply(cmd) {
        warn!("Engine: command rejected: {}", e);
    }
}

// ── Dispatcher task ───────────────────────────────────────────

struct Dispatcher<S, R, C, B> {
    core: EngineCore<S, R, C, B>,
    inbound: Arc<Inbound>,
}

impl<S, R, C, B> Dispatcher<S, R, C, B>
where
    S: StoragePort,
    R: RelayPort,
    C: ClockPort,
    B: AttributeBus,
{
    /// Wakes as soon as a handle queues a command.
    async fn run(self) {
        loop {
            let cmd = self.inbound.receive().await;
            dispatch(&self.core, cmd);
        }
    }
}

// ── Handle ────────────────────────────────────────────────────

/// Cloneable entry point for code running outside the engine's executor.
pub struct EngineHandle<S, R, C, B> {
    core: EngineCore<S, R, C, B>,
    inbound: Arc<Inbound>,
}

impl<S, R, C, B> Clone for EngineHandle<S, R, C, B> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
            inbound: Arc::clone(&self.inbound),
        }
    }
}

impl<S, R, C, B> EngineHandle<S, R, C, B>
where
    S: StoragePort,
    R: RelayPort,
    C: ClockPort,
    B: AttributeBus,
{
    /// Queue a command without blocking. A full queue drops it.
    pub fn submit(&self, cmd: ThermostatCommand) -> bool {
        match self.inbound.try_send(cmd) {
            Ok(()) => true,
            Err(TrySendError::Full(cmd)) => {
                warn!("Engine: inbound queue full, dropping {:?}", cmd);
                false
            }
        }
    }

    /// An attribute write or report from the network.
    pub fn on_attribute(&self, cluster_id: u16, attribute_id: u16, value: AttributeValue) -> bool {
        zcl::decode_attribute(cluster_id, attribute_id, value).is_some_and(|cmd| self.submit(cmd))
    }

    /// A cluster command from the network. Malformed payloads are logged
    /// and dropped before anything is queued.
    pub fn on_command(&self, cluster_id: u16, command_id: u8, payload: &[u8]) -> bool {
        match zcl::decode_command(cluster_id, command_id, payload) {
            Ok(Some(cmd)) => self.submit(cmd),
            Ok(None) => false,
            Err(e) => {
                warn!("Engine: command 0x{:02X} rejected: {}", command_id, e);
                false
            }
        }
    }
}

impl<S, R, C, B> TemperatureObserver for EngineHandle<S, R, C, B>
where
    S: StoragePort + Send,
    R: RelayPort + Send,
    C: ClockPort + Send,
    B: AttributeBus + Send,
{
    fn on_temperature(&self, hundredths: i16) {
        self.submit(ThermostatCommand::SetLocalTemperature(hundredths));
    }
}

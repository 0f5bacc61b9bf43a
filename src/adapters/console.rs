//! Serial console link.
//!
//! Inbound attribute writes and cluster commands arrive as one JSON object
//! per line and are forwarded to a [`NetworkIngress`] (the engine handle).
//! Outbound, the link writes the time-cluster read whenever the clock
//! raises a sync request. Attribute reports leave through
//! [`LogAttributeBus`](super::log_bus::LogAttributeBus).
//!
//! ```text
//!  {"op":"attr","cluster":513,"attribute":28,"value":{"Enum8":4}}
//!  {"op":"cmd","cluster":513,"command":1,"payload":[1,127,1,164,1,152,8]}
//!  {"op":"read","cluster":10,"attribute":0}            (outbound only)
//! ```

use std::io::{self, BufRead, Write};
use std::time::Duration;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::{AttributeBus, AttributeValue, ClockPort, RelayPort, StoragePort};
use crate::engine::EngineHandle;

use super::time::SyncRequests;
use super::zcl;

/// Longest line accepted from the console.
pub const MAX_LINE_LEN: usize = 512;

/// Where decoded network traffic goes.
pub trait NetworkIngress {
    fn on_attribute(&self, cluster_id: u16, attribute_id: u16, value: AttributeValue) -> bool;
    fn on_command(&self, cluster_id: u16, command_id: u8, payload: &[u8]) -> bool;
}

impl<S, R, C, B> NetworkIngress for EngineHandle<S, R, C, B>
where
    S: StoragePort,
    R: RelayPort,
    C: ClockPort,
    B: AttributeBus,
{
    fn on_attribute(&self, cluster_id: u16, attribute_id: u16, value: AttributeValue) -> bool {
        EngineHandle::on_attribute(self, cluster_id, attribute_id, value)
    }

    fn on_command(&self, cluster_id: u16, command_id: u8, payload: &[u8]) -> bool {
        EngineHandle::on_command(self, cluster_id, command_id, payload)
    }
}

/// One line on the link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Frame {
    Attr {
        cluster: u16,
        attribute: u16,
        value: AttributeValue,
    },
    Cmd {
        cluster: u16,
        command: u8,
        #[serde(default)]
        payload: Vec<u8>,
    },
    Read {
        cluster: u16,
        attribute: u16,
    },
}

/// Why a console line was not forwarded.
#[derive(Debug)]
pub enum LineError {
    TooLong(usize),
    Malformed(serde_json::Error),
    /// A frame that only travels outbound.
    Unexpected,
}

impl core::fmt::Display for LineError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::TooLong(len) => write!(f, "line of {len} bytes exceeds {MAX_LINE_LEN}"),
            Self::Malformed(e) => write!(f, "malformed frame: {e}"),
            Self::Unexpected => write!(f, "outbound-only frame received"),
        }
    }
}

/// Decode one line and hand it to `ingress`. `Ok(true)` when the engine
/// queued it, `Ok(false)` when it was understood but ignored or dropped.
pub fn handle_line(line: &str, ingress: &impl NetworkIngress) -> Result<bool, LineError> {
    if line.len() > MAX_LINE_LEN {
        return Err(LineError::TooLong(line.len()));
    }
    match serde_json::from_str::<Frame>(line).map_err(LineError::Malformed)? {
        Frame::Attr {
            cluster,
            attribute,
            value,
        } => Ok(ingress.on_attribute(cluster, attribute, value)),
        Frame::Cmd {
            cluster,
            command,
            payload,
        } => Ok(ingress.on_command(cluster, command, &payload)),
        Frame::Read { .. } => Err(LineError::Unexpected),
    }
}

/// Forward every line from `reader` until it closes. Returns how many
/// lines were queued.
pub fn serve(reader: impl BufRead, ingress: &impl NetworkIngress) -> usize {
    let mut queued = 0;
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("Console: read failed ({})", e);
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match handle_line(line, ingress) {
            Ok(true) => queued += 1,
            Ok(false) => debug!("Console: frame not queued"),
            Err(e) => warn!("Console: {}", e),
        }
    }
    info!("Console: input closed after {} frames", queued);
    queued
}

/// Write the time-cluster read if a sync request is pending.
pub fn forward_sync_request(requests: &SyncRequests, out: &mut impl Write) -> io::Result<bool> {
    if !requests.take() {
        return Ok(false);
    }
    let frame = Frame::Read {
        cluster: zcl::cluster::TIME,
        attribute: zcl::attr::time::TIME,
    };
    let line = serde_json::to_string(&frame).map_err(io::Error::other)?;
    writeln!(out, "{line}")?;
    out.flush()?;
    info!("Console: requested network time");
    Ok(true)
}

/// Poll the sync latch forever, writing requests to stdout.
pub fn run_sync_forwarder(requests: SyncRequests, period: Duration) -> ! {
    loop {
        if let Err(e) = forward_sync_request(&requests, &mut io::stdout().lock()) {
            warn!("Console: time request not written ({})", e);
        }
        std::thread::sleep(period);
    }
}

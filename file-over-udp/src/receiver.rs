//! Reference receiver: the mirror image of the sliding-window sender.
//!
//! [`Reassembler`] implements the receive-side state:
//!
//! - Only **in-order** segments are accepted (`seq == rcv_nxt`).
//! - Out-of-order or duplicate segments are **silently discarded**.
//! - After every segment (accepted or not) a **cumulative ACK** carrying
//!   [`Reassembler::ack_number`] goes back to the sender.
//!
//! [`ReferenceReceiver`] wraps it in a socket loop that also plays the
//! peer's half of the teardown: on the empty terminal segment it answers
//! with `ack` and `fin`, then waits for `==FINACK==`. If the confirmation
//! never arrives it gives up after a linger period, since the sender sends
//! it only once.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::packet::{Segment, Token};
use crate::simulator::{FaultCounts, Simulator, SimulatorConfig};
use crate::socket::{RecvEvent, Socket, SocketError};

/// Poll interval while waiting for traffic with no idle bound.
const IDLE_POLL: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// Reassembler
// ---------------------------------------------------------------------------

/// In-order byte reassembly for one incoming stream.
#[derive(Debug, Default)]
pub struct Reassembler {
    /// Next expected byte offset (`RCV.NXT`).
    rcv_nxt: i32,
    data: Vec<u8>,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process an inbound data segment.
    ///
    /// Returns `true` if the segment was **accepted** and its payload
    /// appended. Returns `false` for an out-of-order, duplicate, or empty
    /// segment; the caller should still send a cumulative ACK.
    pub fn on_segment(&mut self, seq: i32, payload: &[u8]) -> bool {
        if seq != self.rcv_nxt || payload.is_empty() {
            return false;
        }
        let Ok(len) = i32::try_from(payload.len()) else {
            return false;
        };
        let Some(next) = self.rcv_nxt.checked_add(len) else {
            return false;
        };
        self.data.extend_from_slice(payload);
        self.rcv_nxt = next;
        true
    }

    /// Cumulative ACK number: every byte below this has been received.
    pub fn ack_number(&self) -> i32 {
        self.rcv_nxt
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

// ---------------------------------------------------------------------------
// ReferenceReceiver
// ---------------------------------------------------------------------------

/// Tunables for [`ReferenceReceiver`].
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// How long to wait for the confirmation after answering the terminal
    /// segment. Restarted whenever the terminal segment arrives again.
    pub linger: Duration,
    /// Give up if nothing at all arrives for this long. `None` waits forever.
    pub idle_timeout: Option<Duration>,
    pub faults: SimulatorConfig,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            linger: Duration::from_secs(2),
            idle_timeout: None,
            faults: SimulatorConfig::default(),
        }
    }
}

/// Receive-side errors.
#[derive(Debug, Error)]
pub enum ReceiverError {
    #[error(transparent)]
    Socket(#[from] SocketError),
    #[error("no traffic for {0:?}")]
    Idle(Duration),
}

/// Result of one completed receive.
#[derive(Debug)]
pub struct ReceivedFile {
    pub data: Vec<u8>,
    /// `true` if `==FINACK==` arrived, `false` if the linger period ran out.
    pub confirmed: bool,
    /// Data segments seen, duplicates and out-of-order ones included.
    pub segments: u64,
    /// Data segments that were not accepted.
    pub discarded: u64,
    pub faults: FaultCounts,
}

/// Serves exactly one transfer and returns its bytes.
pub struct ReferenceReceiver {
    socket: Socket,
    config: ReceiverConfig,
    net: Simulator,
    reasm: Reassembler,
    segments: u64,
    discarded: u64,
}

impl ReferenceReceiver {
    pub async fn bind(addr: SocketAddr, config: ReceiverConfig) -> Result<Self, ReceiverError> {
        let socket = Socket::bind(addr).await?;
        log::info!("[recv] listening on {}", socket.local_addr);
        Ok(Self {
            socket,
            net: Simulator::new(config.faults.clone()),
            config,
            reasm: Reassembler::new(),
            segments: 0,
            discarded: 0,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.socket.local_addr
    }

    /// Receive until the sender confirms termination (or stops trying).
    pub async fn run(mut self) -> Result<ReceivedFile, ReceiverError> {
        let mut closing_since: Option<Instant> = None;
        let mut last_activity = Instant::now();

        let confirmed = loop {
            let now = Instant::now();
            let wait = match (closing_since, self.config.idle_timeout) {
                (Some(since), _) => {
                    let left = (since + self.config.linger).saturating_duration_since(now);
                    if left.is_zero() {
                        log::debug!("[recv] no FINACK within {:?}; closing", self.config.linger);
                        break false;
                    }
                    left
                }
                (None, Some(idle)) => {
                    let left = (last_activity + idle).saturating_duration_since(now);
                    if left.is_zero() {
                        return Err(ReceiverError::Idle(idle));
                    }
                    left
                }
                (None, None) => IDLE_POLL,
            };

            let (seg, from) = match self.socket.recv_timeout(wait).await? {
                RecvEvent::Segment(seg, from) => (seg, from),
                RecvEvent::Malformed(e, from) => {
                    log::trace!("[recv] malformed datagram from {from}: {e}");
                    continue;
                }
                RecvEvent::TimedOut => continue,
            };
            last_activity = Instant::now();

            if self.net.drop_inbound() {
                log::trace!("[recv] sim dropped inbound seq={}", seg.seq_id);
                continue;
            }

            if closing_since.is_some() && seg.token() == Token::FinAck {
                log::debug!("[recv] ← FINACK");
                break true;
            }

            if seg.payload.is_empty() && seg.seq_id == self.reasm.ack_number() {
                // Terminal segment: acknowledge it and signal our own fin.
                let end = self.reasm.ack_number();
                self.reply(Segment::ack(end), from).await?;
                self.reply(Segment::fin(end), from).await?;
                closing_since = Some(Instant::now());
                log::debug!("[recv] ← terminal seq={end}; → ACK, FIN");
                continue;
            }

            self.segments += 1;
            let accepted = self.reasm.on_segment(seg.seq_id, &seg.payload);
            if !accepted {
                self.discarded += 1;
            }
            let ack = self.reasm.ack_number();
            self.reply(Segment::ack(ack), from).await?;
            log::debug!(
                "[recv] ← DATA seq={} len={} accepted={}; → ACK ack={}",
                seg.seq_id,
                seg.payload.len(),
                accepted,
                ack
            );
        };

        self.net.flush(&self.socket).await?;
        Ok(ReceivedFile {
            faults: self.net.counts(),
            segments: self.segments,
            discarded: self.discarded,
            confirmed,
            data: self.reasm.into_bytes(),
        })
    }

    async fn reply(&mut self, seg: Segment, to: SocketAddr) -> Result<(), SocketError> {
        self.net.send(&self.socket, &seg, to).await
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

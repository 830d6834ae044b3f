//! Optional network fault injection for deterministic testing.
//!
//! Real networks drop, reorder, and duplicate packets. To exercise the
//! reliability mechanisms without depending on actual network conditions,
//! the reference receiver can route its traffic through a [`Simulator`]
//! that applies a configurable fault model:
//!
//! | Fault        | Description                                              |
//! |--------------|----------------------------------------------------------|
//! | Packet loss  | Drop a datagram with probability `loss_rate`.            |
//! | Duplication  | Deliver a datagram twice.                                |
//! | Reordering   | Hold a datagram back and release it after the next one. |
//!
//! Loss applies in both directions; duplication and reordering apply to
//! outbound datagrams only. Decisions come from a seeded RNG so a failing
//! run can be replayed exactly.

use std::net::SocketAddr;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::packet::Segment;
use crate::socket::{Socket, SocketError};

/// Configuration for the fault-injection model.
///
/// All probabilities are in the range `[0.0, 1.0]`; values outside it are
/// clamped.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Probability that any given datagram is silently dropped.
    pub loss_rate: f64,
    /// Probability that a datagram is delivered twice.
    pub duplicate_rate: f64,
    /// Probability that a datagram is held back behind the next one.
    pub reorder_rate: f64,
    /// RNG seed.
    pub seed: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        // No faults by default.
        Self {
            loss_rate: 0.0,
            duplicate_rate: 0.0,
            reorder_rate: 0.0,
            seed: 0,
        }
    }
}

impl SimulatorConfig {
    /// `true` when no fault can ever fire.
    pub fn is_passthrough(&self) -> bool {
        self.loss_rate <= 0.0 && self.duplicate_rate <= 0.0 && self.reorder_rate <= 0.0
    }
}

/// What happens to one outbound datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fate {
    Drop,
    Deliver,
    Duplicate,
    HoldBack,
}

/// Running totals of injected faults.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FaultCounts {
    pub dropped: u64,
    pub duplicated: u64,
    pub reordered: u64,
}

/// A fault-injecting shim in front of a [`Socket`].
#[derive(Debug)]
pub struct Simulator {
    config: SimulatorConfig,
    rng: StdRng,
    held: Option<(Vec<u8>, SocketAddr)>,
    counts: FaultCounts,
}

impl Simulator {
    pub fn new(config: SimulatorConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            held: None,
            counts: FaultCounts::default(),
        }
    }

    pub fn counts(&self) -> FaultCounts {
        self.counts
    }

    fn roll(&mut self, p: f64) -> bool {
        let p = p.clamp(0.0, 1.0);
        p > 0.0 && self.rng.random::<f64>() < p
    }

    /// Decide the fate of the next outbound datagram.
    pub fn fate(&mut self) -> Fate {
        if self.roll(self.config.loss_rate) {
            Fate::Drop
        } else if self.roll(self.config.duplicate_rate) {
            Fate::Duplicate
        } else if self.roll(self.config.reorder_rate) {
            Fate::HoldBack
        } else {
            Fate::Deliver
        }
    }

    /// Decide whether an inbound datagram is lost.
    pub fn drop_inbound(&mut self) -> bool {
        let lost = self.roll(self.config.loss_rate);
        if lost {
            self.counts.dropped += 1;
        }
        lost
    }

    /// Send `segment` to `dest`, subject to the fault model.
    pub async fn send(
        &mut self,
        socket: &Socket,
        segment: &Segment,
        dest: SocketAddr,
    ) -> Result<(), SocketError> {
        match self.fate() {
            Fate::Drop => {
                self.counts.dropped += 1;
                log::trace!("[sim] drop seq={}", segment.seq_id);
                return Ok(());
            }
            Fate::Duplicate => {
                self.counts.duplicated += 1;
                socket.send_to(segment, dest).await?;
                socket.send_to(segment, dest).await?;
            }
            // Only one datagram is held at a time; a second hold delivers.
            Fate::HoldBack if self.held.is_none() => {
                self.counts.reordered += 1;
                self.held = Some((segment.encode(), dest));
                return Ok(());
            }
            Fate::HoldBack | Fate::Deliver => socket.send_to(segment, dest).await?,
        }
        self.flush(socket).await
    }

    /// Release any held-back datagram.
    pub async fn flush(&mut self, socket: &Socket) -> Result<(), SocketError> {
        if let Some((bytes, dest)) = self.held.take() {
            socket.send_raw(&bytes, dest).await?;
        }
        Ok(())
    }
}

//! Transfer tunables.
//!
//! Everything that was a fixed protocol constant is gathered into one
//! [`TransferConfig`] value handed to the engine at construction time, so
//! repeated runs (and tests) can vary them independently.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use crate::packet::{PACKET_SIZE, SEQ_ID_SIZE};

/// Default destination of the reference receiver.
pub const DEFAULT_DEST: &str = "127.0.0.1:5001";

/// Adjustable parameters for one transfer run.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Maximum datagram size, sequence id included.
    pub packet_size: usize,
    /// Width of the sequence id on the wire. Only 4 is supported.
    pub seq_id_size: usize,
    /// Maximum number of unacknowledged segments in flight.
    pub window_size: usize,
    /// Bound on every blocking receive; expiry triggers retransmission.
    pub rto: Duration,
    /// Absolute bound on the teardown handshake.
    pub teardown_timeout: Duration,
    /// Repeats of the same ACK that trigger a fast retransmit.
    pub dup_ack_threshold: u32,
    /// Optional absolute bound on the data phase. `None` retries forever.
    pub data_timeout: Option<Duration>,
    /// Receiver address.
    pub dest: SocketAddr,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            packet_size: PACKET_SIZE,
            seq_id_size: SEQ_ID_SIZE,
            window_size: 100,
            rto: Duration::from_secs(1),
            teardown_timeout: Duration::from_secs(10),
            dup_ack_threshold: 3,
            data_timeout: None,
            dest: SocketAddr::from(([127, 0, 0, 1], 5001)),
        }
    }
}

impl TransferConfig {
    /// Default tunables aimed at `dest`.
    pub fn new(dest: SocketAddr) -> Self {
        Self {
            dest,
            ..Default::default()
        }
    }

    /// Same settings with a different window size.
    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    /// Payload bytes that fit in one segment.
    pub fn message_size(&self) -> usize {
        self.packet_size.saturating_sub(self.seq_id_size)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.seq_id_size != SEQ_ID_SIZE {
            return Err(ConfigError::SeqIdSize(self.seq_id_size));
        }
        if self.packet_size <= self.seq_id_size {
            return Err(ConfigError::PacketSize(self.packet_size));
        }
        if self.window_size == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        if self.dup_ack_threshold == 0 {
            return Err(ConfigError::ZeroDupAckThreshold);
        }
        if self.rto.is_zero() {
            return Err(ConfigError::ZeroRto);
        }
        Ok(())
    }
}

/// A rejected [`TransferConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unsupported sequence id width {0} (only 4 is supported)")]
    SeqIdSize(usize),
    #[error("packet size {0} leaves no room for payload")]
    PacketSize(usize),
    #[error("window size must be at least 1")]
    ZeroWindow,
    #[error("duplicate-ack threshold must be at least 1")]
    ZeroDupAckThreshold,
    #[error("retransmission timeout must be non-zero")]
    ZeroRto,
}

//! Retransmit timer and absolute deadlines.
//!
//! Reliable delivery requires that unacknowledged segments are re-sent if no
//! ACK arrives within a bounded time. This module provides:
//! - [`RetransmitTimer`]: the fixed retransmission timeout (RTO) that
//!   bounds every receive, and the timeout recovery step: resend **every**
//!   outstanding segment.
//! - [`Deadline`]: an absolute cut-off used by the teardown handshake and,
//!   optionally, the data phase.
//!
//! The RTO is fixed: there is no RTT estimation or back-off.

use std::time::{Duration, Instant};

use crate::packet::Segment;
use crate::window::TransmissionWindow;

/// Fixed-RTO retransmission for one transfer.
#[derive(Debug)]
pub struct RetransmitTimer {
    rto: Duration,
    fired: u64,
}

impl RetransmitTimer {
    pub fn new(rto: Duration) -> Self {
        Self { rto, fired: 0 }
    }

    /// Bound on a single receive.
    pub fn rto(&self) -> Duration {
        self.rto
    }

    /// Number of timeouts handled so far.
    pub fn fired(&self) -> u64 {
        self.fired
    }

    /// Handle a receive timeout: every in-flight segment is presumed lost.
    ///
    /// Returns the segments to resend, lowest offset first.
    pub fn on_timeout(&mut self, window: &mut TransmissionWindow) -> Vec<Segment> {
        self.fired += 1;
        let resend = window.retransmit_all();
        log::debug!(
            "[timer] timeout #{}; retransmitting {} segment(s)",
            self.fired,
            resend.len()
        );
        resend
    }
}

/// A point in time after which an operation is abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// `limit` from `start`.
    pub fn after(start: Instant, limit: Duration) -> Self {
        Self { at: start + limit }
    }

    pub fn expired(&self, now: Instant) -> bool {
        now >= self.at
    }

    /// Time left before expiry, zero once passed.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.at.saturating_duration_since(now)
    }

    /// `wait` shortened so it never runs past the deadline.
    pub fn clamp(&self, wait: Duration, now: Instant) -> Duration {
        wait.min(self.remaining(now))
    }
}

//! Inbound acknowledgment handling.
//!
//! [`AckProcessor`] consumes decoded replies from the receiver, advances the
//! window's cumulative frontier and watches for runs of identical ACKs. A
//! run of `threshold` repeats is taken as a lost-segment signal and yields
//! the lowest-offset outstanding segment for immediate retransmission.
//!
//! Like [`crate::window`], nothing here touches the socket.

use std::time::Instant;

use crate::metrics::MetricsCollector;
use crate::packet::{Segment, Token};
use crate::window::TransmissionWindow;

/// What a single reply did to the send state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckOutcome {
    /// Not an acknowledgment; nothing changed.
    Ignored,
    Processed {
        ack: i32,
        /// Segments newly retired by this ACK.
        retired: usize,
        /// Consecutive repeats of `ack` seen so far (0 for a fresh value).
        duplicates: u32,
        /// Segment to resend right away, if the repeat threshold is met.
        fast_retransmit: Option<Segment>,
    },
}

/// Duplicate-ACK tracking for one transfer.
#[derive(Debug)]
pub struct AckProcessor {
    last_ack: Option<i32>,
    dup_count: u32,
    threshold: u32,
}

impl AckProcessor {
    pub fn new(threshold: u32) -> Self {
        Self {
            last_ack: None,
            dup_count: 0,
            threshold,
        }
    }

    pub fn last_ack(&self) -> Option<i32> {
        self.last_ack
    }

    pub fn duplicates(&self) -> u32 {
        self.dup_count
    }

    /// Apply one reply to `window`, recording delay samples in `metrics`.
    ///
    /// Once the repeat count reaches the threshold every further repeat
    /// asks for another fast retransmit; the count only resets when a
    /// different ACK value arrives.
    pub fn on_reply(
        &mut self,
        reply: &Segment,
        window: &mut TransmissionWindow,
        metrics: &mut MetricsCollector,
        now: Instant,
    ) -> AckOutcome {
        if reply.token() != Token::Ack {
            log::trace!("[ack] ignoring non-ack reply seq={}", reply.seq_id);
            return AckOutcome::Ignored;
        }
        let ack = reply.seq_id;

        if self.last_ack == Some(ack) {
            self.dup_count += 1;
        } else {
            self.last_ack = Some(ack);
            self.dup_count = 0;
        }

        let samples = window.retire_up_to(ack, now);
        let retired = samples.len();
        for sample in samples {
            metrics.record(sample);
        }

        let fast_retransmit = if self.dup_count >= self.threshold {
            window.retransmit_lowest()
        } else {
            None
        };

        log::debug!(
            "[ack] ← ACK ack={ack} retired={retired} dup={} in_flight={}",
            self.dup_count,
            window.len()
        );

        AckOutcome::Processed {
            ack,
            retired,
            duplicates: self.dup_count,
            fast_retransmit,
        }
    }
}

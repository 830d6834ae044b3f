//! Sliding-window send-side state.
//!
//! [`TransmissionWindow`] holds up to `capacity` segments that have been
//! sent but not yet covered by a cumulative acknowledgment.
//!
//! # Protocol contract
//!
//! - At most `capacity` segments may be in flight at once.
//! - Segment start offsets are computed once, up front, from the file size
//!   and the payload size; the window only ever advances a cursor over them.
//! - ACKs are **cumulative**: `ack = K` means the receiver holds every byte
//!   below offset `K`. Retirement works by frontier, so duplicated or stale
//!   ACKs are harmless.
//! - The in-flight map is ordered by offset, so the oldest unacknowledged
//!   byte range is always its first entry.
//!
//! This module only manages state; all socket I/O is the caller's
//! responsibility.

use std::collections::BTreeMap;
use std::io::{self, Read, Seek, SeekFrom};
use std::time::Instant;

use crate::metrics::DelaySample;
use crate::packet::Segment;

/// Start offsets of every segment of a `total_bytes`-long stream:
/// `0, M, 2M, …` up to the last offset below `total_bytes`.
pub fn segment_offsets(total_bytes: i32, message_size: usize) -> Vec<i32> {
    if total_bytes <= 0 || message_size == 0 {
        return Vec::new();
    }
    (0..total_bytes).step_by(message_size).collect()
}

/// A single in-flight segment.
#[derive(Debug, Clone)]
pub struct OutstandingSegment {
    /// Byte offset of the first payload byte; also the map key.
    pub offset: i32,
    pub payload: Vec<u8>,
    /// Time of the first transmission. Retransmissions leave it alone so
    /// delay samples include recovery time.
    pub first_sent_at: Instant,
    /// Total number of times this segment has been transmitted.
    pub tx_count: u32,
}

impl OutstandingSegment {
    /// Offset one past the last payload byte.
    pub fn end(&self) -> i64 {
        i64::from(self.offset) + self.payload.len() as i64
    }

    /// The segment as it goes on the wire.
    pub fn to_segment(&self) -> Segment {
        Segment::data(self.offset, self.payload.clone())
    }
}

/// Send-side window for one transfer.
///
/// ```text
///   retired        in_flight           unsent
///  ─────────┼───────────────────┼──────────────────▶ offsets
///           │ <── ≤ capacity ──▶│ next_unsent
/// ```
#[derive(Debug)]
pub struct TransmissionWindow {
    total_bytes: i32,
    message_size: usize,
    capacity: usize,
    offsets: Vec<i32>,
    next_unsent: usize,
    in_flight: BTreeMap<i32, OutstandingSegment>,
}

impl TransmissionWindow {
    /// Create a window over a `total_bytes` stream.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` or `message_size` is zero; validate the
    /// configuration first.
    pub fn new(total_bytes: i32, message_size: usize, capacity: usize) -> Self {
        assert!(capacity >= 1, "window capacity must be at least 1");
        assert!(message_size >= 1, "message size must be at least 1");
        Self {
            total_bytes,
            message_size,
            capacity,
            offsets: segment_offsets(total_bytes, message_size),
            next_unsent: 0,
            in_flight: BTreeMap::new(),
        }
    }

    pub fn total_bytes(&self) -> i32 {
        self.total_bytes
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Every segment start offset, in order.
    pub fn offsets(&self) -> &[i32] {
        &self.offsets
    }

    /// Number of segments currently awaiting acknowledgment.
    pub fn len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }

    /// `true` while at least one offset has never been sent.
    pub fn has_unsent(&self) -> bool {
        self.next_unsent < self.offsets.len()
    }

    /// `true` when there is room for, and data for, one more segment.
    pub fn can_admit(&self) -> bool {
        self.in_flight.len() < self.capacity && self.has_unsent()
    }

    /// Data phase is done: everything sent and everything acknowledged.
    pub fn is_complete(&self) -> bool {
        !self.has_unsent() && self.in_flight.is_empty()
    }

    /// Fill the window from `reader`.
    ///
    /// Reads the chunk at each next unsent offset, records it as
    /// outstanding (first sent at `now`) and returns the new segments in
    /// order. The caller must transmit every returned segment.
    pub fn admit_sends<R: Read + Seek>(
        &mut self,
        reader: &mut R,
        now: Instant,
    ) -> io::Result<Vec<Segment>> {
        let mut admitted = Vec::new();
        while self.can_admit() {
            let offset = self.offsets[self.next_unsent];
            let len = self
                .message_size
                .min((i64::from(self.total_bytes) - i64::from(offset)) as usize);

            reader.seek(SeekFrom::Start(offset as u64))?;
            let mut payload = vec![0u8; len];
            reader.read_exact(&mut payload)?;

            let record = self
                .in_flight
                .entry(offset)
                .or_insert_with(|| OutstandingSegment {
                    offset,
                    payload,
                    first_sent_at: now,
                    tx_count: 0,
                });
            record.tx_count += 1;
            admitted.push(record.to_segment());
            self.next_unsent += 1;
        }
        Ok(admitted)
    }

    /// Retire every segment that ends at or below `frontier`.
    ///
    /// Returns one delay sample per retired segment. A frontier that covers
    /// nothing new (stale, duplicate, or mid-segment) is a no-op.
    pub fn retire_up_to(&mut self, frontier: i32, now: Instant) -> Vec<DelaySample> {
        let frontier = i64::from(frontier);
        // Segments never overlap, so ends ascend with offsets.
        let covered: Vec<i32> = self
            .in_flight
            .values()
            .take_while(|r| r.end() <= frontier)
            .map(|r| r.offset)
            .collect();

        covered
            .into_iter()
            .filter_map(|offset| self.in_flight.remove(&offset))
            .map(|r| DelaySample {
                offset: r.offset,
                elapsed: now.saturating_duration_since(r.first_sent_at),
            })
            .collect()
    }

    /// The oldest unacknowledged segment.
    pub fn lowest_outstanding(&self) -> Option<&OutstandingSegment> {
        self.in_flight.first_key_value().map(|(_, r)| r)
    }

    /// Iterate over in-flight segments from lowest to highest offset.
    pub fn outstanding(&self) -> impl Iterator<Item = &OutstandingSegment> {
        self.in_flight.values()
    }

    /// Mark the lowest-offset segment as retransmitted and return it.
    pub fn retransmit_lowest(&mut self) -> Option<Segment> {
        let mut lowest = self.in_flight.first_entry()?;
        let record = lowest.get_mut();
        record.tx_count += 1;
        Some(record.to_segment())
    }

    /// Mark every in-flight segment as retransmitted and return them in
    /// offset order.
    pub fn retransmit_all(&mut self) -> Vec<Segment> {
        self.in_flight
            .values_mut()
            .map(|r| {
                r.tx_count += 1;
                r.to_segment()
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

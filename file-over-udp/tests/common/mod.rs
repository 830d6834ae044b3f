//! Scripted loopback peer shared by the integration tests.
//!
//! The peer buffers out-of-order segments, acknowledges the contiguous
//! frontier after every data segment and answers the terminal segment with
//! `ack` and `fin` (in a configurable order, optionally with a pause in
//! between). It records everything it sees so tests can assert on exactly
//! what went over the wire.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use file_over_udp::config::TransferConfig;
use file_over_udp::packet::{Segment, Token};
use file_over_udp::socket::{RecvEvent, Socket};

/// Quiet period after the confirmation before the peer reports back.
const QUIET: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Default)]
pub struct Script {
    /// Offsets whose first arrival is dropped.
    pub drop_once: Vec<i32>,
    /// Send `fin` before `ack` when answering the terminal segment.
    pub fin_first: bool,
    /// Pause between the two teardown replies.
    pub reply_gap: Duration,
    /// Never answer the terminal segment.
    pub mute_teardown: bool,
}

#[derive(Debug, Default)]
pub struct PeerLog {
    /// Every data segment that arrived, as `(offset, len)`.
    pub data: Vec<(i32, usize)>,
    /// Arrivals of the empty terminal segment.
    pub terminals: usize,
    /// `seq_id` of each `==FINACK==` that arrived.
    pub finacks: Vec<i32>,
    /// Bytes reassembled in order.
    pub bytes: Vec<u8>,
}

pub async fn ephemeral() -> Socket {
    Socket::bind("127.0.0.1:0".parse().unwrap())
        .await
        .expect("bind failed")
}

/// Deterministic, non-repeating-looking file contents.
pub fn file_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

/// Short timers so failures surface quickly.
pub fn fast_config(peer: &Socket) -> TransferConfig {
    TransferConfig {
        rto: Duration::from_millis(500),
        teardown_timeout: Duration::from_secs(5),
        ..TransferConfig::new(peer.local_addr)
    }
}

/// Serve one transfer on `sock` according to `script`.
///
/// Returns once a confirmation has arrived and the line has then been quiet
/// for a while, or once `give_up` has passed without any confirmation.
pub async fn run_peer(sock: Socket, script: Script, give_up: Duration) -> PeerLog {
    let mut log = PeerLog::default();
    let mut pending: BTreeMap<i32, Vec<u8>> = BTreeMap::new();
    let mut dropped = HashSet::new();
    let mut answered = false;
    let started = tokio::time::Instant::now();

    loop {
        let (seg, from) = match sock.recv_timeout(QUIET).await.expect("peer recv") {
            RecvEvent::Segment(seg, from) => (seg, from),
            RecvEvent::Malformed(..) => continue,
            RecvEvent::TimedOut if !log.finacks.is_empty() => return log,
            RecvEvent::TimedOut if started.elapsed() >= give_up => return log,
            RecvEvent::TimedOut => continue,
        };

        if seg.token() == Token::FinAck {
            log.finacks.push(seg.seq_id);
            continue;
        }

        let frontier = log.bytes.len() as i32;
        if seg.payload.is_empty() {
            log.terminals += 1;
            if !answered && !script.mute_teardown {
                answered = true;
                let (first, second) = if script.fin_first {
                    (Segment::fin(frontier), Segment::ack(frontier))
                } else {
                    (Segment::ack(frontier), Segment::fin(frontier))
                };
                sock.send_to(&first, from).await.unwrap();
                tokio::time::sleep(script.reply_gap).await;
                sock.send_to(&second, from).await.unwrap();
            }
            continue;
        }

        log.data.push((seg.seq_id, seg.payload.len()));
        if script.drop_once.contains(&seg.seq_id) && dropped.insert(seg.seq_id) {
            continue;
        }
        if seg.seq_id >= frontier {
            pending.insert(seg.seq_id, seg.payload);
        }
        while let Some(chunk) = pending.remove(&(log.bytes.len() as i32)) {
            log.bytes.extend_from_slice(&chunk);
        }
        let ack = Segment::ack(log.bytes.len() as i32);
        sock.send_to(&ack, from).await.unwrap();
    }
}
